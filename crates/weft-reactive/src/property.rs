#![forbid(unsafe_code)]

//! Explicit reactive accessors.
//!
//! A [`Property<T>`] pairs a value slot with a [`Dep`]. Reading through
//! [`get`](Property::get) registers the current target; writing through
//! [`set`](Property::set) notifies subscribers unless the value is unchanged.
//! Observed objects hold one `Property<Value>` per key, but the type is just
//! as usable on its own for a strongly typed field.
//!
//! # Invariants
//!
//! 1. A write that is [`same_value`](Trackable::same_value) as the current
//!    value is a no-op: no store, no custom setter, no notify.
//! 2. A property backed by a getter with no setter ignores writes.
//! 3. Unless shallow, the child observer always matches the stored value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::dep::Dep;
use crate::observer::{self, Observer};
use crate::registry;
use crate::value::Value;

/// Hook invoked with the incoming value on every effective write.
pub type CustomSetter<T> = Rc<dyn Fn(&T)>;

/// Values a [`Property`] can hold.
pub trait Trackable: Clone + 'static {
    /// Change detection. NaN must compare equal to itself.
    fn same_value(&self, other: &Self) -> bool;

    /// Observe the value if it is a container, returning its observer.
    fn observe_child(&self) -> Option<Rc<Observer>> {
        None
    }

    /// Register the current target with every observed element, for
    /// sequence values whose index reads cannot be intercepted.
    fn depend_items(&self) {}
}

impl Trackable for Value {
    fn same_value(&self, other: &Self) -> bool {
        Value::same_value(self, other)
    }

    fn observe_child(&self) -> Option<Rc<Observer>> {
        observer::observe(self)
    }

    fn depend_items(&self) {
        if let Value::Array(items) = self {
            observer::depend_array(items);
        }
    }
}

macro_rules! trackable_by_eq {
    ($($t:ty),* $(,)?) => {
        $(
            impl Trackable for $t {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

trackable_by_eq!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String, Rc<str>,
    &'static str,
);

macro_rules! trackable_float {
    ($($t:ty),*) => {
        $(
            impl Trackable for $t {
                fn same_value(&self, other: &Self) -> bool {
                    self == other || (self.is_nan() && other.is_nan())
                }
            }
        )*
    };
}

trackable_float!(f32, f64);

/// A reactive get/set accessor backed by a [`Dep`].
pub struct Property<T: Trackable> {
    dep: Dep,
    slot: RefCell<T>,
    getter: Option<Rc<dyn Fn() -> T>>,
    setter: Option<Rc<dyn Fn(T)>>,
    child: RefCell<Option<Rc<Observer>>>,
    shallow: bool,
    custom_setter: Option<CustomSetter<T>>,
}

impl<T: Trackable + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("dep", &self.dep)
            .field("value", &self.peek())
            .field("shallow", &self.shallow)
            .finish()
    }
}

impl<T: Trackable> Property<T> {
    /// A deep property: container values are observed on every store.
    pub fn new(value: T) -> Self {
        Self::from_accessors(value, None, None, None, false)
    }

    /// A shallow property: the stored value is never observed.
    pub fn shallow(value: T) -> Self {
        Self::from_accessors(value, None, None, None, true)
    }

    /// Call `hook` with the incoming value before each effective write.
    #[must_use]
    pub fn with_custom_setter(mut self, hook: impl Fn(&T) + 'static) -> Self {
        self.custom_setter = Some(Rc::new(hook));
        self
    }

    pub(crate) fn from_accessors(
        value: T,
        getter: Option<Rc<dyn Fn() -> T>>,
        setter: Option<Rc<dyn Fn(T)>>,
        custom_setter: Option<CustomSetter<T>>,
        shallow: bool,
    ) -> Self {
        let child = if shallow { None } else { value.observe_child() };
        Self {
            dep: Dep::new(),
            slot: RefCell::new(value),
            getter,
            setter,
            child: RefCell::new(child),
            shallow,
            custom_setter,
        }
    }

    /// Read the value, registering the current target (if any).
    pub fn get(&self) -> T {
        let value = self.peek();
        if registry::has_target() {
            self.dep.depend();
            let child = self.child.borrow().clone();
            if let Some(child) = child {
                child.dep().depend();
                value.depend_items();
            }
        }
        value
    }

    /// Read the value without registering a dependency.
    #[must_use]
    pub fn peek(&self) -> T {
        match &self.getter {
            Some(getter) => getter(),
            None => self.slot.borrow().clone(),
        }
    }

    /// Store `value` and notify, unless it equals the current value.
    pub fn set(&self, value: T) {
        let current = registry::untracked(|| self.peek());
        if value.same_value(&current) {
            return;
        }
        if let Some(hook) = &self.custom_setter {
            hook(&value);
        }
        if self.getter.is_some() && self.setter.is_none() {
            return;
        }
        match &self.setter {
            Some(setter) => setter(value.clone()),
            None => *self.slot.borrow_mut() = value.clone(),
        }
        if !self.shallow {
            *self.child.borrow_mut() = value.observe_child();
        }
        self.dep.notify();
    }

    /// The dep subscribers of this property register with.
    #[must_use]
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Observer of the currently stored container value, if any.
    #[must_use]
    pub fn child_observer(&self) -> Option<Rc<Observer>> {
        self.child.borrow().clone()
    }

    #[must_use]
    pub fn is_shallow(&self) -> bool {
        self.shallow
    }
}
