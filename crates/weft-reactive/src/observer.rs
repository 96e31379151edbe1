#![forbid(unsafe_code)]

//! Recursive instrumentation of object graphs.
//!
//! [`observe`] stamps a container with an [`Observer`] and instruments its
//! contents: every own enumerable key of an [`Object`] becomes a reactive
//! [`Property`], and every element of an [`Array`] is observed in turn.
//! Arrays need no rewiring of their own: their seven mutating methods
//! check for the observer stamp and notify through it.
//!
//! # Invariants
//!
//! 1. At most one observer per container. The stamp is written before the
//!    walk, so cyclic graphs terminate.
//! 2. Managed objects, non-extensible containers, scalars and opaque values
//!    are never observed.
//! 3. While observation is toggled off, existing observers are still
//!    returned but no new ones are created.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::config;
use crate::dep::Dep;
use crate::property::{CustomSetter, Property};
use crate::registry;
use crate::value::{Array, Getter, Object, PropertyDescriptor, Setter, Slot, Value};

/// Instrumentation attached to one observed container.
pub struct Observer {
    dep: Dep,
    root_count: Cell<u32>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.dep)
            .field("root_count", &self.root_count.get())
            .finish()
    }
}

impl Observer {
    fn new() -> Self {
        Self {
            dep: Dep::new(),
            root_count: Cell::new(0),
        }
    }

    /// Container-level dep; fires on structural change (keys added or
    /// removed, sequence mutated).
    #[must_use]
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// How many instances use this container as their root data.
    #[must_use]
    pub fn root_count(&self) -> u32 {
        self.root_count.get()
    }

    /// Whether some instance uses this container as its root data.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.root_count.get() > 0
    }
}

/// Observe `value`, returning its observer.
///
/// Returns the existing observer if `value` is already observed, `None` if
/// it is not eligible.
pub fn observe(value: &Value) -> Option<Rc<Observer>> {
    attach(value)
}

/// Observe `value` as an instance's root data, bumping its root count.
///
/// `set` and `del` warn when used on a root container.
pub fn observe_root(value: &Value) -> Option<Rc<Observer>> {
    let ob = attach(value)?;
    ob.root_count.set(ob.root_count.get() + 1);
    Some(ob)
}

fn attach(value: &Value) -> Option<Rc<Observer>> {
    match value {
        Value::Object(obj) => {
            if let Some(existing) = obj.observer() {
                return Some(existing);
            }
            if !config::should_observe() || !obj.is_extensible() || obj.is_managed() {
                return None;
            }
            let ob = Rc::new(Observer::new());
            obj.set_observer(Rc::clone(&ob));
            tracing::trace!(dep = ob.dep.id().0, keys = obj.len(), "observe object");
            for key in obj.keys() {
                define_reactive(obj, &key, None, None, false);
            }
            Some(ob)
        }
        Value::Array(arr) => {
            if let Some(existing) = arr.observer() {
                return Some(existing);
            }
            if !config::should_observe() || arr.is_frozen() {
                return None;
            }
            let ob = Rc::new(Observer::new());
            arr.set_observer(Rc::clone(&ob));
            tracing::trace!(dep = ob.dep.id().0, len = arr.len(), "observe array");
            observe_items(arr);
            Some(ob)
        }
        _ => None,
    }
}

/// Observe every element of `arr`.
pub(crate) fn observe_items(arr: &Array) {
    for item in arr.to_vec() {
        observe(&item);
    }
}

/// Install a reactive accessor for `key` on `obj`.
///
/// A pre-existing user getter/setter is kept and called through. When
/// `init` is `None` the current value is read from the object (unless the
/// existing accessor has a getter but no setter). Non-configurable keys are
/// left untouched.
pub fn define_reactive(
    obj: &Object,
    key: &str,
    init: Option<Value>,
    custom_setter: Option<CustomSetter<Value>>,
    shallow: bool,
) {
    let existing = obj.slot(key);
    if existing.as_ref().is_some_and(|slot| !slot.is_configurable()) {
        return;
    }

    let (getter, setter): (Option<Getter>, Option<Setter>) = match &existing {
        Some(Slot::Plain(PropertyDescriptor::Accessor { get, set, .. })) => (get.clone(), set.clone()),
        Some(Slot::Reactive(prop)) => {
            let (read, write) = (Rc::clone(prop), Rc::clone(prop));
            (
                Some(Rc::new(move || read.get())),
                Some(Rc::new(move |v| write.set(v))),
            )
        }
        _ => (None, None),
    };

    let value = match init {
        Some(value) => value,
        None if getter.is_none() || setter.is_some() => registry::untracked(|| obj.get(key)),
        None => Value::Undefined,
    };

    let prop = Property::from_accessors(value, getter, setter, custom_setter, shallow);
    obj.install_reactive(key, Rc::new(prop));
}

/// Register the current target with the observer of every (nested)
/// element of `arr`.
pub(crate) fn depend_array(arr: &Array) {
    for item in arr.to_vec() {
        if let Some(ob) = item.observer() {
            ob.dep().depend();
        }
        if let Value::Array(inner) = &item {
            depend_array(inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Effect;
    use crate::config::toggle_observing;

    #[test]
    fn observe_is_idempotent() {
        let value = Value::from(Object::from_pairs([("a", 1)]));
        let first = observe(&value).unwrap();
        let second = observe(&value).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn scalars_and_opaque_are_not_observed() {
        assert!(observe(&Value::from(1)).is_none());
        assert!(observe(&Value::from("s")).is_none());
        assert!(observe(&Value::opaque(5_u8)).is_none());
    }

    #[test]
    fn managed_and_frozen_are_skipped() {
        let managed = Object::new();
        managed.mark_managed();
        assert!(observe(&Value::from(managed)).is_none());

        let frozen = Object::from_pairs([("a", 1)]);
        frozen.freeze();
        assert!(observe(&Value::from(frozen.clone())).is_none());
        assert!(!frozen.is_reactive("a"));
    }

    #[test]
    fn observation_walks_nested_containers() {
        let inner = Object::from_pairs([("n", 1)]);
        let list = Array::from_vec(vec![Value::from(inner.clone())]);
        let root = Object::from_pairs([("list", Value::from(list.clone()))]);
        observe(&Value::from(root.clone()));

        assert!(root.is_reactive("list"));
        assert!(list.observer().is_some());
        assert!(inner.is_reactive("n"));
    }

    #[test]
    fn cyclic_graph_terminates() {
        let a = Object::new();
        a.put("self", Value::from(a.clone()));
        let ob = observe(&Value::from(a.clone()));
        assert!(ob.is_some());
        assert!(a.is_reactive("self"));
    }

    #[test]
    fn toggled_off_creates_nothing_but_returns_existing() {
        let seen = Value::from(Object::new());
        let existing = observe(&seen).unwrap();

        toggle_observing(false);
        let fresh = observe(&Value::from(Object::new()));
        let again = observe(&seen);
        toggle_observing(true);

        assert!(fresh.is_none());
        assert!(Rc::ptr_eq(&existing, &again.unwrap()));
    }

    #[test]
    fn root_count_accumulates() {
        let value = Value::from(Object::new());
        observe_root(&value);
        let ob = observe_root(&value).unwrap();
        assert_eq!(ob.root_count(), 2);
        assert!(ob.is_root());
    }

    #[test]
    fn non_configurable_key_stays_plain() {
        let obj = Object::new();
        obj.define_property("id", PropertyDescriptor::data(1).locked());
        obj.put("name", Value::from("x"));
        observe(&Value::from(obj.clone()));
        assert!(!obj.is_reactive("id"));
        assert!(obj.is_reactive("name"));
    }

    #[test]
    fn user_accessor_is_called_through() {
        let store = Rc::new(std::cell::RefCell::new(Value::from(1)));
        let (r, w) = (Rc::clone(&store), Rc::clone(&store));
        let obj = Object::new();
        obj.define_property(
            "v",
            PropertyDescriptor::accessor(
                Some(Rc::new(move || r.borrow().clone())),
                Some(Rc::new(move |v| *w.borrow_mut() = v)),
            ),
        );
        observe(&Value::from(obj.clone()));

        let o = obj.clone();
        let effect = Effect::new(move || {
            let _ = o.get("v");
        });
        obj.put("v", Value::from(2));

        assert_eq!(*store.borrow(), Value::from(2));
        assert_eq!(effect.runs(), 2);
    }

    #[test]
    fn reading_array_property_tracks_nested_elements() {
        let item = Object::from_pairs([("done", false)]);
        let nested = Array::new();
        let list = Array::from_vec(vec![Value::from(item.clone()), Value::from(nested.clone())]);
        let state = Object::from_pairs([("list", Value::from(list))]);
        observe(&Value::from(state.clone()));

        let s = state.clone();
        let effect = Effect::new(move || {
            let _ = s.get("list");
        });

        crate::set(&Value::from(item), "extra", Value::from(1));
        assert_eq!(effect.runs(), 2);
        nested.push([Value::from(1)]);
        assert_eq!(effect.runs(), 3);
    }
}
