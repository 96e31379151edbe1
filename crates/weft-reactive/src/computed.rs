#![forbid(unsafe_code)]

//! Cached derived values.
//!
//! A [`Computed`] is a subscriber that never reruns on its own. A
//! notification from any dep it read only marks the cache dirty; the next
//! read evaluates again under the computed's own target, so deps are
//! re-collected each time.
//!
//! Reading a computed from inside another evaluation makes that evaluation
//! depend on the computed's deps directly. The outer subscriber is then
//! notified by the source change itself. A computed reports itself as lazy,
//! so [`Dep::notify`] marks it dirty before any eager subscriber on the same
//! dep reruns, whatever order they subscribed in.
//!
//! # Invariants
//!
//! 1. A read after a dep changed never returns the pre-change result.
//! 2. Reads between two dep changes evaluate at most once.
//! 3. `version()` counts evaluations.
//!
//! # Failure Modes
//!
//! - **Panicking compute function**: the old cached value is kept and the
//!   dirty flag is not cleared, so the next read tries again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dep::{Dep, Subscriber, SubscriberId, next_subscriber_id};
use crate::registry;
use crate::tracker::DepTracker;

struct ComputedInner<T> {
    id: SubscriberId,
    compute: Box<dyn Fn() -> T>,
    /// `None` until the first read.
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    version: Cell<u64>,
    tracker: RefCell<DepTracker>,
}

impl<T: 'static> Subscriber for ComputedInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(self: Rc<Self>, dep: &Dep) {
        if self.tracker.borrow_mut().record(dep) {
            dep.add_sub(&(self as Rc<dyn Subscriber>));
        }
    }

    fn update(&self) {
        self.dirty.set(true);
    }

    fn is_lazy(&self) -> bool {
        true
    }
}

/// A value derived from reactive reads, evaluated on demand.
///
/// Clones share the cache.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: 'static> Computed<T> {
    /// Create a computed value. Nothing runs until the first read.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(ComputedInner {
                id: next_subscriber_id(),
                compute: Box::new(compute),
                cached: RefCell::new(None),
                dirty: Cell::new(true),
                version: Cell::new(0),
                tracker: RefCell::new(DepTracker::default()),
            }),
        }
    }

    fn evaluate(&self) -> T {
        let this: Rc<dyn Subscriber> = Rc::clone(&self.inner) as Rc<dyn Subscriber>;
        let value = registry::with_target(Some(Rc::clone(&this)), || (self.inner.compute)());
        let stale = self.inner.tracker.borrow_mut().finish();
        for dep in stale {
            dep.remove_sub(&this);
        }
        self.inner.dirty.set(false);
        self.inner.version.set(self.inner.version.get() + 1);
        value
    }

    /// Make the current target depend on everything this computed read.
    fn depend_outer(&self) {
        if registry::has_target() {
            let deps = self.inner.tracker.borrow().deps().to_vec();
            for dep in deps {
                dep.depend();
            }
        }
    }

    /// Borrow the value, evaluating first if the cache is dirty.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if !self.inner.dirty.get() {
            if let Some(value) = self.inner.cached.borrow().as_ref() {
                self.depend_outer();
                return f(value);
            }
        }
        let fresh = self.evaluate();
        self.depend_outer();
        let result = f(&fresh);
        *self.inner.cached.borrow_mut() = Some(fresh);
        result
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Mark the cache dirty without a dep change.
    pub fn invalidate(&self) {
        self.inner.dirty.set(true);
    }

    /// Evaluations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of deps read on the latest computation.
    #[must_use]
    pub fn dep_count(&self) -> usize {
        self.inner.tracker.borrow().deps().len()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Clone out the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;
    use crate::value::{Object, Value};
    use crate::{Effect, observe};

    #[test]
    fn evaluates_lazily_and_after_change() {
        let source = Rc::new(Property::new(10_i32));
        let s = Rc::clone(&source);
        let doubled = Computed::new(move || s.get() * 2);
        assert_eq!(doubled.version(), 0);

        assert_eq!(doubled.get(), 20);
        source.set(5);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.get(), 10);
        assert_eq!(doubled.version(), 2);
    }

    #[test]
    fn repeated_reads_evaluate_once() {
        let evaluations = Rc::new(Cell::new(0));
        let state = Object::from_pairs([("a", 1), ("b", 2)]);
        observe(&Value::from(state.clone()));
        let (st, n) = (state.clone(), Rc::clone(&evaluations));
        let sum = Computed::new(move || {
            n.set(n.get() + 1);
            st.get("a").as_number().unwrap_or(0.0) + st.get("b").as_number().unwrap_or(0.0)
        });

        for _ in 0..3 {
            assert_eq!(sum.get(), 3.0);
        }
        assert_eq!(evaluations.get(), 1);
        assert_eq!(sum.dep_count(), 2);

        state.put("b", Value::from(10));
        assert_eq!(sum.get(), 11.0);
        assert_eq!(evaluations.get(), 2);
    }

    #[test]
    fn deps_are_recollected_per_evaluation() {
        let state = Object::from_pairs([
            ("flag", Value::from(true)),
            ("left", Value::from("l")),
            ("right", Value::from("r")),
        ]);
        observe(&Value::from(state.clone()));
        let st = state.clone();
        let pick = Computed::new(move || {
            let key = if st.get("flag").as_bool().unwrap_or(false) { "left" } else { "right" };
            st.get(key).to_display_string()
        });

        assert_eq!(pick.get(), "l");
        state.put("flag", Value::from(false));
        assert_eq!(pick.get(), "r");
        state.put("left", Value::from("ignored"));
        assert!(!pick.is_dirty());
    }

    #[test]
    fn invalidate_marks_dirty() {
        let answer = Computed::new(|| 42);
        assert_eq!(answer.get(), 42);
        answer.invalidate();
        assert!(answer.is_dirty());
        assert_eq!(answer.with(|v| v + 1), 43);
        assert_eq!(answer.version(), 2);
    }

    #[test]
    fn clones_share_the_cache() {
        let source = Rc::new(Property::new(String::from("hi")));
        let s = Rc::clone(&source);
        let upper = Computed::new(move || s.get().to_uppercase());
        let other = upper.clone();

        assert_eq!(upper.with(String::len), 2);
        source.set(String::from("hello"));
        assert_eq!(other.get(), "HELLO");
        assert_eq!(upper.version(), 2);
    }

    #[test]
    fn subscriber_reading_computed_reruns_on_source_change() {
        let state = Object::from_pairs([("count", 1)]);
        observe(&Value::from(state.clone()));
        let st = state.clone();
        let doubled = Computed::new(move || st.get("count").as_number().unwrap_or(0.0) * 2.0);

        let seen = Rc::new(Cell::new(0.0));
        let (d, sn) = (doubled.clone(), Rc::clone(&seen));
        let effect = Effect::new(move || sn.set(d.get()));
        assert_eq!(seen.get(), 2.0);

        state.put("count", Value::from(4));
        assert_eq!(effect.runs(), 2);
        assert_eq!(seen.get(), 8.0);
    }

    #[test]
    fn chained_computeds_propagate_dirtiness() {
        let source = Rc::new(Property::new(3_i32));
        let s = Rc::clone(&source);
        let inner = Computed::new(move || s.get() + 1);
        let i = inner.clone();
        let outer = Computed::new(move || i.get() * 10);

        assert_eq!(outer.get(), 40);
        source.set(4);
        assert!(outer.is_dirty());
        assert_eq!(outer.get(), 50);
    }
}
