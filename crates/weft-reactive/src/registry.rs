#![forbid(unsafe_code)]

//! The active-subscriber registry.
//!
//! Exactly one subscriber per thread is the *current target*: the one that
//! receives registrations when a reactive read happens. Nested evaluations
//! push a new target and pop it when done, so a computation read during
//! another computation's evaluation collects into its own deps.
//!
//! Prefer [`track`] / [`with_target`] / [`untracked`]: they pop on every
//! exit path, including unwinding. The raw [`push_target`] / [`pop_target`]
//! pair is exposed for callers that manage the pairing themselves.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::dep::Subscriber;

#[derive(Default)]
struct TargetStack {
    current: Option<Rc<dyn Subscriber>>,
    stack: Vec<Option<Rc<dyn Subscriber>>>,
}

thread_local! {
    static TARGETS: RefCell<TargetStack> = RefCell::new(TargetStack::default());
}

/// Push `target` and make it current. `None` suspends collection.
pub fn push_target(target: Option<Rc<dyn Subscriber>>) {
    TARGETS.with(|t| {
        let mut t = t.borrow_mut();
        t.stack.push(target.clone());
        t.current = target;
    });
}

/// Pop the innermost target and restore the one beneath it.
pub fn pop_target() {
    TARGETS.with(|t| {
        let mut t = t.borrow_mut();
        t.stack.pop();
        t.current = t.stack.last().cloned().flatten();
    });
}

/// The subscriber currently collecting dependencies, if any.
#[must_use]
pub fn current_target() -> Option<Rc<dyn Subscriber>> {
    TARGETS.with(|t| t.borrow().current.clone())
}

/// Whether a subscriber is currently collecting dependencies.
#[must_use]
pub fn has_target() -> bool {
    TARGETS.with(|t| t.borrow().current.is_some())
}

/// Number of pushed targets (including `None` entries).
#[must_use]
pub fn depth() -> usize {
    TARGETS.with(|t| t.borrow().stack.len())
}

/// Scoped push: pops the target when dropped.
pub struct TargetGuard {
    _not_send: PhantomData<Rc<()>>,
}

impl fmt::Debug for TargetGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetGuard")
            .field("depth", &depth())
            .finish()
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        pop_target();
    }
}

/// Push `target` for the lifetime of the returned guard.
#[must_use = "the target is popped as soon as the guard is dropped"]
pub fn track(target: Option<Rc<dyn Subscriber>>) -> TargetGuard {
    push_target(target);
    TargetGuard {
        _not_send: PhantomData,
    }
}

/// Run `f` with `target` as the current target.
pub fn with_target<R>(target: Option<Rc<dyn Subscriber>>, f: impl FnOnce() -> R) -> R {
    let _guard = track(target);
    f()
}

/// Run `f` with dependency collection suspended.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    with_target(None, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep::{Dep, SubscriberId};

    struct Named(u64);

    impl Subscriber for Named {
        fn id(&self) -> SubscriberId {
            SubscriberId(self.0)
        }
        fn add_dep(self: Rc<Self>, _dep: &Dep) {}
        fn update(&self) {}
    }

    fn current_id() -> Option<u64> {
        current_target().map(|t| t.id().0)
    }

    #[test]
    fn push_pop_restores_outer_target() {
        let outer: Rc<dyn Subscriber> = Rc::new(Named(1));
        let inner: Rc<dyn Subscriber> = Rc::new(Named(2));

        push_target(Some(outer));
        assert_eq!(current_id(), Some(1));
        push_target(Some(inner));
        assert_eq!(current_id(), Some(2));
        pop_target();
        assert_eq!(current_id(), Some(1));
        pop_target();
        assert_eq!(current_id(), None);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn untracked_hides_outer_target() {
        let outer: Rc<dyn Subscriber> = Rc::new(Named(5));
        with_target(Some(outer), || {
            assert!(has_target());
            untracked(|| assert!(!has_target()));
            assert_eq!(current_id(), Some(5));
        });
        assert!(!has_target());
    }

    #[test]
    fn guard_pops_on_unwind() {
        let target: Rc<dyn Subscriber> = Rc::new(Named(3));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = track(Some(target));
            panic!("evaluation failed");
        }));
        assert!(result.is_err());
        assert_eq!(depth(), 0);
        assert!(current_target().is_none());
    }
}
