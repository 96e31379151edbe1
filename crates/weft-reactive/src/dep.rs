#![forbid(unsafe_code)]

//! Observable subjects and the subscriber contract.
//!
//! A [`Dep`] is created for every reactive property and for every observed
//! container. Subscribers are held weakly and deduplicated by identity; dead
//! entries are pruned during [`Dep::notify`].
//!
//! # Invariants
//!
//! 1. Dep ids are unique and strictly increasing in creation order.
//! 2. A subscriber appears at most once in a dep's list.
//! 3. `notify` snapshots the list before delivering; subscribers added or
//!    removed during delivery do not affect the current pass.
//! 4. Outside batched scheduling, delivery order is ascending subscriber id.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::{config, registry};

// ─── Id generation ───────────────────────────────────────────────────────────

static NEXT_DEP_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a [`Dep`], monotonically assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(pub u64);

/// Identifier of a [`Subscriber`]. Lower ids are notified first when
/// notification is not batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

/// Allocate a fresh subscriber id (registration order).
#[must_use]
pub fn next_subscriber_id() -> SubscriberId {
    SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
}

// ─── Subscriber ──────────────────────────────────────────────────────────────

/// A unit of re-evaluation that can depend on [`Dep`]s.
///
/// The core only calls these three methods; constructing, scheduling and
/// tearing down subscribers is the caller's business.
pub trait Subscriber {
    /// Ordering key for unbatched delivery.
    fn id(&self) -> SubscriberId;

    /// Called when this subscriber, as the current target, reads `dep`.
    ///
    /// Implementations normally record the dep and call
    /// [`Dep::add_sub`] with themselves.
    fn add_dep(self: Rc<Self>, dep: &Dep);

    /// Called when a dep this subscriber registered with changes.
    fn update(&self);

    /// Lazy subscribers only mark themselves stale in [`update`](Self::update).
    /// A notify delivers to all of them before any eager subscriber runs.
    fn is_lazy(&self) -> bool {
        false
    }
}

// ─── Dep ─────────────────────────────────────────────────────────────────────

type SubscriberList = SmallVec<[Weak<dyn Subscriber>; 4]>;

struct DepInner {
    id: DepId,
    subs: RefCell<SubscriberList>,
}

/// An observable subject. Cloning yields another handle to the same dep.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id.0)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn same_subscriber(a: &Weak<dyn Subscriber>, b: &Weak<dyn Subscriber>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

impl Dep {
    /// Create a dep with a fresh id and no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DepInner {
                id: DepId(NEXT_DEP_ID.fetch_add(1, Ordering::Relaxed)),
                subs: RefCell::new(SmallVec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Whether two handles refer to the same dep.
    #[must_use]
    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Add `sub` unless it is already subscribed.
    pub fn add_sub(&self, sub: &Rc<dyn Subscriber>) {
        let weak = Rc::downgrade(sub);
        let mut subs = self.inner.subs.borrow_mut();
        if !subs.iter().any(|s| same_subscriber(s, &weak)) {
            subs.push(weak);
        }
    }

    /// Remove `sub` if present.
    pub fn remove_sub(&self, sub: &Rc<dyn Subscriber>) {
        let weak = Rc::downgrade(sub);
        self.inner
            .subs
            .borrow_mut()
            .retain(|s| !same_subscriber(s, &weak));
    }

    /// Register the current target (if any) as depending on this dep.
    pub fn depend(&self) {
        if let Some(target) = registry::current_target() {
            tracing::trace!(dep = self.inner.id.0, subscriber = target.id().0, "depend");
            target.add_dep(self);
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subs
            .borrow()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Deliver `update()` to every subscriber in a fixed snapshot, lazy
    /// subscribers first.
    pub fn notify(&self) {
        let mut snapshot: SmallVec<[Rc<dyn Subscriber>; 8]> = {
            let mut subs = self.inner.subs.borrow_mut();
            subs.retain(|s| s.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        if config::async_scheduling() {
            snapshot.sort_by_key(|s| !s.is_lazy());
        } else {
            snapshot.sort_by_key(|s| (!s.is_lazy(), s.id()));
        }
        tracing::trace!(
            dep = self.inner.id.0,
            subscribers = snapshot.len(),
            "dep notify"
        );
        for sub in snapshot {
            sub.update();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactiveConfig;
    use std::cell::Cell;

    struct Listener {
        id: SubscriberId,
        log: Rc<RefCell<Vec<u64>>>,
        adds: Cell<u32>,
        lazy: bool,
    }

    impl Listener {
        fn new(id: u64, log: &Rc<RefCell<Vec<u64>>>) -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId(id),
                log: Rc::clone(log),
                adds: Cell::new(0),
                lazy: false,
            })
        }

        fn lazy(id: u64, log: &Rc<RefCell<Vec<u64>>>) -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId(id),
                log: Rc::clone(log),
                adds: Cell::new(0),
                lazy: true,
            })
        }
    }

    impl Subscriber for Listener {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn add_dep(self: Rc<Self>, dep: &Dep) {
            self.adds.set(self.adds.get() + 1);
            dep.add_sub(&(self as Rc<dyn Subscriber>));
        }

        fn update(&self) {
            self.log.borrow_mut().push(self.id.0);
        }

        fn is_lazy(&self) -> bool {
            self.lazy
        }
    }

    #[test]
    fn ids_are_monotonic() {
        let a = Dep::new();
        let b = Dep::new();
        assert!(b.id() > a.id());
    }

    #[test]
    fn add_sub_deduplicates_by_identity() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener: Rc<dyn Subscriber> = Listener::new(1, &log);
        let dep = Dep::new();
        dep.add_sub(&listener);
        dep.add_sub(&listener);
        assert_eq!(dep.subscriber_count(), 1);

        dep.notify();
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn unbatched_notify_sorts_by_id() {
        let _guard = ReactiveConfig::default()
            .with_async_scheduling(false)
            .install();
        let log = Rc::new(RefCell::new(Vec::new()));
        let dep = Dep::new();
        let subs: Vec<Rc<dyn Subscriber>> = [3, 1, 2]
            .into_iter()
            .map(|id| Listener::new(id, &log) as Rc<dyn Subscriber>)
            .collect();
        for sub in &subs {
            dep.add_sub(sub);
        }

        dep.notify();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn batched_notify_keeps_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let dep = Dep::new();
        let subs: Vec<Rc<dyn Subscriber>> = [3, 1, 2]
            .into_iter()
            .map(|id| Listener::new(id, &log) as Rc<dyn Subscriber>)
            .collect();
        for sub in &subs {
            dep.add_sub(sub);
        }

        dep.notify();
        assert_eq!(*log.borrow(), vec![3, 1, 2]);
    }

    #[test]
    fn lazy_subscribers_hear_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let dep = Dep::new();
        let subs: [Rc<dyn Subscriber>; 4] = [
            Listener::new(1, &log) as Rc<dyn Subscriber>,
            Listener::lazy(5, &log),
            Listener::new(2, &log),
            Listener::lazy(4, &log),
        ];
        for sub in &subs {
            dep.add_sub(sub);
        }

        dep.notify();
        assert_eq!(*log.borrow(), vec![5, 4, 1, 2]);

        log.borrow_mut().clear();
        let _guard = ReactiveConfig::default()
            .with_async_scheduling(false)
            .install();
        dep.notify();
        assert_eq!(*log.borrow(), vec![4, 5, 1, 2]);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let dep = Dep::new();
        {
            let listener: Rc<dyn Subscriber> = Listener::new(7, &log);
            dep.add_sub(&listener);
            assert_eq!(dep.subscriber_count(), 1);
        }
        assert_eq!(dep.subscriber_count(), 0);
        dep.notify();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remove_sub_stops_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener: Rc<dyn Subscriber> = Listener::new(4, &log);
        let dep = Dep::new();
        dep.add_sub(&listener);
        dep.remove_sub(&listener);
        dep.notify();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn depend_without_target_is_noop() {
        let dep = Dep::new();
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn depend_registers_current_target() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = Listener::new(9, &log);
        let dep = Dep::new();
        {
            let _guard = registry::track(Some(Rc::clone(&listener) as Rc<dyn Subscriber>));
            dep.depend();
        }
        assert_eq!(listener.adds.get(), 1);
        assert_eq!(dep.subscriber_count(), 1);
    }

    /// Subscribers added while a notify pass is running wait for the next pass.
    #[test]
    fn snapshot_is_fixed_during_notify() {
        struct Adder {
            dep: Dep,
            late: Rc<dyn Subscriber>,
            hits: Cell<u32>,
        }
        impl Subscriber for Adder {
            fn id(&self) -> SubscriberId {
                SubscriberId(1)
            }
            fn add_dep(self: Rc<Self>, _dep: &Dep) {}
            fn update(&self) {
                self.hits.set(self.hits.get() + 1);
                self.dep.add_sub(&self.late);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let dep = Dep::new();
        let late: Rc<dyn Subscriber> = Listener::new(2, &log);
        let adder: Rc<dyn Subscriber> = Rc::new(Adder {
            dep: dep.clone(),
            late: Rc::clone(&late),
            hits: Cell::new(0),
        });
        dep.add_sub(&adder);

        dep.notify();
        assert!(log.borrow().is_empty());

        dep.notify();
        assert_eq!(*log.borrow(), vec![2]);
    }
}
