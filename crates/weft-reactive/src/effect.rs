#![forbid(unsafe_code)]

//! A minimal synchronous subscriber.
//!
//! An [`Effect`] runs its closure immediately with itself as the current
//! target, then reruns it inline each time one of the deps it read
//! notifies. After every run it unsubscribes from deps the run no longer
//! touched. There is no queue and no batching: this is the smallest
//! subscriber that makes the reactive layer usable without an external
//! scheduler.
//!
//! # Failure Modes
//!
//! - **Write to an own dependency during the run**: the nested
//!   notification finds the effect already running and is dropped; the
//!   effect does not loop.
//! - **Panicking closure**: the panic propagates to whoever triggered the
//!   run. The effect is left idle, keeps the deps it read before the
//!   panic and runs again on the next notification.
//! - **All handles dropped**: deps hold subscribers weakly, so the effect
//!   simply stops receiving updates and is pruned on the next notify.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dep::{Dep, Subscriber, SubscriberId, next_subscriber_id};
use crate::registry;
use crate::tracker::DepTracker;

struct EffectInner {
    id: SubscriberId,
    body: RefCell<Box<dyn FnMut()>>,
    tracker: RefCell<DepTracker>,
    runs: Cell<u64>,
    running: Cell<bool>,
    active: Cell<bool>,
    this: Weak<EffectInner>,
}

/// Clears the running flag when a run ends, including by unwinding.
struct RunningGuard<'a>(&'a Cell<bool>);

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl EffectInner {
    fn as_subscriber(&self) -> Option<Rc<dyn Subscriber>> {
        self.this.upgrade().map(|rc| rc as Rc<dyn Subscriber>)
    }

    fn run(&self) {
        if self.running.get() || !self.active.get() {
            return;
        }
        let Some(this) = self.as_subscriber() else {
            return;
        };
        {
            let _running = RunningGuard::enter(&self.running);
            let _target = registry::track(Some(Rc::clone(&this)));
            (self.body.borrow_mut())();
        }

        let stale = self.tracker.borrow_mut().finish();
        for dep in &stale {
            dep.remove_sub(&this);
        }
        self.runs.set(self.runs.get() + 1);
        tracing::trace!(
            subscriber = self.id.0,
            runs = self.runs.get(),
            dropped = stale.len(),
            "effect run"
        );
    }
}

impl Subscriber for EffectInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(self: Rc<Self>, dep: &Dep) {
        if self.tracker.borrow_mut().record(dep) {
            dep.add_sub(&(self as Rc<dyn Subscriber>));
        }
    }

    fn update(&self) {
        self.run();
    }
}

/// A closure rerun whenever a dependency it read changes.
///
/// Cloning yields another handle to the same effect.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id.0)
            .field("runs", &self.inner.runs.get())
            .field("deps", &self.dep_count())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

impl Effect {
    /// Create the effect and run it once.
    pub fn new(body: impl FnMut() + 'static) -> Self {
        let inner = Rc::new_cyclic(|this| EffectInner {
            id: next_subscriber_id(),
            body: RefCell::new(Box::new(body)),
            tracker: RefCell::new(DepTracker::default()),
            runs: Cell::new(0),
            running: Cell::new(false),
            active: Cell::new(true),
            this: this.clone(),
        });
        inner.run();
        Self { inner }
    }

    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Rerun the closure now.
    pub fn update(&self) {
        self.inner.run();
    }

    /// Unsubscribe from every dep and ignore further updates.
    pub fn stop(&self) {
        self.inner.active.set(false);
        let deps = self.inner.tracker.borrow_mut().take_all();
        let this: Rc<dyn Subscriber> = Rc::clone(&self.inner) as Rc<dyn Subscriber>;
        for dep in deps {
            dep.remove_sub(&this);
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Completed runs, including the initial one.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.inner.runs.get()
    }

    /// Number of deps read on the latest run.
    #[must_use]
    pub fn dep_count(&self) -> usize {
        self.inner.tracker.borrow().deps().len()
    }

    /// This effect as a registry target.
    #[must_use]
    pub fn as_subscriber(&self) -> Rc<dyn Subscriber> {
        Rc::clone(&self.inner) as Rc<dyn Subscriber>
    }
}
