#![forbid(unsafe_code)]

//! Reactive dependency tracking for Weft.
//!
//! This crate keeps track of which evaluations read which pieces of state,
//! and tells them when that state changes:
//!
//! - [`Dep`]: an observable subject holding an ordered, identity-deduplicated
//!   list of [`Subscriber`]s.
//! - [`registry`]: the per-thread "current evaluator" slot and its stack.
//! - [`Property`]: an explicit get/set accessor wired to a `Dep`.
//! - [`Observer`]: instrumentation attached to an observed [`Object`] or
//!   [`Array`], owning the container-level `Dep`.
//! - [`set`] / [`del`]: adding and removing keys after observation.
//! - [`traverse`]: deep dependency registration over a reachable graph.
//! - [`Effect`] and [`Computed`]: small synchronous subscribers.
//!
//! # Architecture
//!
//! State lives in dynamically typed [`Value`]s. Containers are shared
//! handles (`Rc<RefCell<..>>`), so identity is pointer identity. Observing a
//! container stamps it with an [`Observer`] and turns each own key into a
//! reactive [`Property`]. Reads made while a subscriber is the current
//! target register that subscriber with every touched `Dep`; writes call
//! [`Dep::notify`].
//!
//! `Dep` stores subscribers as `Weak` handles and prunes dead ones lazily
//! during notification, so subscribers and deps never keep each other alive.
//!
//! # Invariants
//!
//! 1. A container carries at most one `Observer`; observing it again returns
//!    the same instance.
//! 2. A write that is value-identical to the current value (NaN equals NaN)
//!    notifies nobody.
//! 3. Outside batched scheduling, notification order is ascending
//!    subscriber id.
//! 4. Every target push is paired with a pop on all exit paths, including
//!    unwinding, when the scoped [`registry::TargetGuard`] is used.

pub mod array;
pub mod computed;
pub mod config;
pub mod dep;
pub mod effect;
pub mod mutate;
pub mod observer;
pub mod property;
pub mod registry;
pub mod traverse;
pub mod value;
pub mod warning;

mod tracker;

pub use array::ArrayMethod;
pub use computed::Computed;
pub use config::{ConfigGuard, ReactiveConfig, WarnHandler, should_observe, toggle_observing};
pub use dep::{Dep, DepId, Subscriber, SubscriberId, next_subscriber_id};
pub use effect::Effect;
pub use mutate::{del, set};
pub use observer::{Observer, define_reactive, observe, observe_root};
pub use property::{Property, Trackable};
pub use registry::{TargetGuard, current_target, pop_target, push_target, track, untracked};
pub use traverse::traverse;
pub use value::{
    Array, Getter, Key, MAX_ARRAY_LENGTH, Object, PropertyDescriptor, Setter, Value,
};
pub use warning::ReactiveWarning;
