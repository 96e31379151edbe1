#![forbid(unsafe_code)]

//! Test support for Weft.
//!
//! [`MemoryDom`] is a [`weft_vdom::NodeOps`] backend that keeps its tree in
//! memory and logs every structural call, so reconciler tests can assert
//! on the exact operations a patch performed. [`capture_events`] collects
//! the `tracing` events emitted while a closure runs.

pub mod dom;
pub mod logging;

pub use dom::{DomNode, DomOp, MemoryDom, OpStats};
pub use logging::{CapturedEvent, capture_events, init_test_logging};
