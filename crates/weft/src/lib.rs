#![forbid(unsafe_code)]

//! Weft public facade crate.
//!
//! Re-exports the reactive layer and the reconciler, and provides
//! [`View`](view::View), which keeps a real tree in sync with reactive state.

pub use weft_reactive as reactive;
#[cfg(feature = "vdom")]
pub use weft_vdom as vdom;

#[cfg(feature = "vdom")]
pub mod view;

pub mod prelude {
    pub use weft_reactive::{
        Array, Computed, Effect, Object, ReactiveConfig, Value, del, observe, set,
    };
    #[cfg(feature = "vdom")]
    pub use weft_vdom::{Module, NodeHooks, NodeOps, PatchConfig, Patcher, VNode};

    pub use crate::reactive;
    #[cfg(feature = "vdom")]
    pub use crate::{vdom, view::View};
}
