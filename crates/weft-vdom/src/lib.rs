#![forbid(unsafe_code)]

//! Description trees and their reconciliation against a real node tree.
//!
//! - [`VNode`]: a node of the desired output, generic over the platform
//!   handle type.
//! - [`same_identity`]: decides whether an old node may be patched into a
//!   new one or must be replaced.
//! - [`NodeOps`]: the structural primitives a platform backend provides.
//! - [`Module`] and [`NodeHooks`]: lifecycle callbacks run by the
//!   reconciler.
//! - [`Patcher`]: the reconciler itself, including the keyed children diff
//!   and hydration of server-rendered markup.
//!
//! # Example
//!
//! ```ignore
//! let patcher = Patcher::new(Rc::new(dom), []);
//! let mut first = VNode::element("ul").with_children([item("a"), item("b")]);
//! patcher.mount(&mut first);
//!
//! let mut next = VNode::element("ul").with_children([item("b"), item("a")]);
//! patcher.update(first, &mut next);
//! ```

pub mod config;
pub mod hooks;
pub mod identity;
pub mod ops;
pub mod patch;
pub mod vnode;
pub mod warning;

mod children;
mod hydrate;

pub use config::{PatchConfig, PatchWarnHandler};
pub use hooks::{
    ComponentInstance, DestroyHook, InitHook, InsertHook, InsertedVNode, Module, NodeHooks,
    PairHook, PrepatchHook, RemoveCallback, RemoveHook,
};
pub use identity::{is_text_input_type, same_identity, same_input_type};
pub use ops::{NodeOps, NodeType, SSR_ATTR};
pub use patch::{PatchTarget, Patcher};
pub use vnode::{
    AsyncFactory, AsyncState, DirectiveBinding, NodeId, NodeKey, PlaceholderLink, VNode,
    VNodeData, VNodeFlags, VNodeKind,
};
pub use warning::PatchWarning;
