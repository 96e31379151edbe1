#![forbid(unsafe_code)]

//! Platform output primitives.
//!
//! The reconciler is platform-agnostic: every structural change goes
//! through a [`NodeOps`] backend. A browser backend would forward to the
//! DOM; `weft-harness` provides an in-memory one that records each call.

use std::fmt;

/// Attribute marking markup produced by server-side rendering.
pub const SSR_ATTR: &str = "data-server-rendered";

/// Kind of a real node, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Text,
    Comment,
}

/// Structural operations the reconciler needs from a platform.
///
/// Handles are cheap to clone and compare by node identity.
pub trait NodeOps {
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    fn create_element(&self, tag: &str) -> Self::Node;
    fn create_element_ns(&self, namespace: &str, tag: &str) -> Self::Node;
    fn create_text_node(&self, text: &str) -> Self::Node;
    fn create_comment(&self, text: &str) -> Self::Node;

    /// Insert `node` into `parent` before `reference`, or append when
    /// `reference` is `None`. An attached node is moved.
    fn insert_before(&self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>);
    fn remove_child(&self, parent: &Self::Node, child: &Self::Node);
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);

    fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;

    fn has_child_nodes(&self, node: &Self::Node) -> bool {
        self.first_child(node).is_some()
    }

    /// Tag name as the platform reports it; compared case-insensitively.
    fn tag_name(&self, node: &Self::Node) -> String;
    fn node_type(&self, node: &Self::Node) -> NodeType;

    /// Replace an element's content with `text`, or the data of a text or
    /// comment node.
    fn set_text_content(&self, node: &Self::Node, text: &str);
    /// Data of a text or comment node.
    fn text_data(&self, node: &Self::Node) -> Option<String>;

    fn set_style_scope(&self, node: &Self::Node, scope_id: &str);
    fn has_attribute(&self, node: &Self::Node, name: &str) -> bool;
    fn remove_attribute(&self, node: &Self::Node, name: &str);
    fn inner_html(&self, node: &Self::Node) -> String;
}
