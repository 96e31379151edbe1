#![forbid(unsafe_code)]

//! The reuse-versus-rebuild predicate.
//!
//! Two description nodes have the same identity when the old one's real
//! node can be patched into the new one instead of being replaced.

use std::rc::Rc;

use crate::vnode::VNode;

/// `<input>` types that render the same control and may patch into each
/// other.
const TEXT_INPUT_TYPES: [&str; 7] = ["text", "number", "password", "search", "email", "tel", "url"];

#[must_use]
pub fn is_text_input_type(ty: &str) -> bool {
    TEXT_INPUT_TYPES.contains(&ty)
}

/// Whether `a` and `b` may share one real node.
///
/// Keys and async factories must match. Then either the shapes agree (tag,
/// comment-ness, presence of data, compatible input type), or `a` is an
/// unresolved async placeholder whose counterpart's factory has not failed.
#[must_use]
pub fn same_identity<N>(a: &VNode<N>, b: &VNode<N>) -> bool {
    if a.key != b.key || !same_factory(a, b) {
        return false;
    }
    let same_shape = a.tag() == b.tag()
        && a.is_component() == b.is_component()
        && a.is_comment() == b.is_comment()
        && a.data.is_some() == b.data.is_some()
        && same_input_type(a, b);
    same_shape
        || (a.is_async_placeholder()
            && b.async_factory.as_ref().is_some_and(|f| !f.has_failed()))
}

fn same_factory<N>(a: &VNode<N>, b: &VNode<N>) -> bool {
    match (&a.async_factory, &b.async_factory) {
        (None, None) => true,
        (Some(x), Some(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Input types match exactly or are both text-like. Non-inputs always match.
#[must_use]
pub fn same_input_type<N>(a: &VNode<N>, b: &VNode<N>) -> bool {
    if a.tag() != Some("input") {
        return true;
    }
    let (ta, tb) = (a.input_type(), b.input_type());
    ta == tb || (ta.is_some_and(is_text_input_type) && tb.is_some_and(is_text_input_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NodeHooks;
    use crate::vnode::{AsyncFactory, VNodeFlags};

    type Node = VNode<u32>;

    #[test]
    fn unkeyed_same_tag_matches() {
        assert!(same_identity(&Node::element("p"), &Node::element("p")));
        assert!(!same_identity(&Node::element("p"), &Node::element("div")));
    }

    #[test]
    fn keys_must_match() {
        let a = Node::element("li").with_key("a");
        assert!(same_identity(&a, &Node::element("li").with_key("a")));
        assert!(!same_identity(&a, &Node::element("li").with_key("b")));
        assert!(!same_identity(&a, &Node::element("li")));
    }

    #[test]
    fn text_nodes_match_regardless_of_content() {
        assert!(same_identity(&Node::text("x"), &Node::text("y")));
        assert!(!same_identity(&Node::text("x"), &Node::comment("x")));
    }

    #[test]
    fn data_presence_matters() {
        let bare = Node::element("div");
        let with_data = Node::element("div").with_attr("id", "x");
        assert!(!same_identity(&bare, &with_data));
    }

    #[test]
    fn component_never_matches_plain_element() {
        let comp = Node::component("div", NodeHooks::default());
        let elem = Node::element("div").with_hooks(NodeHooks::default());
        assert!(!same_identity(&comp, &elem));
    }

    #[test]
    fn text_like_inputs_interchange() {
        let text = Node::element("input").with_attr("type", "text");
        let email = Node::element("input").with_attr("type", "email");
        let checkbox = Node::element("input").with_attr("type", "checkbox");
        assert!(same_identity(&text, &email));
        assert!(!same_identity(&text, &checkbox));
        assert!(same_identity(&checkbox, &checkbox.clone_node()));
    }

    #[test]
    fn async_placeholder_matches_until_factory_fails() {
        let factory = AsyncFactory::new();
        let mut old = Node::async_placeholder(Rc::clone(&factory));
        old.flags.insert(VNodeFlags::ASYNC_PLACEHOLDER);
        let mut resolved = Node::component("weft-component-1-lazy", NodeHooks::default());
        resolved.async_factory = Some(Rc::clone(&factory));

        assert!(same_identity(&old, &resolved));
        factory.fail();
        assert!(!same_identity(&old, &resolved));
    }

    #[test]
    fn different_factories_never_match() {
        let a = Node::async_placeholder(AsyncFactory::new());
        let b = Node::async_placeholder(AsyncFactory::new());
        assert!(!same_identity(&a, &b));
    }
}
