#![forbid(unsafe_code)]

//! Adopting server-rendered markup.
//!
//! Hydration walks an existing real tree alongside a description tree and
//! records each real node on its description instead of creating one. Any
//! structural disagreement aborts the walk; the caller then discards the
//! markup and renders from scratch.

use weft_reactive::traverse;

use crate::ops::{NodeOps, NodeType};
use crate::patch::{InsertQueue, Patcher};
use crate::vnode::{VNode, VNodeFlags, VNodeKind};
use crate::warning::HydrationMismatch;

impl<B: NodeOps + 'static> Patcher<B> {
    pub(crate) fn hydrate(
        &self,
        elm: &B::Node,
        vnode: &mut VNode<B::Node>,
        queue: &mut InsertQueue<B::Node>,
        in_v_pre: bool,
    ) -> Result<(), HydrationMismatch> {
        let in_v_pre = in_v_pre || vnode.data.as_ref().is_some_and(|d| d.pre);
        vnode.elm = Some(elm.clone());

        if vnode.is_comment() && vnode.async_factory.is_some() {
            vnode.flags.insert(VNodeFlags::ASYNC_PLACEHOLDER);
            return Ok(());
        }
        self.assert_node_match(elm, vnode, in_v_pre)?;

        if vnode.data.is_some() {
            if let Some(init) = vnode.hooks().and_then(|h| h.init.clone()) {
                init(vnode, true);
            }
            if vnode.component_instance.is_some() {
                self.init_component(vnode, queue);
                return Ok(());
            }
        }

        let Some(tag) = vnode.tag().map(str::to_owned) else {
            let text = vnode.text.as_deref().unwrap_or("");
            if self.ops.text_data(elm).as_deref() != Some(text) {
                self.ops.set_text_content(elm, text);
            }
            return Ok(());
        };

        if !vnode.children.is_empty() {
            if !self.ops.has_child_nodes(elm) {
                self.create_children(vnode, queue);
            } else if let Some(client) = vnode.data.as_ref().and_then(|d| d.inner_html()) {
                let server = self.ops.inner_html(elm);
                if server != client {
                    return Err(HydrationMismatch::InnerHtml { server, client });
                }
            } else {
                let mut cursor = self.ops.first_child(elm);
                for child in &mut vnode.children {
                    let Some(node) = cursor else {
                        return Err(HydrationMismatch::MissingChildren { tag });
                    };
                    self.hydrate(&node, child, queue, in_v_pre)?;
                    cursor = self.ops.next_sibling(&node);
                }
                if cursor.is_some() {
                    return Err(HydrationMismatch::ExtraChildren { tag });
                }
            }
        }

        if let Some(data) = &vnode.data {
            if data.needs_create_hooks_on_hydrate() {
                self.invoke_create_hooks(vnode, queue);
            } else if let Some(class) = &data.class {
                // Register the class binding's deps for the render watcher.
                traverse(class);
            }
        }
        Ok(())
    }

    fn assert_node_match(
        &self,
        node: &B::Node,
        vnode: &VNode<B::Node>,
        in_v_pre: bool,
    ) -> Result<(), HydrationMismatch> {
        let found = self.ops.node_type(node);
        let matches = match &vnode.kind {
            VNodeKind::Component { .. } => true,
            VNodeKind::Element { tag, ns } => {
                found == NodeType::Element
                    && !self.is_unknown_element(tag, ns.as_deref(), in_v_pre)
                    && tag.eq_ignore_ascii_case(&self.ops.tag_name(node))
            }
            VNodeKind::Text => found == NodeType::Text,
            VNodeKind::Comment => found == NodeType::Comment,
        };
        if matches {
            return Ok(());
        }
        let expected = match &vnode.kind {
            VNodeKind::Element { tag, .. } | VNodeKind::Component { tag } => format!("<{tag}>"),
            VNodeKind::Text => "text node".to_owned(),
            VNodeKind::Comment => "comment node".to_owned(),
        };
        Err(HydrationMismatch::Node {
            expected,
            found: self.describe(node),
        })
    }

    fn describe(&self, node: &B::Node) -> String {
        match self.ops.node_type(node) {
            NodeType::Element => format!("<{}>", self.ops.tag_name(node).to_ascii_lowercase()),
            NodeType::Text => "text node".to_owned(),
            NodeType::Comment => "comment node".to_owned(),
        }
    }
}
