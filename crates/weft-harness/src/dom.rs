#![forbid(unsafe_code)]

//! In-memory node tree implementing [`NodeOps`].
//!
//! Every call the reconciler makes is appended to an operation log, so tests
//! can assert exactly which structural changes a patch produced. Fixture
//! builders ([`MemoryDom::element`], [`MemoryDom::append`], ...) bypass the
//! log; they stand in for markup that existed before the patch.

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;
use weft_vdom::{NodeOps, NodeType};

/// Handle to a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomNode(pub usize);

/// One recorded structural operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomOp {
    CreateElement { node: DomNode, tag: String },
    CreateText { node: DomNode, text: String },
    CreateComment { node: DomNode, text: String },
    /// A detached node was attached.
    Insert { parent: DomNode, node: DomNode, before: Option<DomNode> },
    /// An attached node changed position.
    Move { parent: DomNode, node: DomNode, before: Option<DomNode> },
    Remove { parent: DomNode, node: DomNode },
    SetText { node: DomNode, text: String },
    SetStyleScope { node: DomNode, scope: String },
    RemoveAttribute { node: DomNode, name: String },
}

/// Counts of logged operations by category.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpStats {
    pub created: usize,
    pub inserted: usize,
    pub moved: usize,
    pub removed: usize,
    pub text_updates: usize,
}

impl OpStats {
    /// Operations that changed the shape of the tree.
    #[must_use]
    pub fn structural(&self) -> usize {
        self.created + self.inserted + self.moved + self.removed
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Element { tag: String, ns: Option<String> },
    Text,
    Comment,
}

#[derive(Debug, Clone)]
struct Record {
    kind: Kind,
    text: String,
    parent: Option<DomNode>,
    children: Vec<DomNode>,
    attrs: IndexMap<String, String>,
    scopes: Vec<String>,
}

impl Record {
    fn new(kind: Kind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_owned(),
            parent: None,
            children: Vec::new(),
            attrs: IndexMap::new(),
            scopes: Vec::new(),
        }
    }
}

/// Arena-backed node tree with an operation log.
#[derive(Debug, Default)]
pub struct MemoryDom {
    nodes: RefCell<Vec<Record>>,
    log: RefCell<Vec<DomOp>>,
}

impl MemoryDom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&self, record: Record) -> DomNode {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(record);
        DomNode(nodes.len() - 1)
    }

    fn record(&self, op: DomOp) {
        tracing::trace!(target: "weft_harness", ?op, "dom op");
        self.log.borrow_mut().push(op);
    }

    fn detach(&self, node: DomNode) -> Option<DomNode> {
        let mut nodes = self.nodes.borrow_mut();
        let parent = nodes[node.0].parent.take()?;
        nodes[parent.0].children.retain(|&c| c != node);
        Some(parent)
    }

    fn attach(&self, parent: DomNode, node: DomNode, before: Option<DomNode>) {
        let mut nodes = self.nodes.borrow_mut();
        let siblings = &mut nodes[parent.0].children;
        let at = before
            .and_then(|b| siblings.iter().position(|&c| c == b))
            .unwrap_or(siblings.len());
        siblings.insert(at, node);
        nodes[node.0].parent = Some(parent);
    }

    fn place(&self, parent: DomNode, node: DomNode, before: Option<DomNode>) {
        let was_attached = self.detach(node).is_some();
        self.attach(parent, node, before);
        self.record(if was_attached {
            DomOp::Move { parent, node, before }
        } else {
            DomOp::Insert { parent, node, before }
        });
    }

    // ─── Fixtures (unlogged) ───────────────────────────────────────────────

    #[must_use]
    pub fn element(&self, tag: &str) -> DomNode {
        self.alloc(Record::new(
            Kind::Element {
                tag: tag.to_owned(),
                ns: None,
            },
            "",
        ))
    }

    #[must_use]
    pub fn text(&self, text: &str) -> DomNode {
        self.alloc(Record::new(Kind::Text, text))
    }

    #[must_use]
    pub fn comment(&self, text: &str) -> DomNode {
        self.alloc(Record::new(Kind::Comment, text))
    }

    pub fn append(&self, parent: DomNode, child: DomNode) {
        self.detach(child);
        self.attach(parent, child, None);
    }

    pub fn set_attribute(&self, node: DomNode, name: &str, value: &str) {
        self.nodes.borrow_mut()[node.0]
            .attrs
            .insert(name.to_owned(), value.to_owned());
    }

    // ─── Inspection ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn log(&self) -> Vec<DomOp> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    #[must_use]
    pub fn stats(&self) -> OpStats {
        let mut stats = OpStats::default();
        for op in self.log.borrow().iter() {
            match op {
                DomOp::CreateElement { .. } | DomOp::CreateText { .. } | DomOp::CreateComment { .. } => {
                    stats.created += 1;
                }
                DomOp::Insert { .. } => stats.inserted += 1,
                DomOp::Move { .. } => stats.moved += 1,
                DomOp::Remove { .. } => stats.removed += 1,
                DomOp::SetText { .. } => stats.text_updates += 1,
                DomOp::SetStyleScope { .. } | DomOp::RemoveAttribute { .. } => {}
            }
        }
        stats
    }

    #[must_use]
    pub fn children(&self, node: DomNode) -> Vec<DomNode> {
        self.nodes.borrow()[node.0].children.clone()
    }

    #[must_use]
    pub fn parent(&self, node: DomNode) -> Option<DomNode> {
        self.nodes.borrow()[node.0].parent
    }

    #[must_use]
    pub fn attribute(&self, node: DomNode, name: &str) -> Option<String> {
        self.nodes.borrow()[node.0].attrs.get(name).cloned()
    }

    #[must_use]
    pub fn style_scopes(&self, node: DomNode) -> Vec<String> {
        self.nodes.borrow()[node.0].scopes.clone()
    }

    /// Markup for `node` and its subtree.
    ///
    /// Elements print as `<tag a="v">...</tag>`, comments as `<!--x-->`.
    /// Style scopes print as bare attributes.
    #[must_use]
    pub fn serialize(&self, node: DomNode) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: DomNode, out: &mut String) {
        let record = self.nodes.borrow()[node.0].clone();
        match &record.kind {
            Kind::Text => out.push_str(&record.text),
            Kind::Comment => {
                let _ = write!(out, "<!--{}-->", record.text);
            }
            Kind::Element { tag, .. } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &record.attrs {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                for scope in &record.scopes {
                    let _ = write!(out, " {scope}");
                }
                out.push('>');
                for child in &record.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

impl NodeOps for MemoryDom {
    type Node = DomNode;

    fn create_element(&self, tag: &str) -> DomNode {
        let node = self.element(tag);
        self.record(DomOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_element_ns(&self, namespace: &str, tag: &str) -> DomNode {
        let node = self.alloc(Record::new(
            Kind::Element {
                tag: tag.to_owned(),
                ns: Some(namespace.to_owned()),
            },
            "",
        ));
        self.record(DomOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_text_node(&self, text: &str) -> DomNode {
        let node = self.text(text);
        self.record(DomOp::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn create_comment(&self, text: &str) -> DomNode {
        let node = self.comment(text);
        self.record(DomOp::CreateComment {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn insert_before(&self, parent: &DomNode, node: &DomNode, reference: Option<&DomNode>) {
        self.place(*parent, *node, reference.copied());
    }

    fn remove_child(&self, parent: &DomNode, child: &DomNode) {
        if self.parent(*child) == Some(*parent) {
            self.detach(*child);
            self.record(DomOp::Remove {
                parent: *parent,
                node: *child,
            });
        }
    }

    fn append_child(&self, parent: &DomNode, child: &DomNode) {
        self.place(*parent, *child, None);
    }

    fn parent_node(&self, node: &DomNode) -> Option<DomNode> {
        self.parent(*node)
    }

    fn next_sibling(&self, node: &DomNode) -> Option<DomNode> {
        let nodes = self.nodes.borrow();
        let parent = nodes[node.0].parent?;
        let siblings = &nodes[parent.0].children;
        let at = siblings.iter().position(|c| c == node)?;
        siblings.get(at + 1).copied()
    }

    fn first_child(&self, node: &DomNode) -> Option<DomNode> {
        self.nodes.borrow()[node.0].children.first().copied()
    }

    fn tag_name(&self, node: &DomNode) -> String {
        match &self.nodes.borrow()[node.0].kind {
            Kind::Element { tag, ns: None } => tag.to_ascii_uppercase(),
            Kind::Element { tag, ns: Some(_) } => tag.clone(),
            Kind::Text => "#text".to_owned(),
            Kind::Comment => "#comment".to_owned(),
        }
    }

    fn node_type(&self, node: &DomNode) -> NodeType {
        match self.nodes.borrow()[node.0].kind {
            Kind::Element { .. } => NodeType::Element,
            Kind::Text => NodeType::Text,
            Kind::Comment => NodeType::Comment,
        }
    }

    fn set_text_content(&self, node: &DomNode, text: &str) {
        let is_element = matches!(self.nodes.borrow()[node.0].kind, Kind::Element { .. });
        if is_element {
            for child in self.children(*node) {
                self.detach(child);
            }
            if !text.is_empty() {
                let child = self.text(text);
                self.attach(*node, child, None);
            }
        } else {
            self.nodes.borrow_mut()[node.0].text = text.to_owned();
        }
        self.record(DomOp::SetText {
            node: *node,
            text: text.to_owned(),
        });
    }

    fn text_data(&self, node: &DomNode) -> Option<String> {
        let nodes = self.nodes.borrow();
        match nodes[node.0].kind {
            Kind::Text | Kind::Comment => Some(nodes[node.0].text.clone()),
            Kind::Element { .. } => None,
        }
    }

    fn set_style_scope(&self, node: &DomNode, scope_id: &str) {
        self.nodes.borrow_mut()[node.0].scopes.push(scope_id.to_owned());
        self.record(DomOp::SetStyleScope {
            node: *node,
            scope: scope_id.to_owned(),
        });
    }

    fn has_attribute(&self, node: &DomNode, name: &str) -> bool {
        self.nodes.borrow()[node.0].attrs.contains_key(name)
    }

    fn remove_attribute(&self, node: &DomNode, name: &str) {
        self.nodes.borrow_mut()[node.0].attrs.shift_remove(name);
        self.record(DomOp::RemoveAttribute {
            node: *node,
            name: name.to_owned(),
        });
    }

    fn inner_html(&self, node: &DomNode) -> String {
        self.children(*node)
            .into_iter()
            .map(|child| self.serialize(child))
            .collect()
    }
}
