#![forbid(unsafe_code)]

//! Description nodes.
//!
//! A [`VNode`] describes one desired output node. A render produces a fresh
//! tree of them; the [`Patcher`](crate::Patcher) diffs it against the tree
//! kept from the previous render and records the real handle of every node
//! in [`VNode::elm`].
//!
//! # Design
//!
//! Trees are owned: children live in a `Vec` and the previous tree is
//! consumed by the next patch. Every node, including every `Clone`, gets its
//! own [`NodeId`], so a copy reused in a later render is patched like any
//! other node. [`VNode::clone_node`] additionally sets
//! [`VNodeFlags::CLONED`] so static copies can be skipped.
//!
//! A component's root node links back to the placeholder that hosts it
//! through a shared [`PlaceholderLink`]. Handle swaps on the root are
//! propagated up that chain.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use indexmap::IndexMap;
use weft_reactive::Value;

use crate::hooks::{ComponentInstance, InsertedVNode, NodeHooks};

// ─── Identity ───────────────────────────────────────────────────────────────

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Construction-time identity of a description node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Sibling key used by the keyed diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<i64> for NodeKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for NodeKey {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

/// Indices past `i64::MAX` become string keys with the same display form.
impl From<usize> for NodeKey {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or_else(|_| Self::Str(Rc::from(n.to_string())), Self::Int)
    }
}

// ─── Kind and flags ─────────────────────────────────────────────────────────

/// What a description node materializes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNodeKind {
    Element { tag: Rc<str>, ns: Option<Rc<str>> },
    /// Placeholder for a component. Its `init` hook creates the instance.
    Component { tag: Rc<str> },
    Text,
    Comment,
}

bitflags! {
    /// Reconciler-relevant markers on a description node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VNodeFlags: u8 {
        /// Proven free of reactive bindings.
        const STATIC = 1 << 0;
        /// Produced by [`VNode::clone_node`].
        const CLONED = 1 << 1;
        /// Rendered once and reused verbatim.
        const ONCE = 1 << 2;
        /// Created outside of a parent's child list.
        const ROOT_INSERT = 1 << 3;
        /// Still waiting for its async factory.
        const ASYNC_PLACEHOLDER = 1 << 4;
    }
}

/// Resolution state of an [`AsyncFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncState {
    Pending,
    Resolved,
    Failed,
}

/// Shared handle for a lazily resolved component.
///
/// Compared by pointer. The loader that owns it flips the state.
#[derive(Debug)]
pub struct AsyncFactory {
    state: Cell<AsyncState>,
}

impl AsyncFactory {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: Cell::new(AsyncState::Pending),
        })
    }

    pub fn resolve(&self) {
        self.state.set(AsyncState::Resolved);
    }

    pub fn fail(&self) {
        self.state.set(AsyncState::Failed);
    }

    #[must_use]
    pub fn state(&self) -> AsyncState {
        self.state.get()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.get() == AsyncState::Resolved
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.state.get() == AsyncState::Failed
    }
}

// ─── Data ───────────────────────────────────────────────────────────────────

/// A directive attached to an element.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveBinding {
    pub name: Rc<str>,
    pub value: Value,
}

/// Module-facing payload of a description node.
///
/// The reconciler only reads the hook table, `keep_alive`, `pre`,
/// `transition`, the `type` attribute and the `innerHTML` dom prop. The
/// rest is handed to registered [`Module`](crate::Module)s untouched.
pub struct VNodeData<N> {
    pub attrs: IndexMap<Rc<str>, Value>,
    pub class: Option<Value>,
    pub static_class: Option<Rc<str>>,
    pub style: Option<Value>,
    pub static_style: Option<Rc<str>>,
    pub dom_props: IndexMap<Rc<str>, Value>,
    pub on: IndexMap<Rc<str>, Value>,
    pub directives: Vec<DirectiveBinding>,
    pub hook: Option<NodeHooks<N>>,
    pub keep_alive: bool,
    pub pre: bool,
    pub transition: bool,
}

impl<N> Default for VNodeData<N> {
    fn default() -> Self {
        Self {
            attrs: IndexMap::new(),
            class: None,
            static_class: None,
            style: None,
            static_style: None,
            dom_props: IndexMap::new(),
            on: IndexMap::new(),
            directives: Vec::new(),
            hook: None,
            keep_alive: false,
            pre: false,
            transition: false,
        }
    }
}

impl<N> Clone for VNodeData<N> {
    fn clone(&self) -> Self {
        Self {
            attrs: self.attrs.clone(),
            class: self.class.clone(),
            static_class: self.static_class.clone(),
            style: self.style.clone(),
            static_style: self.static_style.clone(),
            dom_props: self.dom_props.clone(),
            on: self.on.clone(),
            directives: self.directives.clone(),
            hook: self.hook.clone(),
            keep_alive: self.keep_alive,
            pre: self.pre,
            transition: self.transition,
        }
    }
}

impl<N> fmt::Debug for VNodeData<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNodeData")
            .field("attrs", &self.attrs)
            .field("class", &self.class)
            .field("static_class", &self.static_class)
            .field("style", &self.style)
            .field("dom_props", &self.dom_props)
            .field("on", &self.on.keys().collect::<Vec<_>>())
            .field("directives", &self.directives)
            .field("hook", &self.hook.is_some())
            .field("keep_alive", &self.keep_alive)
            .field("pre", &self.pre)
            .finish_non_exhaustive()
    }
}

impl<N> VNodeData<N> {
    /// Declared `type` attribute, if it is a string.
    #[must_use]
    pub fn input_type(&self) -> Option<&str> {
        self.attrs.get("type").and_then(Value::as_str)
    }

    /// The `innerHTML` dom prop rendered to a string.
    #[must_use]
    pub fn inner_html(&self) -> Option<String> {
        self.dom_props
            .get("innerHTML")
            .map(Value::to_display_string)
    }

    /// Whether hydrating this node must run the full create hooks.
    ///
    /// Attributes, class and static style are already present in
    /// server-rendered markup; anything else is not.
    pub(crate) fn needs_create_hooks_on_hydrate(&self) -> bool {
        self.style.is_some()
            || !self.dom_props.is_empty()
            || !self.on.is_empty()
            || !self.directives.is_empty()
            || self.hook.is_some()
            || self.keep_alive
            || self.pre
            || self.transition
    }
}

// ─── Placeholder link ───────────────────────────────────────────────────────

/// Shared record of the component placeholder hosting a root node.
///
/// Holds a snapshot of the placeholder node so module hooks can run against
/// it when the component's root handle changes, and the insert queue
/// deferred from the component's initial mount.
pub struct PlaceholderLink<N> {
    pub vnode: RefCell<VNode<N>>,
    pending_insert: RefCell<Vec<InsertedVNode<N>>>,
}

impl<N> PlaceholderLink<N> {
    #[must_use]
    pub fn new(vnode: VNode<N>) -> Rc<Self> {
        Rc::new(Self {
            vnode: RefCell::new(vnode),
            pending_insert: RefCell::new(Vec::new()),
        })
    }

    /// Drain the insert queue left by the component's initial patch.
    pub fn take_pending_insert(&self) -> Vec<InsertedVNode<N>> {
        std::mem::take(&mut *self.pending_insert.borrow_mut())
    }

    #[must_use]
    pub fn pending_insert_len(&self) -> usize {
        self.pending_insert.borrow().len()
    }

    pub(crate) fn defer_insert(&self, queue: Vec<InsertedVNode<N>>) {
        *self.pending_insert.borrow_mut() = queue;
    }
}

impl<N: Clone> PlaceholderLink<N> {
    /// Real handle currently recorded on the placeholder.
    #[must_use]
    pub fn element(&self) -> Option<N> {
        self.vnode.borrow().elm.clone()
    }
}

impl<N: fmt::Debug> fmt::Debug for PlaceholderLink<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderLink")
            .field("vnode", &self.vnode.borrow().id())
            .field("pending_insert", &self.pending_insert.borrow().len())
            .finish()
    }
}

// ─── VNode ──────────────────────────────────────────────────────────────────

/// One node of a description tree, generic over the platform handle `N`.
pub struct VNode<N> {
    id: NodeId,
    pub kind: VNodeKind,
    pub key: Option<NodeKey>,
    pub data: Option<VNodeData<N>>,
    pub children: Vec<VNode<N>>,
    pub text: Option<Rc<str>>,
    /// Real node, filled in by the reconciler.
    pub elm: Option<N>,
    pub component_instance: Option<Rc<dyn ComponentInstance<N>>>,
    /// Placeholder hosting this node when it is a component root.
    pub parent: Option<Rc<PlaceholderLink<N>>>,
    pub async_factory: Option<Rc<AsyncFactory>>,
    /// Scope id of the functional context that rendered this node.
    pub fn_scope_id: Option<Rc<str>>,
    /// Scope id of the component context that rendered this node.
    pub scope_id: Option<Rc<str>>,
    pub flags: VNodeFlags,
}

/// Copies get a fresh [`NodeId`].
impl<N: Clone> Clone for VNode<N> {
    fn clone(&self) -> Self {
        Self {
            id: NodeId::next(),
            kind: self.kind.clone(),
            key: self.key.clone(),
            data: self.data.clone(),
            children: self.children.clone(),
            text: self.text.clone(),
            elm: self.elm.clone(),
            component_instance: self.component_instance.clone(),
            parent: self.parent.clone(),
            async_factory: self.async_factory.clone(),
            fn_scope_id: self.fn_scope_id.clone(),
            scope_id: self.scope_id.clone(),
            flags: self.flags,
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for VNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("id", &self.id.0).field("kind", &self.kind);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        if let Some(text) = &self.text {
            s.field("text", text);
        }
        if !self.children.is_empty() {
            s.field("children", &self.children);
        }
        s.field("elm", &self.elm)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl<N> VNode<N> {
    fn with_kind(kind: VNodeKind) -> Self {
        Self {
            id: NodeId::next(),
            kind,
            key: None,
            data: None,
            children: Vec::new(),
            text: None,
            elm: None,
            component_instance: None,
            parent: None,
            async_factory: None,
            fn_scope_id: None,
            scope_id: None,
            flags: VNodeFlags::empty(),
        }
    }

    #[must_use]
    pub fn element(tag: impl Into<Rc<str>>) -> Self {
        Self::with_kind(VNodeKind::Element {
            tag: tag.into(),
            ns: None,
        })
    }

    #[must_use]
    pub fn element_ns(ns: impl Into<Rc<str>>, tag: impl Into<Rc<str>>) -> Self {
        Self::with_kind(VNodeKind::Element {
            tag: tag.into(),
            ns: Some(ns.into()),
        })
    }

    /// A component placeholder. `hooks.init` is expected to attach a
    /// [`ComponentInstance`].
    #[must_use]
    pub fn component(tag: impl Into<Rc<str>>, hooks: NodeHooks<N>) -> Self {
        let mut node = Self::with_kind(VNodeKind::Component { tag: tag.into() });
        node.data = Some(VNodeData {
            hook: Some(hooks),
            ..VNodeData::default()
        });
        node
    }

    #[must_use]
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        let mut node = Self::with_kind(VNodeKind::Text);
        node.text = Some(text.into());
        node
    }

    #[must_use]
    pub fn comment(text: impl Into<Rc<str>>) -> Self {
        let mut node = Self::with_kind(VNodeKind::Comment);
        node.text = Some(text.into());
        node
    }

    /// The empty node: a comment with no text.
    #[must_use]
    pub fn empty() -> Self {
        Self::comment("")
    }

    /// Comment standing in for a component whose factory has not resolved.
    #[must_use]
    pub fn async_placeholder(factory: Rc<AsyncFactory>) -> Self {
        let mut node = Self::empty();
        node.async_factory = Some(factory);
        node
    }

    // ── Builders ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn with_key(mut self, key: impl Into<NodeKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: VNodeData<N>) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = VNode<N>>) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: VNode<N>) -> Self {
        self.children.push(child);
        self
    }

    /// Text content of an element without children.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<Rc<str>>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.data_mut().attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<Value>) -> Self {
        self.data_mut().class = Some(class.into());
        self
    }

    #[must_use]
    pub fn with_dom_prop(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.data_mut().dom_props.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: NodeHooks<N>) -> Self {
        self.data_mut().hook = Some(hooks);
        self
    }

    #[must_use]
    pub fn with_scope_id(mut self, id: impl Into<Rc<str>>) -> Self {
        self.scope_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_fn_scope_id(mut self, id: impl Into<Rc<str>>) -> Self {
        self.fn_scope_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, link: Rc<PlaceholderLink<N>>) -> Self {
        self.parent = Some(link);
        self
    }

    #[must_use]
    pub fn mark_static(mut self) -> Self {
        self.flags.insert(VNodeFlags::STATIC);
        self
    }

    #[must_use]
    pub fn mark_once(mut self) -> Self {
        self.flags.insert(VNodeFlags::ONCE);
        self
    }

    /// Data payload, created empty on first access.
    pub fn data_mut(&mut self) -> &mut VNodeData<N> {
        self.data.get_or_insert_with(VNodeData::default)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Tag of an element or component placeholder.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Element { tag, .. } | VNodeKind::Component { tag } => Some(tag),
            VNodeKind::Text | VNodeKind::Comment => None,
        }
    }

    #[must_use]
    pub fn ns(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Element { ns, .. } => ns.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, VNodeKind::Comment)
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, VNodeKind::Text)
    }

    #[must_use]
    pub fn is_component(&self) -> bool {
        matches!(self.kind, VNodeKind::Component { .. })
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(VNodeFlags::STATIC)
    }

    #[must_use]
    pub fn is_cloned(&self) -> bool {
        self.flags.contains(VNodeFlags::CLONED)
    }

    #[must_use]
    pub fn is_async_placeholder(&self) -> bool {
        self.flags.contains(VNodeFlags::ASYNC_PLACEHOLDER)
    }

    #[must_use]
    pub fn hooks(&self) -> Option<&NodeHooks<N>> {
        self.data.as_ref().and_then(|d| d.hook.as_ref())
    }

    #[must_use]
    pub fn input_type(&self) -> Option<&str> {
        self.data.as_ref().and_then(VNodeData::input_type)
    }

    /// Mint a new identity for a node whose description was already
    /// materialized elsewhere.
    pub(crate) fn refresh_identity(&mut self) {
        self.id = NodeId::next();
        self.flags.insert(VNodeFlags::CLONED);
    }
}

impl<N: Clone> VNode<N> {
    /// Copy with a fresh identity, marked [`VNodeFlags::CLONED`].
    ///
    /// Keeps the real handle and the data payload. The component instance,
    /// placeholder link and transient flags are not carried over.
    #[must_use]
    pub fn clone_node(&self) -> Self {
        Self {
            id: NodeId::next(),
            kind: self.kind.clone(),
            key: self.key.clone(),
            data: self.data.clone(),
            children: self.children.clone(),
            text: self.text.clone(),
            elm: self.elm.clone(),
            component_instance: None,
            parent: None,
            async_factory: self.async_factory.clone(),
            fn_scope_id: self.fn_scope_id.clone(),
            scope_id: self.scope_id.clone(),
            flags: (self.flags & VNodeFlags::STATIC) | VNodeFlags::CLONED,
        }
    }
}
