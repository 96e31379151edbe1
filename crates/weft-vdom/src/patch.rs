#![forbid(unsafe_code)]

//! The reconciler.
//!
//! [`Patcher::patch`] turns a description tree into real nodes, or updates
//! the real nodes of the previous tree in place so they match a new one.
//!
//! # Design
//!
//! The previous tree is passed by value and consumed: nodes that survive
//! hand their real handle to their counterpart in the new tree, the rest
//! are removed and their destroy hooks run. The new tree is borrowed
//! mutably and comes back with every `elm` filled in, ready to be passed
//! as the previous tree next time.
//!
//! Insert hooks are queued while nodes are created and flushed once the
//! patch is done, so they only ever see attached nodes. On a component's
//! initial mount the queue is parked on its [`PlaceholderLink`] instead and
//! picked up when the host tree creates the placeholder.
//!
//! # Invariants
//!
//! 1. A replacement is created and inserted before the node it replaces is
//!    removed.
//! 2. Module hooks run before the node's own hook of the same name.
//! 3. A static node that is a clone or render-once, diffed against a static
//!    node with the same key, is never descended into.
//!
//! # Failure Modes
//!
//! - **Hydration mismatch**: reported as [`PatchWarning::HydrationBailed`];
//!   the server markup is replaced by a client-side render.
//! - **Hook panics**: propagate to the caller. The real tree may be left
//!   partially patched.

use std::cell::Cell;
use std::rc::Rc;

use ahash::AHashSet;

use crate::config::PatchConfig;
use crate::hooks::{HookTable, InsertedVNode, Module, RemoveCallback, is_patchable};
use crate::identity::same_identity;
use crate::ops::{NodeOps, NodeType, SSR_ATTR};
use crate::vnode::{PlaceholderLink, VNode, VNodeData, VNodeFlags, VNodeKind};
use crate::warning::PatchWarning;

pub(crate) type InsertQueue<N> = Vec<InsertedVNode<N>>;

/// What a patch starts from.
#[derive(Debug)]
pub enum PatchTarget<N> {
    /// A real node not produced by a previous patch, such as a mount point
    /// or server-rendered markup.
    Mount(N),
    /// The tree returned by the previous patch.
    Previous(VNode<N>),
}

/// Reconciles description trees against a [`NodeOps`] backend.
pub struct Patcher<B: NodeOps> {
    pub(crate) ops: Rc<B>,
    pub(crate) hooks: HookTable<B::Node>,
    pub(crate) config: PatchConfig,
    /// Passed as the old node to `create` and `activate` hooks.
    pub(crate) empty: VNode<B::Node>,
    pub(crate) v_pre_depth: Cell<usize>,
    pub(crate) hydration_warned: Cell<bool>,
}

impl<B: NodeOps> std::fmt::Debug for Patcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patcher")
            .field("modules.create", &self.hooks.create.len())
            .field("modules.update", &self.hooks.update.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: NodeOps + 'static> Patcher<B> {
    pub fn new(ops: Rc<B>, modules: impl IntoIterator<Item = Module<B::Node>>) -> Self {
        Self {
            ops,
            hooks: HookTable::from_modules(modules),
            config: PatchConfig::default(),
            empty: VNode::element("").with_data(VNodeData::default()),
            v_pre_depth: Cell::new(0),
            hydration_warned: Cell::new(false),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PatchConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn ops(&self) -> &Rc<B> {
        &self.ops
    }

    #[must_use]
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Create `vnode` detached. Its insert hooks run now unless it is a
    /// component root, in which case they are parked on the placeholder.
    pub fn mount(&self, vnode: &mut VNode<B::Node>) -> Option<B::Node> {
        self.patch(None, Some(vnode), false, false)
    }

    /// Replace (or hydrate) the real node `target` with `vnode`.
    pub fn mount_at(&self, target: B::Node, vnode: &mut VNode<B::Node>) -> Option<B::Node> {
        self.patch(Some(PatchTarget::Mount(target)), Some(vnode), false, false)
    }

    /// Bring the real tree of `old` in line with `vnode`.
    pub fn update(&self, old: VNode<B::Node>, vnode: &mut VNode<B::Node>) -> Option<B::Node> {
        self.patch(Some(PatchTarget::Previous(old)), Some(vnode), false, false)
    }

    /// Run destroy hooks over `old`. Real nodes are left in place.
    pub fn destroy(&self, old: VNode<B::Node>) {
        self.patch(Some(PatchTarget::Previous(old)), None, false, false);
    }

    /// Reconcile `old` into `vnode` and return the real root of `vnode`.
    ///
    /// `hydrating` forces a hydration attempt on a [`PatchTarget::Mount`]
    /// even without the server-render marker. `remove_only` disables moves
    /// in the keyed diff.
    pub fn patch(
        &self,
        old: Option<PatchTarget<B::Node>>,
        vnode: Option<&mut VNode<B::Node>>,
        hydrating: bool,
        remove_only: bool,
    ) -> Option<B::Node> {
        let Some(vnode) = vnode else {
            if let Some(PatchTarget::Previous(old)) = old {
                self.invoke_destroy_hook(&old);
            }
            return None;
        };

        let mut queue = InsertQueue::new();
        let initial = old.is_none();
        match old {
            None => self.create_elm(vnode, &mut queue, None, None, false, false),
            Some(PatchTarget::Previous(old)) if same_identity(&old, vnode) => {
                self.patch_vnode(old, vnode, &mut queue, remove_only);
            }
            Some(target) => {
                let old = match target {
                    PatchTarget::Previous(old) => old,
                    PatchTarget::Mount(real) => {
                        match self.hydrate_mount(real, vnode, &mut queue, hydrating) {
                            Ok(real) => {
                                self.invoke_insert_hook(vnode, queue, true);
                                return Some(real);
                            }
                            Err(old) => old,
                        }
                    }
                };
                self.replace(old, vnode, &mut queue);
            }
        }

        self.invoke_insert_hook(vnode, queue, initial);
        vnode.elm.clone()
    }

    // ─── Top-level helpers ──────────────────────────────────────────────────

    /// Try to adopt server-rendered markup. On failure, return a bare
    /// description of `real` to replace.
    fn hydrate_mount(
        &self,
        real: B::Node,
        vnode: &mut VNode<B::Node>,
        queue: &mut InsertQueue<B::Node>,
        hydrating: bool,
    ) -> Result<B::Node, VNode<B::Node>> {
        let mut hydrating = hydrating;
        if self.ops.node_type(&real) == NodeType::Element && self.ops.has_attribute(&real, SSR_ATTR)
        {
            self.ops.remove_attribute(&real, SSR_ATTR);
            hydrating = true;
        }
        if hydrating {
            match self.hydrate(&real, vnode, queue, false) {
                Ok(()) => return Ok(real),
                Err(mismatch) => {
                    if !self.hydration_warned.replace(true) {
                        self.warn(PatchWarning::HydrationMismatch {
                            detail: mismatch.to_string(),
                        });
                    }
                    self.warn(PatchWarning::HydrationBailed);
                    queue.clear();
                }
            }
        }
        Err(self.empty_node_at(real))
    }

    fn empty_node_at(&self, real: B::Node) -> VNode<B::Node> {
        let tag = self.ops.tag_name(&real).to_ascii_lowercase();
        let mut node = VNode::element(tag).with_data(VNodeData::default());
        node.elm = Some(real);
        node
    }

    /// Create `vnode` next to `old`, then remove `old`.
    fn replace(&self, old: VNode<B::Node>, vnode: &mut VNode<B::Node>, queue: &mut InsertQueue<B::Node>) {
        let old_elm = old.elm.clone();
        let parent = old_elm.as_ref().and_then(|e| self.ops.parent_node(e));
        let anchor = old_elm.as_ref().and_then(|e| self.ops.next_sibling(e));

        self.create_elm(vnode, queue, parent.as_ref(), anchor.as_ref(), false, false);
        self.update_ancestors(vnode);

        tracing::debug!(
            target: "weft_vdom",
            old = old.id().0,
            new = vnode.id().0,
            attached = parent.is_some(),
            "replaced root node"
        );
        if parent.is_some() {
            self.remove_vnodes(std::iter::once(old));
        } else if old.tag().is_some() {
            self.invoke_destroy_hook(&old);
        }
    }

    /// Point every placeholder above a component root at its new handle.
    fn update_ancestors(&self, vnode: &VNode<B::Node>) {
        let patchable = is_patchable(vnode);
        let mut link = vnode.parent.clone();
        while let Some(current) = link {
            let mut ancestor = current.vnode.borrow_mut();
            for destroy in &self.hooks.destroy {
                destroy(&*ancestor);
            }
            ancestor.elm = vnode.elm.clone();
            if patchable {
                for create in &self.hooks.create {
                    create(&self.empty, &*ancestor);
                }
            }
            link = ancestor.parent.clone();
        }
    }

    fn invoke_insert_hook(&self, vnode: &VNode<B::Node>, queue: InsertQueue<B::Node>, initial: bool) {
        if initial {
            if let Some(link) = &vnode.parent {
                link.defer_insert(queue);
                return;
            }
        }
        for entry in &queue {
            entry.invoke();
        }
    }

    // ─── Creation ───────────────────────────────────────────────────────────

    /// Materialize `vnode` and its subtree and insert it into `parent`.
    ///
    /// `owned` marks a node coming from a child list; if it already carries
    /// a real node it gets a fresh identity first.
    pub(crate) fn create_elm(
        &self,
        vnode: &mut VNode<B::Node>,
        queue: &mut InsertQueue<B::Node>,
        parent: Option<&B::Node>,
        anchor: Option<&B::Node>,
        nested: bool,
        owned: bool,
    ) {
        if owned && vnode.elm.is_some() {
            vnode.refresh_identity();
        }
        vnode.flags.set(VNodeFlags::ROOT_INSERT, !nested);
        if self.create_component(vnode, queue, parent, anchor) {
            return;
        }

        match vnode.kind.clone() {
            VNodeKind::Element { tag, ns } => {
                self.create_element(vnode, &tag, ns.as_deref(), queue, parent, anchor);
            }
            VNodeKind::Component { tag } => {
                self.create_element(vnode, &tag, None, queue, parent, anchor);
            }
            VNodeKind::Comment => {
                let elm = self.ops.create_comment(vnode.text.as_deref().unwrap_or(""));
                self.insert(parent, &elm, anchor);
                vnode.elm = Some(elm);
            }
            VNodeKind::Text => {
                let elm = self.ops.create_text_node(vnode.text.as_deref().unwrap_or(""));
                self.insert(parent, &elm, anchor);
                vnode.elm = Some(elm);
            }
        }
    }

    fn create_element(
        &self,
        vnode: &mut VNode<B::Node>,
        tag: &str,
        ns: Option<&str>,
        queue: &mut InsertQueue<B::Node>,
        parent: Option<&B::Node>,
        anchor: Option<&B::Node>,
    ) {
        let pre = vnode.data.as_ref().is_some_and(|d| d.pre);
        if pre {
            self.v_pre_depth.set(self.v_pre_depth.get() + 1);
        }
        if self.is_unknown_element(tag, ns, self.v_pre_depth.get() > 0) {
            self.warn(PatchWarning::UnknownElement { tag: tag.to_owned() });
        }

        let elm = match ns {
            Some(ns) => self.ops.create_element_ns(ns, tag),
            None => self.ops.create_element(tag),
        };
        vnode.elm = Some(elm.clone());
        self.set_scope(vnode);
        self.create_children(vnode, queue);
        if vnode.data.is_some() {
            self.invoke_create_hooks(vnode, queue);
        }
        self.insert(parent, &elm, anchor);

        if pre {
            self.v_pre_depth.set(self.v_pre_depth.get() - 1);
        }
    }

    /// Returns `true` when `vnode` turned out to be a mounted component.
    fn create_component(
        &self,
        vnode: &mut VNode<B::Node>,
        queue: &mut InsertQueue<B::Node>,
        parent: Option<&B::Node>,
        anchor: Option<&B::Node>,
    ) -> bool {
        let Some(data) = vnode.data.as_ref() else {
            return false;
        };
        let reactivated = vnode.component_instance.is_some() && data.keep_alive;
        let init = data.hook.as_ref().and_then(|h| h.init.clone());
        if let Some(init) = init {
            init(vnode, false);
        }
        if vnode.component_instance.is_none() {
            return false;
        }

        self.init_component(vnode, queue);
        if let Some(elm) = vnode.elm.clone() {
            self.insert(parent, &elm, anchor);
        }
        if reactivated {
            self.reactivate_component(vnode, queue, parent, anchor);
        }
        true
    }

    pub(crate) fn init_component(&self, vnode: &mut VNode<B::Node>, queue: &mut InsertQueue<B::Node>) {
        let Some(instance) = vnode.component_instance.clone() else {
            return;
        };
        queue.extend(instance.take_pending_insert());
        vnode.elm = instance.element();
        if is_patchable(vnode) {
            self.invoke_create_hooks(vnode, queue);
            self.set_scope(vnode);
        } else {
            // Empty component root: still queue the placeholder so its
            // insert hook fires.
            queue.push(InsertedVNode::from(&*vnode));
        }
    }

    /// Re-run enter transitions for a kept-alive component put back in the
    /// tree.
    fn reactivate_component(
        &self,
        vnode: &VNode<B::Node>,
        queue: &mut InsertQueue<B::Node>,
        parent: Option<&B::Node>,
        anchor: Option<&B::Node>,
    ) {
        let mut inner = vnode.component_instance.as_ref().and_then(|i| i.root());
        while let Some(node) = inner {
            let node = node.borrow();
            if node.data.as_ref().is_some_and(|d| d.transition) {
                for activate in &self.hooks.activate {
                    activate(&self.empty, &*node);
                }
                queue.push(InsertedVNode::from(&*node));
                break;
            }
            inner = node.component_instance.as_ref().and_then(|i| i.root());
        }
        if let Some(elm) = &vnode.elm {
            self.insert(parent, elm, anchor);
        }
    }

    fn insert(&self, parent: Option<&B::Node>, elm: &B::Node, anchor: Option<&B::Node>) {
        let Some(parent) = parent else {
            return;
        };
        match anchor {
            Some(anchor) => {
                if self.ops.parent_node(anchor).as_ref() == Some(parent) {
                    self.ops.insert_before(parent, elm, Some(anchor));
                }
            }
            None => self.ops.append_child(parent, elm),
        }
    }

    pub(crate) fn create_children(&self, vnode: &mut VNode<B::Node>, queue: &mut InsertQueue<B::Node>) {
        let Some(elm) = vnode.elm.clone() else {
            return;
        };
        if !vnode.children.is_empty() {
            self.check_duplicate_keys(&vnode.children);
            for child in &mut vnode.children {
                self.create_elm(child, queue, Some(&elm), None, true, true);
            }
        } else if let Some(text) = vnode.text.as_deref() {
            let node = self.ops.create_text_node(text);
            self.ops.append_child(&elm, &node);
        }
    }

    pub(crate) fn add_vnodes(
        &self,
        parent: &B::Node,
        anchor: Option<&B::Node>,
        vnodes: &mut [VNode<B::Node>],
        queue: &mut InsertQueue<B::Node>,
    ) {
        for vnode in vnodes {
            self.create_elm(vnode, queue, Some(parent), anchor, false, true);
        }
    }

    pub(crate) fn invoke_create_hooks(&self, vnode: &VNode<B::Node>, queue: &mut InsertQueue<B::Node>) {
        for create in &self.hooks.create {
            create(&self.empty, vnode);
        }
        if let Some(hooks) = vnode.hooks() {
            if let Some(create) = &hooks.create {
                create(&self.empty, vnode);
            }
            if hooks.insert.is_some() {
                queue.push(InsertedVNode::from(vnode));
            }
        }
    }

    /// Apply scoped-style ids from the rendering contexts of `vnode`.
    fn set_scope(&self, vnode: &VNode<B::Node>) {
        let Some(elm) = &vnode.elm else {
            return;
        };
        if let Some(id) = &vnode.fn_scope_id {
            self.ops.set_style_scope(elm, id);
            return;
        }
        if let Some(id) = &vnode.scope_id {
            self.ops.set_style_scope(elm, id);
        }
        let mut link: Option<Rc<PlaceholderLink<B::Node>>> = vnode.parent.clone();
        while let Some(current) = link {
            let ancestor = current.vnode.borrow();
            if let Some(id) = &ancestor.scope_id {
                self.ops.set_style_scope(elm, id);
            }
            link = ancestor.parent.clone();
        }
    }

    pub(crate) fn is_unknown_element(&self, tag: &str, ns: Option<&str>, in_v_pre: bool) -> bool {
        !in_v_pre && ns.is_none() && self.config.is_unknown(tag)
    }

    pub(crate) fn check_duplicate_keys(&self, children: &[VNode<B::Node>]) {
        if !self.config.check_duplicate_keys {
            return;
        }
        let mut seen = AHashSet::with_capacity(children.len());
        for key in children.iter().filter_map(|c| c.key.as_ref()) {
            if !seen.insert(key) {
                self.warn(PatchWarning::DuplicateKey { key: key.to_string() });
            }
        }
    }

    // ─── Removal ────────────────────────────────────────────────────────────

    pub(crate) fn remove_vnodes(&self, vnodes: impl IntoIterator<Item = VNode<B::Node>>) {
        for vnode in vnodes {
            if vnode.tag().is_some() {
                self.remove_and_invoke_remove_hook(&vnode, None);
                self.invoke_destroy_hook(&vnode);
            } else if let Some(elm) = &vnode.elm {
                self.remove_node(elm);
            }
        }
    }

    fn remove_and_invoke_remove_hook(&self, vnode: &VNode<B::Node>, rm: Option<Rc<RemoveCallback>>) {
        if rm.is_none() && vnode.data.is_none() {
            if let Some(elm) = &vnode.elm {
                self.remove_node(elm);
            }
            return;
        }

        let listeners = self.hooks.remove.len() + 1;
        let rm = match rm {
            Some(rm) => {
                rm.add_listeners(listeners);
                rm
            }
            None => self.remove_callback(vnode.elm.clone(), listeners),
        };
        if let Some(root) = vnode.component_instance.as_ref().and_then(|i| i.root()) {
            let root = root.borrow();
            if root.data.is_some() {
                self.remove_and_invoke_remove_hook(&root, Some(Rc::clone(&rm)));
            }
        }
        for remove in &self.hooks.remove {
            remove(vnode, &rm);
        }
        match vnode.hooks().and_then(|h| h.remove.clone()) {
            Some(remove) => remove(vnode, &rm),
            None => rm.call(),
        }
    }

    fn remove_callback(&self, elm: Option<B::Node>, listeners: usize) -> Rc<RemoveCallback> {
        let ops = Rc::clone(&self.ops);
        RemoveCallback::new(listeners, move || {
            if let Some(elm) = elm {
                if let Some(parent) = ops.parent_node(&elm) {
                    ops.remove_child(&parent, &elm);
                }
            }
        })
    }

    fn remove_node(&self, elm: &B::Node) {
        if let Some(parent) = self.ops.parent_node(elm) {
            self.ops.remove_child(&parent, elm);
        }
    }

    pub(crate) fn invoke_destroy_hook(&self, vnode: &VNode<B::Node>) {
        if vnode.data.is_some() {
            if let Some(destroy) = vnode.hooks().and_then(|h| h.destroy.as_ref()) {
                destroy(vnode);
            }
            for destroy in &self.hooks.destroy {
                destroy(vnode);
            }
        }
        for child in &vnode.children {
            self.invoke_destroy_hook(child);
        }
    }

    // ─── Patching ───────────────────────────────────────────────────────────

    pub(crate) fn patch_vnode(
        &self,
        mut old: VNode<B::Node>,
        vnode: &mut VNode<B::Node>,
        queue: &mut InsertQueue<B::Node>,
        remove_only: bool,
    ) {
        // `old` is owned and `vnode` borrowed, so they are never the same node.
        if vnode.elm.is_some() {
            vnode.refresh_identity();
        }
        vnode.elm = old.elm.clone();

        if old.is_async_placeholder() {
            let resolved = vnode.async_factory.as_ref().is_some_and(|f| f.is_resolved());
            match (&old.elm, resolved) {
                (Some(elm), true) => {
                    if let Err(mismatch) = self.hydrate(elm, vnode, queue, false) {
                        tracing::debug!(target: "weft_vdom", %mismatch, "async component hydration failed");
                    }
                }
                _ => vnode.flags.insert(VNodeFlags::ASYNC_PLACEHOLDER),
            }
            return;
        }

        if vnode.is_static()
            && old.is_static()
            && vnode.key == old.key
            && vnode.flags.intersects(VNodeFlags::CLONED | VNodeFlags::ONCE)
        {
            vnode.component_instance = old.component_instance.take();
            vnode.children = std::mem::take(&mut old.children);
            return;
        }

        let hooks = vnode.hooks().cloned();
        if let Some(prepatch) = hooks.as_ref().and_then(|h| h.prepatch.clone()) {
            prepatch(&old, vnode);
        }
        if vnode.is_component() {
            if vnode.component_instance.is_none() {
                vnode.component_instance = old.component_instance.clone();
            }
            if let Some(elm) = vnode.component_instance.as_ref().and_then(|i| i.element()) {
                vnode.elm = Some(elm);
            }
        }

        if vnode.data.is_some() && is_patchable(vnode) {
            for update in &self.hooks.update {
                update(&old, &*vnode);
            }
            if let Some(update) = hooks.as_ref().and_then(|h| h.update.as_ref()) {
                update(&old, &*vnode);
            }
        }

        let old_children = std::mem::take(&mut old.children);
        if let Some(elm) = vnode.elm.clone() {
            match vnode.text.clone() {
                None => {
                    let (has_old, has_new) = (!old_children.is_empty(), !vnode.children.is_empty());
                    if has_old && has_new {
                        self.update_children(&elm, old_children, &mut vnode.children, queue, remove_only);
                    } else if has_new {
                        self.check_duplicate_keys(&vnode.children);
                        if old.text.is_some() {
                            self.ops.set_text_content(&elm, "");
                        }
                        self.add_vnodes(&elm, None, &mut vnode.children, queue);
                    } else if has_old {
                        self.remove_vnodes(old_children);
                    } else if old.text.is_some() {
                        self.ops.set_text_content(&elm, "");
                    }
                }
                Some(text) => {
                    if old.text.as_deref() != Some(&*text) {
                        self.ops.set_text_content(&elm, &text);
                    }
                }
            }
        }

        if let Some(postpatch) = hooks.and_then(|h| h.postpatch) {
            postpatch(&old, &*vnode);
        }
    }

    // ─── Warnings ───────────────────────────────────────────────────────────

    pub(crate) fn warn(&self, warning: PatchWarning) {
        if self.config.silent {
            return;
        }
        tracing::warn!(target: "weft_vdom", warning = %warning, "patch warning");
        if let Some(handler) = &self.config.warn_handler {
            handler(&warning);
        }
    }
}
