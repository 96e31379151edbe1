#![forbid(unsafe_code)]

//! Lifecycle hooks invoked by the reconciler.
//!
//! Two kinds of callbacks exist:
//!
//! - [`NodeHooks`]: carried by an individual description node in its data
//!   (`init`, `prepatch`, `create`, `insert`, `update`, `postpatch`,
//!   `remove`, `destroy`). Component placeholders use these to mount and
//!   update their instance.
//! - [`Module`]: registered once on the [`Patcher`](crate::Patcher) and run
//!   for every node with data (`create`, `activate`, `update`, `remove`,
//!   `destroy`). Attribute, class, style and event handling live here.
//!
//! Module callbacks run in registration order, before the node's own hook
//! of the same name.
//!
//! # Delayed removal
//!
//! Removing a node with data hands every `remove` callback a shared
//! [`RemoveCallback`]. The real node is detached only after each listener
//! (one per module plus the node itself) has called it, which lets a leave
//! transition keep the node on screen until it finishes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::vnode::{NodeId, NodeKey, VNode};

// ─── Hook signatures ────────────────────────────────────────────────────────

/// `init(vnode, hydrating)`: create and attach the component instance.
pub type InitHook<N> = Rc<dyn Fn(&mut VNode<N>, bool)>;
/// `prepatch(old, new)`: move instance state onto the new placeholder.
pub type PrepatchHook<N> = Rc<dyn Fn(&VNode<N>, &mut VNode<N>)>;
/// `(old, new)` pair hook. For `create` and `activate`, `old` is the empty
/// node.
pub type PairHook<N> = Rc<dyn Fn(&VNode<N>, &VNode<N>)>;
pub type InsertHook<N> = Rc<dyn Fn(&InsertedVNode<N>)>;
pub type RemoveHook<N> = Rc<dyn Fn(&VNode<N>, &Rc<RemoveCallback>)>;
pub type DestroyHook<N> = Rc<dyn Fn(&VNode<N>)>;

// ─── Per-node hooks ─────────────────────────────────────────────────────────

/// Hooks attached to a single description node.
pub struct NodeHooks<N> {
    pub init: Option<InitHook<N>>,
    pub prepatch: Option<PrepatchHook<N>>,
    pub create: Option<PairHook<N>>,
    pub insert: Option<InsertHook<N>>,
    pub update: Option<PairHook<N>>,
    pub postpatch: Option<PairHook<N>>,
    pub remove: Option<RemoveHook<N>>,
    pub destroy: Option<DestroyHook<N>>,
}

impl<N> Default for NodeHooks<N> {
    fn default() -> Self {
        Self {
            init: None,
            prepatch: None,
            create: None,
            insert: None,
            update: None,
            postpatch: None,
            remove: None,
            destroy: None,
        }
    }
}

impl<N> Clone for NodeHooks<N> {
    fn clone(&self) -> Self {
        Self {
            init: self.init.clone(),
            prepatch: self.prepatch.clone(),
            create: self.create.clone(),
            insert: self.insert.clone(),
            update: self.update.clone(),
            postpatch: self.postpatch.clone(),
            remove: self.remove.clone(),
            destroy: self.destroy.clone(),
        }
    }
}

impl<N> fmt::Debug for NodeHooks<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHooks")
            .field("init", &self.init.is_some())
            .field("prepatch", &self.prepatch.is_some())
            .field("create", &self.create.is_some())
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("postpatch", &self.postpatch.is_some())
            .field("remove", &self.remove.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

impl<N> NodeHooks<N> {
    #[must_use]
    pub fn on_init(mut self, f: impl Fn(&mut VNode<N>, bool) + 'static) -> Self {
        self.init = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_prepatch(mut self, f: impl Fn(&VNode<N>, &mut VNode<N>) + 'static) -> Self {
        self.prepatch = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_create(mut self, f: impl Fn(&VNode<N>, &VNode<N>) + 'static) -> Self {
        self.create = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_insert(mut self, f: impl Fn(&InsertedVNode<N>) + 'static) -> Self {
        self.insert = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_update(mut self, f: impl Fn(&VNode<N>, &VNode<N>) + 'static) -> Self {
        self.update = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_postpatch(mut self, f: impl Fn(&VNode<N>, &VNode<N>) + 'static) -> Self {
        self.postpatch = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_remove(mut self, f: impl Fn(&VNode<N>, &Rc<RemoveCallback>) + 'static) -> Self {
        self.remove = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_destroy(mut self, f: impl Fn(&VNode<N>) + 'static) -> Self {
        self.destroy = Some(Rc::new(f));
        self
    }
}

// ─── Modules ────────────────────────────────────────────────────────────────

/// A platform module run for every description node carrying data.
///
/// A `remove` callback takes over one listener slot of the
/// [`RemoveCallback`] and must call it exactly once.
pub struct Module<N> {
    pub name: &'static str,
    pub create: Option<PairHook<N>>,
    pub activate: Option<PairHook<N>>,
    pub update: Option<PairHook<N>>,
    pub remove: Option<RemoveHook<N>>,
    pub destroy: Option<DestroyHook<N>>,
}

impl<N> Clone for Module<N> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            create: self.create.clone(),
            activate: self.activate.clone(),
            update: self.update.clone(),
            remove: self.remove.clone(),
            destroy: self.destroy.clone(),
        }
    }
}

impl<N> fmt::Debug for Module<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<N> Module<N> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            create: None,
            activate: None,
            update: None,
            remove: None,
            destroy: None,
        }
    }

    #[must_use]
    pub fn on_create(mut self, f: impl Fn(&VNode<N>, &VNode<N>) + 'static) -> Self {
        self.create = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_activate(mut self, f: impl Fn(&VNode<N>, &VNode<N>) + 'static) -> Self {
        self.activate = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_update(mut self, f: impl Fn(&VNode<N>, &VNode<N>) + 'static) -> Self {
        self.update = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_remove(mut self, f: impl Fn(&VNode<N>, &Rc<RemoveCallback>) + 'static) -> Self {
        self.remove = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_destroy(mut self, f: impl Fn(&VNode<N>) + 'static) -> Self {
        self.destroy = Some(Rc::new(f));
        self
    }
}

/// Module callbacks regrouped per lifecycle stage.
pub(crate) struct HookTable<N> {
    pub(crate) create: Vec<PairHook<N>>,
    pub(crate) activate: Vec<PairHook<N>>,
    pub(crate) update: Vec<PairHook<N>>,
    pub(crate) remove: Vec<RemoveHook<N>>,
    pub(crate) destroy: Vec<DestroyHook<N>>,
}

impl<N> HookTable<N> {
    pub(crate) fn from_modules(modules: impl IntoIterator<Item = Module<N>>) -> Self {
        let mut table = Self {
            create: Vec::new(),
            activate: Vec::new(),
            update: Vec::new(),
            remove: Vec::new(),
            destroy: Vec::new(),
        };
        for module in modules {
            table.create.extend(module.create);
            table.activate.extend(module.activate);
            table.update.extend(module.update);
            table.remove.extend(module.remove);
            table.destroy.extend(module.destroy);
        }
        table
    }
}

// ─── Remove callback ────────────────────────────────────────────────────────

/// Countdown shared by every listener of a delayed removal.
pub struct RemoveCallback {
    listeners: Cell<usize>,
    detach: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl fmt::Debug for RemoveCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoveCallback")
            .field("listeners", &self.listeners.get())
            .field("done", &self.is_done())
            .finish()
    }
}

impl RemoveCallback {
    pub(crate) fn new(listeners: usize, detach: impl FnOnce() + 'static) -> Rc<Self> {
        Rc::new(Self {
            listeners: Cell::new(listeners),
            detach: RefCell::new(Some(Box::new(detach))),
        })
    }

    pub(crate) fn add_listeners(&self, count: usize) {
        self.listeners.set(self.listeners.get() + count);
    }

    /// Signal that one listener is done. The last call detaches the node.
    pub fn call(&self) {
        let left = self.listeners.get().saturating_sub(1);
        self.listeners.set(left);
        if left == 0 {
            let detach = self.detach.borrow_mut().take();
            if let Some(detach) = detach {
                detach();
            }
        }
    }

    /// Listeners that have not called yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.listeners.get()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.detach.borrow().is_none()
    }
}

// ─── Components ─────────────────────────────────────────────────────────────

/// A mounted component, created by a placeholder's `init` hook.
///
/// The reconciler never renders components itself; it only asks the
/// instance for its root handle and root description.
pub trait ComponentInstance<N> {
    /// Real root node of the mounted component.
    fn element(&self) -> Option<N>;

    /// The component's current root description, if it exposes one.
    fn root(&self) -> Option<Rc<RefCell<VNode<N>>>> {
        None
    }

    /// Insert hooks deferred from the component's initial mount.
    fn take_pending_insert(&self) -> Vec<InsertedVNode<N>> {
        self.root()
            .and_then(|root| root.borrow().parent.clone())
            .map(|link| link.take_pending_insert())
            .unwrap_or_default()
    }
}

/// Whether `vnode` ultimately renders an element, following component roots.
pub(crate) fn is_patchable<N>(vnode: &VNode<N>) -> bool {
    match vnode.component_instance.as_ref().and_then(|i| i.root()) {
        Some(root) => is_patchable(&root.borrow()),
        None => vnode.tag().is_some(),
    }
}

// ─── Insert queue ───────────────────────────────────────────────────────────

/// Snapshot of a node waiting for its `insert` hook.
///
/// The hook runs once the whole tree is attached, after the outermost patch
/// call returns from creation.
pub struct InsertedVNode<N> {
    pub id: NodeId,
    pub key: Option<NodeKey>,
    pub elm: Option<N>,
    pub component_instance: Option<Rc<dyn ComponentInstance<N>>>,
    insert: Option<InsertHook<N>>,
}

impl<N: Clone> From<&VNode<N>> for InsertedVNode<N> {
    fn from(vnode: &VNode<N>) -> Self {
        Self {
            id: vnode.id(),
            key: vnode.key.clone(),
            elm: vnode.elm.clone(),
            component_instance: vnode.component_instance.clone(),
            insert: vnode.hooks().and_then(|h| h.insert.clone()),
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for InsertedVNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertedVNode")
            .field("id", &self.id.0)
            .field("key", &self.key)
            .field("elm", &self.elm)
            .finish_non_exhaustive()
    }
}

impl<N> InsertedVNode<N> {
    pub(crate) fn invoke(&self) {
        if let Some(insert) = &self.insert {
            insert(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_callback_waits_for_every_listener() {
        let detached = Rc::new(Cell::new(false));
        let flag = Rc::clone(&detached);
        let rm = RemoveCallback::new(2, move || flag.set(true));

        rm.call();
        assert!(!detached.get());
        assert_eq!(rm.pending(), 1);

        rm.add_listeners(1);
        rm.call();
        assert!(!detached.get());
        rm.call();
        assert!(detached.get());
        assert!(rm.is_done());

        rm.call();
        assert_eq!(rm.pending(), 0);
    }

    #[test]
    fn hook_table_keeps_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&log), Rc::clone(&log));
        let table = HookTable::<u32>::from_modules([
            Module::new("first").on_destroy(move |_| a.borrow_mut().push("first")),
            Module::new("second")
                .on_create(|_, _| {})
                .on_destroy(move |_| b.borrow_mut().push("second")),
        ]);
        assert_eq!(table.create.len(), 1);
        assert!(table.update.is_empty());

        let node = VNode::<u32>::element("div");
        for cb in &table.destroy {
            cb(&node);
        }
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn inserted_snapshot_runs_node_hook() {
        let seen = Rc::new(Cell::new(0_u32));
        let s = Rc::clone(&seen);
        let mut node = VNode::<u32>::element("li")
            .with_key("a")
            .with_hooks(NodeHooks::<u32>::default().on_insert(move |v| s.set(v.elm.unwrap_or(0))));
        node.elm = Some(42);

        let entry = InsertedVNode::from(&node);
        entry.invoke();
        assert_eq!(seen.get(), 42);
        assert_eq!(entry.key, Some(NodeKey::from("a")));
    }

    struct Fixed(Option<Rc<RefCell<VNode<u32>>>>);

    impl ComponentInstance<u32> for Fixed {
        fn element(&self) -> Option<u32> {
            self.0.as_ref().and_then(|r| r.borrow().elm)
        }
        fn root(&self) -> Option<Rc<RefCell<VNode<u32>>>> {
            self.0.clone()
        }
    }

    #[test]
    fn patchable_follows_component_roots() {
        let mut placeholder = VNode::<u32>::component("c", NodeHooks::default());
        assert!(is_patchable(&placeholder));

        let root = Rc::new(RefCell::new(VNode::<u32>::empty()));
        placeholder.component_instance = Some(Rc::new(Fixed(Some(Rc::clone(&root)))));
        assert!(!is_patchable(&placeholder));

        *root.borrow_mut() = VNode::element("section");
        assert!(is_patchable(&placeholder));
    }
}
