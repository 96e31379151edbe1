#![forbid(unsafe_code)]

//! Binding a render function to a real tree.
//!
//! A [`View`] runs its render function inside an [`Effect`], so every piece
//! of observed state the render reads becomes a dependency. When any of it
//! changes, the effect reruns: it renders a fresh description and patches
//! the previous one into it.
//!
//! # Invariants
//!
//! 1. Exactly one description tree is live at a time; each run consumes the
//!    previous tree.
//! 2. The first run mounts (or hydrates) at the target; later runs update.

use std::cell::RefCell;
use std::rc::Rc;

use weft_reactive::Effect;
use weft_vdom::{NodeOps, Patcher, VNode};

struct Live<N> {
    tree: Option<VNode<N>>,
    elm: Option<N>,
}

/// A render function kept in sync with the state it reads.
pub struct View<B: NodeOps> {
    patcher: Rc<Patcher<B>>,
    live: Rc<RefCell<Live<B::Node>>>,
    effect: Effect,
}

impl<B: NodeOps> std::fmt::Debug for View<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("effect", &self.effect)
            .field("elm", &self.live.borrow().elm)
            .finish_non_exhaustive()
    }
}

impl<B: NodeOps + 'static> View<B> {
    /// Render once and mount the result.
    ///
    /// With a `target`, the first render replaces it, or hydrates it when
    /// it carries the server-render marker. Without one the tree is created
    /// detached.
    pub fn mount(
        patcher: Rc<Patcher<B>>,
        target: Option<B::Node>,
        render: impl Fn() -> VNode<B::Node> + 'static,
    ) -> Self {
        let live = Rc::new(RefCell::new(Live {
            tree: None,
            elm: None,
        }));
        let mut target = target;
        let effect = {
            let patcher = Rc::clone(&patcher);
            let live = Rc::clone(&live);
            Effect::new(move || {
                let mut next = render();
                let previous = live.borrow_mut().tree.take();
                let elm = match (previous, target.take()) {
                    (Some(previous), _) => patcher.update(previous, &mut next),
                    (None, Some(target)) => patcher.mount_at(target, &mut next),
                    (None, None) => patcher.mount(&mut next),
                };
                tracing::debug!(target: "weft", node = next.id().0, "view rendered");
                let mut live = live.borrow_mut();
                live.tree = Some(next);
                live.elm = elm;
            })
        };
        Self {
            patcher,
            live,
            effect,
        }
    }

    /// Real root of the latest render.
    #[must_use]
    pub fn element(&self) -> Option<B::Node> {
        self.live.borrow().elm.clone()
    }

    /// Completed renders, including the initial mount.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.effect.runs()
    }

    /// Render and patch now, regardless of dependency changes.
    pub fn force_update(&self) {
        self.effect.update();
    }

    /// Borrow the live description tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(Option<&VNode<B::Node>>) -> R) -> R {
        f(self.live.borrow().tree.as_ref())
    }

    /// Stop tracking and run destroy hooks over the live tree.
    pub fn unmount(self) {
        self.effect.stop();
        let tree = self.live.borrow_mut().tree.take();
        if let Some(tree) = tree {
            self.patcher.destroy(tree);
        }
    }
}
