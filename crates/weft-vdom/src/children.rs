#![forbid(unsafe_code)]

//! Keyed children diff.
//!
//! # Design
//!
//! Four cursors walk the old and new child lists from both ends. Each step
//! applies the first rule that fits:
//!
//! 1. Skip old slots already consumed by an earlier move.
//! 2. Old start matches new start, or old end matches new end: patch in
//!    place.
//! 3. A keyed old edge node whose key appears nowhere among the new
//!    children: remove it right away so it cannot force a move.
//! 4. Old start matches new end (moved right), or old end matches new
//!    start (moved left): patch and move.
//! 5. Otherwise look the new start up by key (or by a linear identity scan
//!    when unkeyed). A hit is patched and moved before the old start; a miss
//!    is created there.
//!
//! When the old list runs out the remaining new nodes are inserted before
//! the node after the new range; when the new list runs out the remaining
//! old nodes are removed.
//!
//! The two-ended checks handle append, prepend, no change and a single
//! transposition without touching the key map, which is built lazily only
//! when rule 5 is reached.
//!
//! # Invariants
//!
//! 1. After the diff, the real children of `parent` are the new children's
//!    handles, in order.
//! 2. Every old node is either patched into exactly one new node or removed.
//! 3. In `remove_only` mode no surviving node is moved.

use ahash::{AHashMap, AHashSet};

use crate::identity::same_identity;
use crate::ops::NodeOps;
use crate::patch::{InsertQueue, Patcher};
use crate::vnode::{NodeKey, VNode};

/// Per-call counters logged at `DEBUG`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DiffStats {
    pub(crate) patched: usize,
    pub(crate) moved: usize,
    pub(crate) created: usize,
    pub(crate) removed: usize,
}

enum Step {
    SkipOldStart,
    SkipOldEnd,
    Starts,
    Ends,
    DropOldStart,
    DropOldEnd,
    StartToEnd,
    EndToStart,
    Lookup,
}

fn next_step<N>(
    old: &[Option<VNode<N>>],
    (old_start, old_end): (usize, usize),
    new: &[VNode<N>],
    (new_start, new_end): (usize, usize),
    new_keys: &mut Option<AHashSet<NodeKey>>,
) -> Step {
    let Some(os) = old[old_start].as_ref() else {
        return Step::SkipOldStart;
    };
    let Some(oe) = old[old_end - 1].as_ref() else {
        return Step::SkipOldEnd;
    };
    let (ns, ne) = (&new[new_start], &new[new_end - 1]);

    if same_identity(os, ns) {
        return Step::Starts;
    }
    if same_identity(oe, ne) {
        return Step::Ends;
    }
    let mut absent = |node: &VNode<N>| {
        node.key.as_ref().is_some_and(|key| {
            !new_keys
                .get_or_insert_with(|| new.iter().filter_map(|n| n.key.clone()).collect())
                .contains(key)
        })
    };
    if absent(os) {
        return Step::DropOldStart;
    }
    if absent(oe) {
        return Step::DropOldEnd;
    }
    if same_identity(os, ne) {
        return Step::StartToEnd;
    }
    if same_identity(oe, ns) {
        return Step::EndToStart;
    }
    Step::Lookup
}

fn key_index<N>(old: &[Option<VNode<N>>], start: usize, end: usize) -> AHashMap<NodeKey, usize> {
    let mut map = AHashMap::with_capacity(end - start);
    for (i, node) in old.iter().enumerate().take(end).skip(start) {
        if let Some(key) = node.as_ref().and_then(|n| n.key.clone()) {
            map.insert(key, i);
        }
    }
    map
}

fn find_in_old<N>(node: &VNode<N>, old: &[Option<VNode<N>>], start: usize, end: usize) -> Option<usize> {
    (start..end).find(|&i| old[i].as_ref().is_some_and(|o| same_identity(node, o)))
}

impl<B: NodeOps + 'static> Patcher<B> {
    /// Reconcile the children of `parent`, consuming the old list.
    pub(crate) fn update_children(
        &self,
        parent: &B::Node,
        old_children: Vec<VNode<B::Node>>,
        new_children: &mut [VNode<B::Node>],
        queue: &mut InsertQueue<B::Node>,
        remove_only: bool,
    ) -> DiffStats {
        let can_move = !remove_only;
        let (old_len, new_len) = (old_children.len(), new_children.len());
        let mut old: Vec<Option<VNode<B::Node>>> = old_children.into_iter().map(Some).collect();
        let (mut old_start, mut old_end) = (0, old.len());
        let (mut new_start, mut new_end) = (0, new_children.len());
        let mut old_keys: Option<AHashMap<NodeKey, usize>> = None;
        let mut new_keys: Option<AHashSet<NodeKey>> = None;
        let mut stats = DiffStats::default();

        self.check_duplicate_keys(new_children);

        while old_start < old_end && new_start < new_end {
            let step = next_step(
                &old,
                (old_start, old_end),
                new_children,
                (new_start, new_end),
                &mut new_keys,
            );
            match step {
                Step::SkipOldStart => old_start += 1,
                Step::SkipOldEnd => old_end -= 1,
                Step::Starts => {
                    if let Some(prev) = old[old_start].take() {
                        self.patch_vnode(prev, &mut new_children[new_start], queue, remove_only);
                    }
                    stats.patched += 1;
                    old_start += 1;
                    new_start += 1;
                }
                Step::Ends => {
                    if let Some(prev) = old[old_end - 1].take() {
                        self.patch_vnode(prev, &mut new_children[new_end - 1], queue, remove_only);
                    }
                    stats.patched += 1;
                    old_end -= 1;
                    new_end -= 1;
                }
                Step::DropOldStart => {
                    self.remove_vnodes(old[old_start].take());
                    stats.removed += 1;
                    old_start += 1;
                }
                Step::DropOldEnd => {
                    self.remove_vnodes(old[old_end - 1].take());
                    stats.removed += 1;
                    old_end -= 1;
                }
                Step::StartToEnd => {
                    let anchor = old[old_end - 1]
                        .as_ref()
                        .and_then(|n| n.elm.as_ref())
                        .and_then(|elm| self.ops.next_sibling(elm));
                    if let Some(prev) = old[old_start].take() {
                        self.patch_vnode(prev, &mut new_children[new_end - 1], queue, remove_only);
                    }
                    stats.patched += 1;
                    if can_move {
                        if let Some(elm) = &new_children[new_end - 1].elm {
                            self.ops.insert_before(parent, elm, anchor.as_ref());
                            stats.moved += 1;
                        }
                    }
                    old_start += 1;
                    new_end -= 1;
                }
                Step::EndToStart => {
                    let anchor = old[old_start].as_ref().and_then(|n| n.elm.clone());
                    if let Some(prev) = old[old_end - 1].take() {
                        self.patch_vnode(prev, &mut new_children[new_start], queue, remove_only);
                    }
                    stats.patched += 1;
                    if can_move {
                        if let Some(elm) = &new_children[new_start].elm {
                            self.ops.insert_before(parent, elm, anchor.as_ref());
                            stats.moved += 1;
                        }
                    }
                    old_end -= 1;
                    new_start += 1;
                }
                Step::Lookup => {
                    let anchor = old[old_start].as_ref().and_then(|n| n.elm.clone());
                    let target = &new_children[new_start];
                    let found = match &target.key {
                        Some(key) => old_keys
                            .get_or_insert_with(|| key_index(&old, old_start, old_end))
                            .get(key)
                            .copied(),
                        None => find_in_old(target, &old, old_start, old_end),
                    };
                    let reusable = found.filter(|&i| {
                        old[i].as_ref().is_some_and(|prev| same_identity(prev, target))
                    });

                    match reusable.and_then(|i| old[i].take()) {
                        Some(prev) => {
                            self.patch_vnode(prev, &mut new_children[new_start], queue, remove_only);
                            stats.patched += 1;
                            if can_move {
                                if let Some(elm) = &new_children[new_start].elm {
                                    self.ops.insert_before(parent, elm, anchor.as_ref());
                                    stats.moved += 1;
                                }
                            }
                        }
                        None => {
                            self.create_elm(
                                &mut new_children[new_start],
                                queue,
                                Some(parent),
                                anchor.as_ref(),
                                false,
                                true,
                            );
                            stats.created += 1;
                        }
                    }
                    new_start += 1;
                }
            }
        }

        if old_start >= old_end {
            let anchor = new_children.get(new_end).and_then(|n| n.elm.clone());
            stats.created += new_end.saturating_sub(new_start);
            self.add_vnodes(parent, anchor.as_ref(), &mut new_children[new_start..new_end], queue);
        } else if new_start >= new_end {
            let rest: Vec<_> = old[old_start..old_end].iter_mut().filter_map(Option::take).collect();
            stats.removed += rest.len();
            self.remove_vnodes(rest);
        }

        tracing::debug!(
            target: "weft_vdom",
            old = old_len,
            new = new_len,
            patched = stats.patched,
            moved = stats.moved,
            created = stats.created,
            removed = stats.removed,
            "update_children"
        );
        stats
    }
}
