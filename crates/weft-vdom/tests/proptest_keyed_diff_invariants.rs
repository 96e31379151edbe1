//! Property-based invariant tests for the children diff.
//!
//! These tests verify invariants that must hold for **any** pair of child
//! lists:
//!
//! 1. After a keyed update the real children are exactly the new keys, in
//!    order.
//! 2. A key present before and after keeps its real node; only departed keys
//!    are removed and only arriving keys are created.
//! 3. With moves disabled, deleting any subset of children performs no move.
//! 4. Unkeyed lists of any lengths converge on the new content.
//! 5. Patching a tree against an identical description records no operation.

use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;
use weft_harness::{DomNode, DomOp, MemoryDom};
use weft_vdom::{NodeOps as _, PatchTarget, Patcher, VNode};

// ── Helpers ─────────────────────────────────────────────────────────────

fn keyed(keys: &[u8]) -> VNode<DomNode> {
    VNode::element("ul").with_children(
        keys.iter()
            .map(|k| VNode::element("li").with_key(i64::from(*k)).with_text(k.to_string())),
    )
}

fn unkeyed(texts: &[u8]) -> VNode<DomNode> {
    VNode::element("ul").with_children(texts.iter().map(|t| {
        if t % 3 == 0 {
            VNode::text(t.to_string())
        } else {
            VNode::element("li").with_text(t.to_string())
        }
    }))
}

fn contents(dom: &MemoryDom, root: DomNode) -> Vec<String> {
    dom.children(root)
        .into_iter()
        .map(|node| dom.text_data(&node).unwrap_or_else(|| dom.inner_html(&node)))
        .collect()
}

fn expected(keys: &[u8]) -> Vec<String> {
    keys.iter().map(u8::to_string).collect()
}

fn key_list() -> impl Strategy<Value = Vec<u8>> {
    proptest::sample::subsequence((0u8..16).collect::<Vec<_>>(), 0..=16).prop_shuffle()
}

fn setup() -> (Rc<MemoryDom>, Patcher<MemoryDom>) {
    let dom = Rc::new(MemoryDom::new());
    let patcher = Patcher::new(Rc::clone(&dom), []);
    (dom, patcher)
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Keyed reconciliation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn keyed_update_converges(old in key_list(), new in key_list()) {
        let (dom, patcher) = setup();
        let mut first = keyed(&old);
        let root = patcher.mount(&mut first).expect("root");
        let before: HashMap<u8, DomNode> = old
            .iter()
            .copied()
            .zip(dom.children(root))
            .collect();
        dom.clear_log();

        let mut next = keyed(&new);
        patcher.update(first, &mut next);

        prop_assert_eq!(contents(&dom, root), expected(&new));
        for (key, child) in new.iter().zip(dom.children(root)) {
            if let Some(previous) = before.get(key) {
                prop_assert_eq!(*previous, child, "key {} lost its node", key);
            }
        }

        let arriving = new.iter().filter(|k| !old.contains(k)).count();
        let departing = old.iter().filter(|k| !new.contains(k)).count();
        let created = dom
            .log()
            .iter()
            .filter(|op| matches!(op, DomOp::CreateElement { .. }))
            .count();
        prop_assert_eq!(created, arriving);
        prop_assert_eq!(dom.stats().removed, departing);
    }

    #[test]
    fn every_child_records_its_element(old in key_list(), new in key_list()) {
        let (dom, patcher) = setup();
        let mut first = keyed(&old);
        let root = patcher.mount(&mut first).expect("root");
        let mut next = keyed(&new);
        patcher.update(first, &mut next);

        let recorded: Vec<DomNode> = next.children.iter().filter_map(|c| c.elm).collect();
        prop_assert_eq!(recorded, dom.children(root));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Remove-only mode
// ═════════════════════════════════════════════════════════════════════════

fn list_and_survivors() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    key_list().prop_flat_map(|old| {
        let len = old.len();
        (Just(old.clone()), proptest::sample::subsequence(old, 0..=len))
    })
}

proptest! {
    #[test]
    fn deletions_never_move((old, kept) in list_and_survivors()) {
        let (dom, patcher) = setup();
        let mut first = keyed(&old);
        let root = patcher.mount(&mut first).expect("root");
        dom.clear_log();

        let mut next = keyed(&kept);
        patcher.patch(Some(PatchTarget::Previous(first)), Some(&mut next), false, true);

        prop_assert_eq!(dom.stats().moved, 0);
        prop_assert_eq!(dom.stats().removed, old.len() - kept.len());
        prop_assert_eq!(contents(&dom, root), expected(&kept));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4-5. Unkeyed lists and idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unkeyed_update_converges(
        old in proptest::collection::vec(0u8..30, 0..10),
        new in proptest::collection::vec(0u8..30, 0..10),
    ) {
        let (dom, patcher) = setup();
        let mut first = unkeyed(&old);
        let root = patcher.mount(&mut first).expect("root");
        let mut next = unkeyed(&new);
        patcher.update(first, &mut next);
        prop_assert_eq!(contents(&dom, root), expected(&new));
    }

    #[test]
    fn identical_description_is_a_no_op(keys in key_list()) {
        let (dom, patcher) = setup();
        let mut first = keyed(&keys);
        patcher.mount(&mut first);
        dom.clear_log();

        let mut next = keyed(&keys);
        patcher.update(first, &mut next);
        prop_assert!(dom.log().is_empty());
    }
}
