//! Property-based invariant tests for weft-reactive.
//!
//! These tests verify invariants that must hold for **any** sequence of
//! writes and sequence mutations:
//!
//! 1. A subscriber that read a key reruns exactly once per effective write
//!    and never for a value-identical write.
//! 2. Every intercepted sequence mutation leaves the array equal to the same
//!    operation applied to a plain `Vec`, and notifies exactly once.
//! 3. `observe` is idempotent for any nesting of containers.
//! 4. Unbatched notification order is ascending subscriber id regardless of
//!    registration order.
//! 5. An effect reading a computed always sees the value a fresh evaluation
//!    would produce, whichever of its reads subscribed first.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use weft_reactive::{
    Array, Computed, Dep, Effect, Object, ReactiveConfig, Subscriber, SubscriberId, Value, observe,
};

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Pop,
    Shift,
    Unshift(i32),
    Splice(usize, usize, Vec<i32>),
    Sort,
    Reverse,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-50i32..50).prop_map(Op::Push),
        Just(Op::Pop),
        Just(Op::Shift),
        (-50i32..50).prop_map(Op::Unshift),
        (0usize..12, 0usize..4, proptest::collection::vec(-50i32..50, 0..3))
            .prop_map(|(s, d, items)| Op::Splice(s, d, items)),
        Just(Op::Sort),
        Just(Op::Reverse),
    ]
}

fn apply_model(model: &mut Vec<i32>, op: &Op) {
    match op {
        Op::Push(v) => model.push(*v),
        Op::Pop => {
            model.pop();
        }
        Op::Shift => {
            if !model.is_empty() {
                model.remove(0);
            }
        }
        Op::Unshift(v) => model.insert(0, *v),
        Op::Splice(start, delete, items) => {
            let start = (*start).min(model.len());
            let end = start + (*delete).min(model.len() - start);
            model.splice(start..end, items.iter().copied());
        }
        Op::Sort => model.sort_by_key(|v| v.to_string()),
        Op::Reverse => model.reverse(),
    }
}

fn apply_array(arr: &Array, op: &Op) {
    match op {
        Op::Push(v) => {
            arr.push([Value::from(*v)]);
        }
        Op::Pop => {
            arr.pop();
        }
        Op::Shift => {
            arr.shift();
        }
        Op::Unshift(v) => {
            arr.unshift([Value::from(*v)]);
        }
        Op::Splice(start, delete, items) => {
            arr.splice(*start, *delete, items.iter().map(|v| Value::from(*v)));
        }
        Op::Sort => arr.sort(),
        Op::Reverse => arr.reverse(),
    }
}

fn as_ints(arr: &Array) -> Vec<i32> {
    arr.to_vec()
        .iter()
        .filter_map(Value::as_number)
        .map(|n| n as i32)
        .collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Exactly one rerun per effective write
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn one_rerun_per_effective_write(writes in proptest::collection::vec(0i32..4, 0..30)) {
        let state = Object::from_pairs([("k", 0)]);
        observe(&Value::from(state.clone()));
        let s = state.clone();
        let effect = Effect::new(move || {
            let _ = s.get("k");
        });

        let mut current = 0;
        let mut expected = 1;
        for w in writes {
            if w != current {
                expected += 1;
                current = w;
            }
            state.put("k", Value::from(w));
            prop_assert_eq!(effect.runs(), expected);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Sequence interception matches the plain model and notifies once
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn intercepted_ops_match_vec_model(
        initial in proptest::collection::vec(-50i32..50, 0..8),
        ops in proptest::collection::vec(op(), 1..25),
    ) {
        let arr: Array = initial.iter().copied().collect();
        observe(&Value::from(arr.clone()));
        let a = arr.clone();
        let effect = Effect::new(move || {
            if let Some(ob) = a.observer() {
                ob.dep().depend();
            }
        });

        let mut model = initial;
        for (i, op) in ops.iter().enumerate() {
            apply_model(&mut model, op);
            apply_array(&arr, op);
            prop_assert_eq!(as_ints(&arr), model.clone(), "after {:?}", op);
            prop_assert_eq!(effect.runs(), i as u64 + 2);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. observe is idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn observe_twice_returns_same_observer(depth in 0usize..6, width in 1usize..4) {
        let mut value = Value::from(Object::from_pairs([("leaf", 1)]));
        for level in 0..depth {
            value = if level % 2 == 0 {
                Value::from(Array::from_vec(vec![value; width]))
            } else {
                Value::from(Object::from_pairs([("child", value)]))
            };
        }
        let first = observe(&value);
        let second = observe(&value);
        prop_assert!(first.is_some());
        prop_assert!(Rc::ptr_eq(&first.unwrap(), &second.unwrap()));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Unbatched delivery is ascending by id
// ═════════════════════════════════════════════════════════════════════════

struct Recorder {
    id: SubscriberId,
    log: Rc<RefCell<Vec<u64>>>,
}

impl Subscriber for Recorder {
    fn id(&self) -> SubscriberId {
        self.id
    }
    fn add_dep(self: Rc<Self>, dep: &Dep) {
        dep.add_sub(&(self as Rc<dyn Subscriber>));
    }
    fn update(&self) {
        self.log.borrow_mut().push(self.id.0);
    }
}

proptest! {
    #[test]
    fn unbatched_notify_is_sorted(ids in proptest::sample::subsequence((1u64..40).collect::<Vec<_>>(), 1..20).prop_shuffle()) {
        let _guard = ReactiveConfig::default().with_async_scheduling(false).install();
        let log = Rc::new(RefCell::new(Vec::new()));
        let dep = Dep::new();
        let subs: Vec<Rc<dyn Subscriber>> = ids
            .iter()
            .map(|&id| Rc::new(Recorder { id: SubscriberId(id), log: Rc::clone(&log) }) as Rc<dyn Subscriber>)
            .collect();
        for sub in &subs {
            dep.add_sub(sub);
        }

        dep.notify();

        let mut sorted = ids.clone();
        sorted.sort_unstable();
        prop_assert_eq!(log.borrow().clone(), sorted);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Computed reads inside an effect are never stale
// ═════════════════════════════════════════════════════════════════════════

fn number(state: &Object, key: &str) -> f64 {
    state.get(key).as_number().unwrap_or(0.0)
}

proptest! {
    #[test]
    fn effect_sees_fresh_computed(
        writes in proptest::collection::vec((any::<bool>(), -20i32..20), 1..25),
        direct_first in any::<bool>(),
        unbatched in any::<bool>(),
    ) {
        let _guard = ReactiveConfig::default().with_async_scheduling(!unbatched).install();
        let state = Object::from_pairs([("a", 1), ("b", 2)]);
        observe(&Value::from(state.clone()));

        let st = state.clone();
        let combined = Computed::new(move || number(&st, "a") * 3.0 - number(&st, "b"));
        let seen = Rc::new(Cell::new(f64::NAN));
        let (st, c, sn) = (state.clone(), combined.clone(), Rc::clone(&seen));
        let _effect = Effect::new(move || {
            if direct_first {
                let _ = number(&st, "a") + number(&st, "b");
            }
            sn.set(c.get());
        });
        prop_assert_eq!(seen.get(), 1.0);

        for (to_a, value) in writes {
            state.put(if to_a { "a" } else { "b" }, Value::from(value));
            let expected = number(&state, "a") * 3.0 - number(&state, "b");
            prop_assert_eq!(seen.get(), expected);
        }
    }
}
