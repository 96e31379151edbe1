#![forbid(unsafe_code)]

//! Deep dependency registration.
//!
//! [`traverse`] walks every container reachable from a value, reading each
//! key through its accessor and depending on each observed container's own
//! dep. A subscriber that traverses a value during evaluation is therefore
//! notified by any nested change, including key additions and sequence
//! mutations.
//!
//! The visited set lives for one top-level call and is threaded through the
//! recursion explicitly. Observed containers are keyed by dep id, others by
//! address, so cycles terminate either way.

use ahash::AHashSet;

use crate::dep::DepId;
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Visit {
    Dep(DepId),
    Addr(usize),
}

/// Register the current target with everything reachable from `value`.
///
/// Scalars, frozen containers and opaque values are not descended into.
pub fn traverse(value: &Value) {
    let mut seen = AHashSet::new();
    walk(value, &mut seen);
    tracing::trace!(visited = seen.len(), "traverse");
}

fn walk(value: &Value, seen: &mut AHashSet<Visit>) {
    let addr = match value {
        Value::Object(obj) if !obj.is_frozen() => obj.addr(),
        Value::Array(arr) if !arr.is_frozen() => arr.addr(),
        _ => return,
    };

    let visit = match value.observer() {
        Some(ob) => {
            ob.dep().depend();
            Visit::Dep(ob.dep().id())
        }
        None => Visit::Addr(addr),
    };
    if !seen.insert(visit) {
        return;
    }

    match value {
        Value::Array(arr) => {
            for item in arr.to_vec().iter().rev() {
                walk(item, seen);
            }
        }
        Value::Object(obj) => {
            for key in obj.keys().iter().rev() {
                walk(&obj.get(key), seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Array, Object};
    use crate::{Effect, observe, set};

    fn deep_state() -> (Object, Object, Array) {
        let leaf = Object::from_pairs([("n", 1)]);
        let list = Array::from_vec(vec![Value::from(leaf.clone())]);
        let root = Object::from_pairs([("list", Value::from(list.clone()))]);
        observe(&Value::from(root.clone()));
        (root, leaf, list)
    }

    #[test]
    fn nested_write_notifies_traversing_subscriber() {
        let (root, leaf, _) = deep_state();
        let r = Value::from(root);
        let effect = Effect::new(move || traverse(&r));

        leaf.put("n", Value::from(2));
        assert_eq!(effect.runs(), 2);
    }

    #[test]
    fn nested_key_addition_notifies() {
        let (root, leaf, list) = deep_state();
        let r = Value::from(root);
        let effect = Effect::new(move || traverse(&r));

        set(&Value::from(leaf), "extra", Value::from(true));
        assert_eq!(effect.runs(), 2);
        list.push([Value::from(5)]);
        assert_eq!(effect.runs(), 3);
    }

    #[test]
    fn cycles_terminate() {
        let a = Object::new();
        let b = Object::new();
        a.put("b", Value::from(b.clone()));
        b.put("a", Value::from(a.clone()));
        traverse(&Value::from(a.clone()));

        observe(&Value::from(a.clone()));
        let v = Value::from(a);
        let effect = Effect::new(move || traverse(&v));
        assert_eq!(effect.runs(), 1);
    }

    #[test]
    fn frozen_subtree_is_skipped() {
        let frozen = Object::from_pairs([("n", 1)]);
        let root = Object::from_pairs([("f", Value::from(frozen.clone()))]);
        observe(&Value::from(root.clone()));
        frozen.freeze();
        let r = Value::from(root);
        let effect = Effect::new(move || traverse(&r));
        assert!(effect.dep_count() >= 1);

        frozen.put("n", Value::from(2));
        assert_eq!(effect.runs(), 1);
    }

    #[test]
    fn visited_set_does_not_leak_between_calls() {
        let (root, leaf, _) = deep_state();
        let r = Value::from(root);
        traverse(&r);
        let effect = Effect::new(move || traverse(&r));
        leaf.put("n", Value::from(3));
        assert_eq!(effect.runs(), 2);
    }
}
