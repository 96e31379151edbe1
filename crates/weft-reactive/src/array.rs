#![forbid(unsafe_code)]

//! The seven intercepted sequence mutations.
//!
//! Index and length writes cannot be seen by per-key accessors, so every
//! in-place structural change to an [`Array`] goes through one of these
//! methods. On an observed array each one observes the elements it inserted
//! and then notifies the array's own dep exactly once, whether or not the
//! call actually changed anything. On an unobserved array they are plain
//! vector operations.

use std::cmp::Ordering;

use crate::observer;
use crate::value::{Array, Value};
use crate::warning::{self, ReactiveWarning};

/// An intercepted sequence mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayMethod {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Sort,
    Reverse,
}

impl ArrayMethod {
    pub const ALL: [ArrayMethod; 7] = [
        Self::Push,
        Self::Pop,
        Self::Shift,
        Self::Unshift,
        Self::Splice,
        Self::Sort,
        Self::Reverse,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Shift => "shift",
            Self::Unshift => "unshift",
            Self::Splice => "splice",
            Self::Sort => "sort",
            Self::Reverse => "reverse",
        }
    }
}

/// Ordering of the argument-less `sort`: by string form, `Undefined` last.
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.to_display_string().cmp(&b.to_display_string()),
    }
}

impl Array {
    /// Run `op` on the items, then observe `inserted` and notify.
    ///
    /// The items are moved out for the duration of `op` so a comparator may
    /// read the array without a borrow conflict.
    fn intercept<R>(
        &self,
        method: ArrayMethod,
        inserted: &[Value],
        op: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Option<R> {
        if self.is_frozen() {
            warning::emit(ReactiveWarning::FrozenArray {
                method: method.name(),
            });
            return None;
        }
        let mut items = std::mem::take(&mut self.inner.borrow_mut().items);
        let result = op(&mut items);
        self.inner.borrow_mut().items = items;

        if let Some(ob) = self.observer() {
            for item in inserted {
                observer::observe(item);
            }
            tracing::trace!(
                method = method.name(),
                inserted = inserted.len(),
                dep = ob.dep().id().0,
                "array mutation"
            );
            ob.dep().notify();
        }
        Some(result)
    }

    /// Append `items`; returns the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let items: Vec<Value> = items.into_iter().collect();
        self.intercept(ArrayMethod::Push, &items.clone(), move |v| {
            v.extend(items);
            v.len()
        })
        .unwrap_or_else(|| self.len())
    }

    /// Remove and return the last element (`Undefined` if empty).
    pub fn pop(&self) -> Value {
        self.intercept(ArrayMethod::Pop, &[], Vec::pop)
            .flatten()
            .unwrap_or_default()
    }

    /// Remove and return the first element (`Undefined` if empty).
    pub fn shift(&self) -> Value {
        self.intercept(ArrayMethod::Shift, &[], |v| {
            if v.is_empty() {
                None
            } else {
                Some(v.remove(0))
            }
        })
        .flatten()
        .unwrap_or_default()
    }

    /// Prepend `items` in order; returns the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let items: Vec<Value> = items.into_iter().collect();
        self.intercept(ArrayMethod::Unshift, &items.clone(), move |v| {
            v.splice(0..0, items);
            v.len()
        })
        .unwrap_or_else(|| self.len())
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// `start` and `delete_count` are clamped to the array bounds. Returns
    /// the removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let items: Vec<Value> = items.into_iter().collect();
        self.intercept(ArrayMethod::Splice, &items.clone(), move |v| {
            let start = start.min(v.len());
            let end = start + delete_count.min(v.len() - start);
            v.splice(start..end, items).collect()
        })
        .unwrap_or_default()
    }

    /// Stable sort by string form, with `Undefined` last.
    pub fn sort(&self) {
        self.sort_by(default_order);
    }

    /// Stable sort with a caller-supplied comparator.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.intercept(ArrayMethod::Sort, &[], |v| v.sort_by(compare));
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        self.intercept(ArrayMethod::Reverse, &[], |v| v.reverse());
    }
}
