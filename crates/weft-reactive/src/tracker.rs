#![forbid(unsafe_code)]

//! Per-run dependency bookkeeping shared by [`Effect`](crate::Effect) and
//! [`Computed`](crate::Computed).
//!
//! Each evaluation collects into a fresh set. At the end of the run the
//! previous set is diffed against it so the subscriber can drop deps it no
//! longer reads.

use ahash::AHashSet;

use crate::dep::{Dep, DepId};

#[derive(Default)]
pub(crate) struct DepTracker {
    deps: Vec<Dep>,
    dep_ids: AHashSet<DepId>,
    new_deps: Vec<Dep>,
    new_dep_ids: AHashSet<DepId>,
}

impl DepTracker {
    /// Record `dep` for the current run. Returns `true` when the subscriber
    /// is not yet in the dep's list and must add itself.
    pub(crate) fn record(&mut self, dep: &Dep) -> bool {
        let id = dep.id();
        if !self.new_dep_ids.insert(id) {
            return false;
        }
        self.new_deps.push(dep.clone());
        !self.dep_ids.contains(&id)
    }

    /// Close the current run, returning deps read last time but not this time.
    pub(crate) fn finish(&mut self) -> Vec<Dep> {
        let fresh = &self.new_dep_ids;
        let stale = self
            .deps
            .drain(..)
            .filter(|dep| !fresh.contains(&dep.id()))
            .collect();
        std::mem::swap(&mut self.deps, &mut self.new_deps);
        std::mem::swap(&mut self.dep_ids, &mut self.new_dep_ids);
        self.new_deps.clear();
        self.new_dep_ids.clear();
        stale
    }

    /// Forget everything, returning every dep currently held.
    pub(crate) fn take_all(&mut self) -> Vec<Dep> {
        self.dep_ids.clear();
        self.new_deps.clear();
        self.new_dep_ids.clear();
        std::mem::take(&mut self.deps)
    }

    pub(crate) fn deps(&self) -> &[Dep] {
        &self.deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_dedupes_within_a_run() {
        let mut tracker = DepTracker::default();
        let dep = Dep::new();
        assert!(tracker.record(&dep));
        assert!(!tracker.record(&dep));
        assert!(tracker.finish().is_empty());
        assert_eq!(tracker.deps().len(), 1);
    }

    #[test]
    fn second_run_reports_stale_and_skips_known() {
        let mut tracker = DepTracker::default();
        let (a, b, c) = (Dep::new(), Dep::new(), Dep::new());
        tracker.record(&a);
        tracker.record(&b);
        tracker.finish();

        assert!(!tracker.record(&a));
        assert!(tracker.record(&c));
        let stale = tracker.finish();

        assert_eq!(stale.len(), 1);
        assert!(stale[0].ptr_eq(&b));
        assert_eq!(tracker.deps().len(), 2);
    }

    #[test]
    fn take_all_empties() {
        let mut tracker = DepTracker::default();
        tracker.record(&Dep::new());
        tracker.finish();
        assert_eq!(tracker.take_all().len(), 1);
        assert!(tracker.deps().is_empty());
    }
}
