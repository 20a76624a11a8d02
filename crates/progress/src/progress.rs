//! Work-day progress summed up the rollup tree.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use timeline_rollup::RollupNode;

use crate::estimator::{completed_days_of_work, EstimationConfig, EstimationEngine};
use crate::status::{StatusConfig, StatusScope};

/// Days of work and how much of it is done.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Total working days
    pub total_days: f64,
    /// Working days completed
    pub completed_days: f64,
    /// Completed share of the total, 0-100
    pub percent_complete: f64,
    /// One Monte-Carlo draw of the total
    pub sampled_days: f64,
}

impl Progress {
    /// Build from totals.
    pub fn new(total_days: f64, completed_days: f64) -> Self {
        let percent_complete = if total_days > 0.0 {
            completed_days / total_days * 100.0
        } else {
            0.0
        };
        Self {
            total_days,
            completed_days,
            percent_complete,
            sampled_days: 0.0,
        }
    }

    /// Set the sampled total.
    pub fn with_sampled_days(mut self, sampled_days: f64) -> Self {
        self.sampled_days = sampled_days;
        self
    }

    /// Sum of several progress values.
    pub fn sum<'a>(parts: impl IntoIterator<Item = &'a Progress>) -> Self {
        let (total, completed, sampled) = parts.into_iter().fold((0.0, 0.0, 0.0), |(t, c, s), p| {
            (t + p.total_days, c + p.completed_days, s + p.sampled_days)
        });
        Self::new(total, completed).with_sampled_days(sampled)
    }
}

/// Computes [`Progress`] for rollup nodes.
///
/// Owns the estimation engine, so sampled totals follow its seed: nodes
/// visited in the same order with the same seed draw the same values.
pub struct ProgressRollup<'a> {
    estimator: EstimationEngine,
    status: &'a StatusConfig,
    now: NaiveDate,
}

impl<'a> ProgressRollup<'a> {
    /// Create a calculator for `now`.
    pub fn new(estimation: EstimationConfig, status: &'a StatusConfig, now: NaiveDate) -> Self {
        Self {
            estimator: EstimationEngine::new(estimation),
            status,
            now,
        }
    }

    /// Progress of a node from its own estimate, ignoring children.
    pub fn leaf(&mut self, node: &RollupNode) -> Progress {
        let total = self.estimator.total_days_of_work(&node.item);
        let done = node
            .item
            .status
            .as_deref()
            .is_some_and(|s| self.status.is_done_for(StatusScope::Overall, s));
        let completed = if done {
            total
        } else {
            completed_days_of_work(&node.rollup, total, self.now)
        };
        let sampled = self.estimator.sample_days_of_work(&node.item);
        Progress::new(total, completed).with_sampled_days(sampled)
    }

    /// Progress of a node given its children's: its own estimate when it
    /// has no rolled-up children, else their sum.
    pub fn node(&mut self, node: &RollupNode, children: &[Progress]) -> Progress {
        if children.is_empty() {
            self.leaf(node)
        } else {
            Progress::sum(children)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline_core::{Item, TimingAssignment};
    use timeline_rollup::{ItemSet, RollupConfig, RollupEngine, RollupForest};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn forest(items: Vec<Item>) -> RollupForest {
        let set = ItemSet::new(items).unwrap();
        let engine = RollupEngine::new(
            RollupConfig::default()
                .with_hierarchy(["Epic", "Story"])
                .with_timing("Epic:childrenOnly".parse::<TimingAssignment>().unwrap()),
        );
        engine.rollup_all(&set, "Epic").unwrap()
    }

    fn progress_of(calc: &mut ProgressRollup<'_>, node: &RollupNode) -> Progress {
        let children: Vec<Progress> = node.children.issues.iter().map(|c| progress_of(calc, c)).collect();
        calc.node(node, &children)
    }

    #[test]
    fn test_percent_of_zero_total() {
        let p = Progress::new(0.0, 0.0);
        assert_eq!(p.percent_complete, 0.0);
    }

    #[test]
    fn test_parent_sums_children() {
        let forest = forest(vec![
            Item::new("E-1", "Epic"),
            Item::new("S-1", "Story")
                .with_parent("E-1")
                .with_status("Done")
                .with_dates(Some(d(2024, 1, 1)), Some(d(2024, 1, 10))),
            Item::new("S-2", "Story")
                .with_parent("E-1")
                .with_dates(Some(d(2024, 1, 8)), Some(d(2024, 1, 19))),
        ]);
        let epic = forest.get("E-1").unwrap();

        let status = StatusConfig::default();
        let mut calc = ProgressRollup::new(EstimationConfig::default(), &status, d(2024, 1, 10));
        let p = progress_of(&mut calc, epic);

        // S-1: 8 days, done. S-2: 10 days, 3 elapsed by the 10th.
        assert_eq!(p.total_days, 18.0);
        assert_eq!(p.completed_days, 11.0);
        assert!((p.percent_complete - 11.0 / 18.0 * 100.0).abs() < 1e-9);
        // Dated leaves sample exactly.
        assert_eq!(p.sampled_days, 18.0);
    }

    #[test]
    fn test_sampled_days_follow_seed() {
        let forest = forest(vec![
            Item::new("E-1", "Epic"),
            Item::new("S-1", "Story")
                .with_parent("E-1")
                .with_estimate(None, Some(5.0), Some(30.0)),
            Item::new("S-2", "Story")
                .with_parent("E-1")
                .with_estimate(None, Some(8.0), Some(40.0)),
        ]);
        let epic = forest.get("E-1").unwrap();
        let status = StatusConfig::default();
        let run = |seed: u64| {
            let mut calc = ProgressRollup::new(
                EstimationConfig::default().with_seed(seed),
                &status,
                d(2024, 1, 10),
            );
            progress_of(&mut calc, epic)
        };

        assert_eq!(run(1), run(1));
        assert_ne!(run(1).sampled_days, run(999).sampled_days);
        assert_eq!(run(1).total_days, run(999).total_days);
    }
}
