//! Report assembly: current and checkpoint passes paired by key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use timeline_core::{DateWindow, Item, ItemKey, Result, Time, TimingAssignment, TimingStrategy};
use timeline_rollup::{rollback_all, ItemSet, RollupConfig, RollupEngine, RollupForest, RollupNode};
use tracing::{debug, info};

use crate::estimator::EstimationConfig;
use crate::progress::{Progress, ProgressRollup};
use crate::status::{StatusConfig, StatusEngine, StatusResult};

/// Everything a report run needs besides the items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
    /// Hierarchy type names, outermost first
    pub hierarchy: Vec<String>,
    /// Strategy per type
    pub timing: TimingAssignment,
    /// Type whose items become report rows
    pub reporting_type: String,
    /// Status vocabulary
    pub status: StatusConfig,
    /// Estimation settings
    pub estimation: EstimationConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let rollup = RollupConfig::default();
        Self {
            hierarchy: rollup.hierarchy,
            timing: rollup.timing,
            reporting_type: "Initiative".to_string(),
            status: StatusConfig::default(),
            estimation: EstimationConfig::default(),
        }
    }
}

impl ReportConfig {
    /// Set the hierarchy.
    pub fn with_hierarchy<I, S>(mut self, hierarchy: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hierarchy = hierarchy.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timing assignment.
    pub fn with_timing(mut self, timing: TimingAssignment) -> Self {
        self.timing = timing;
        self
    }

    /// Set the reporting type.
    pub fn with_reporting_type(mut self, reporting_type: impl Into<String>) -> Self {
        self.reporting_type = reporting_type.into();
        self
    }

    /// Set the status configuration.
    pub fn with_status(mut self, status: StatusConfig) -> Self {
        self.status = status;
        self
    }

    /// Set the estimation configuration.
    pub fn with_estimation(mut self, estimation: EstimationConfig) -> Self {
        self.estimation = estimation;
        self
    }

    fn rollup_config(&self) -> RollupConfig {
        RollupConfig::default()
            .with_hierarchy(self.hierarchy.iter().cloned())
            .with_timing(self.timing.clone())
    }
}

/// A window with its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedStatus {
    /// Rolled-up window
    pub window: DateWindow,
    /// Derived status
    pub result: StatusResult,
}

/// One node of the report tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    /// Item key
    pub key: ItemKey,
    /// Item type
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item summary
    pub summary: String,
    /// Depth below the reporting type
    pub depth: usize,
    /// Strategy applied at this node
    pub strategy: TimingStrategy,
    /// Overall window and status
    pub rollup: ScopedStatus,
    /// Dev window and status
    pub dev: ScopedStatus,
    /// QA window and status
    pub qa: ScopedStatus,
    /// UAT window and status
    pub uat: ScopedStatus,
    /// Work-day progress
    pub progress: Progress,
    /// Drill-down rows
    pub children: Vec<ReportRow>,
}

impl ReportRow {
    /// Keys of the direct children.
    pub fn child_keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.children.iter().map(|c| &c.key)
    }
}

/// Output of a report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Type the rows are made of
    pub reporting_type: String,
    /// Comparison point for trends
    pub checkpoint: Time,
    /// Date statuses were judged on
    pub now: NaiveDate,
    /// One row per item of the reporting type
    pub rows: Vec<ReportRow>,
    /// Span of all rows
    pub calendar: DateWindow,
}

impl Report {
    /// Find a row anywhere in the tree.
    pub fn find(&self, key: &str) -> Option<&ReportRow> {
        fn search<'a>(rows: &'a [ReportRow], key: &str) -> Option<&'a ReportRow> {
            rows.iter()
                .find_map(|r| (r.key.as_str() == key).then_some(r).or_else(|| search(&r.children, key)))
        }
        search(&self.rows, key)
    }
}

/// Runs full report refreshes.
pub struct ReportBuilder {
    config: ReportConfig,
    rollup: RollupEngine,
    status: StatusEngine,
}

impl ReportBuilder {
    /// Create a builder.
    pub fn new(config: ReportConfig) -> Self {
        Self {
            rollup: RollupEngine::new(config.rollup_config()),
            status: StatusEngine::new(config.status.clone()),
            config,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Roll up `items` now and as of `checkpoint`, then derive statuses
    /// and progress for every node of the reporting type.
    ///
    /// Sampled totals restart from the configured seed on every build.
    pub fn build(&self, items: Vec<Item>, checkpoint: Time, now: NaiveDate) -> Result<Report> {
        let reporting_type = self.config.reporting_type.as_str();
        let past = rollback_all(&items, checkpoint);
        let current = ItemSet::new(items)?;
        let prior = ItemSet::new(past)?;

        let current_forest = self.rollup.rollup_all(&current, reporting_type)?;
        let prior_forest = self.rollup.rollup_all(&prior, reporting_type)?;
        debug!(
            "Paired {} current nodes with {} checkpoint nodes",
            current_forest.len(),
            prior_forest.len()
        );

        let mut progress =
            ProgressRollup::new(self.config.estimation.clone(), &self.config.status, now);
        let rows: Vec<ReportRow> = current_forest
            .roots()
            .iter()
            .map(|node| self.row(node, &prior_forest, &mut progress, now))
            .collect();
        let calendar = RollupEngine::collapse(rows.iter().map(|r| &r.rollup.window));

        info!(
            "Built {} report with {} rows from {} items",
            reporting_type,
            rows.len(),
            current.len()
        );
        Ok(Report {
            reporting_type: reporting_type.to_string(),
            checkpoint,
            now,
            rows,
            calendar,
        })
    }

    fn row(
        &self,
        node: &RollupNode,
        prior_forest: &RollupForest,
        progress: &mut ProgressRollup<'_>,
        now: NaiveDate,
    ) -> ReportRow {
        let children: Vec<ReportRow> = node
            .children
            .issues
            .iter()
            .map(|child| self.row(child, prior_forest, progress, now))
            .collect();

        let prior = prior_forest.get(node.key().as_str());
        let [overall, dev, qa, uat] = self.status.evaluate_all(node, prior, now);
        let child_progress: Vec<Progress> = children.iter().map(|c| c.progress).collect();
        let node_progress = progress.node(node, &child_progress);

        ReportRow {
            key: node.key().clone(),
            item_type: node.item.item_type.clone(),
            summary: node.item.summary.clone(),
            depth: node.depth,
            strategy: node.strategy,
            rollup: ScopedStatus {
                window: node.rollup.clone(),
                result: overall,
            },
            dev: ScopedStatus {
                window: node.dev.clone(),
                result: dev,
            },
            qa: ScopedStatus {
                window: node.qa.clone(),
                result: qa,
            },
            uat: ScopedStatus {
                window: node.uat.clone(),
                result: uat,
            },
            progress: node_progress,
            children,
        }
    }
}
