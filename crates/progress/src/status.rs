//! Delivery status derivation.
//!
//! A status is computed per node and scope from the current rollup, the
//! matching node of a prior pass and the current date. Nothing is cached:
//! every call re-evaluates from its inputs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use timeline_core::{DateWindow, Item};
use timeline_rollup::{RollupNode, WorkType};

/// Categorical delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No due date to judge against
    Unknown,
    /// Not present at the checkpoint
    New,
    /// Starts in the future
    NotStarted,
    /// Due date held
    OnTrack,
    /// Due date moved earlier
    Ahead,
    /// Due date moved later
    Behind,
    /// Work is blocked
    Blocked,
    /// Done, by status or by date
    Complete,
}

impl Status {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::New => "new",
            Status::NotStarted => "notstarted",
            Status::OnTrack => "ontrack",
            Status::Ahead => "ahead",
            Status::Behind => "behind",
            Status::Blocked => "blocked",
            Status::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one node in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    /// Derived status
    pub status: Status,
    /// Set when workflow status and derived status disagree
    pub warning: bool,
    /// Human-readable reason
    pub message: Option<String>,
}

impl StatusResult {
    fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            warning: false,
            message: Some(message.into()),
        }
    }

    fn warn(mut self, warning: bool) -> Self {
        self.warning = warning;
        self
    }
}

/// What a status is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusScope {
    /// The whole item
    Overall,
    /// One work type bucket
    Work(WorkType),
}

impl StatusScope {
    /// The three work scopes reported next to the overall one.
    pub const WORK: [StatusScope; 3] = [
        StatusScope::Work(WorkType::Dev),
        StatusScope::Work(WorkType::Qa),
        StatusScope::Work(WorkType::Uat),
    ];

    fn label(&self) -> String {
        match self {
            StatusScope::Overall => "status is complete".to_string(),
            StatusScope::Work(w) => format!("status is {} complete", w.bucket()),
        }
    }

    fn window<'a>(&self, node: &'a RollupNode) -> &'a DateWindow {
        match self {
            StatusScope::Overall => &node.rollup,
            StatusScope::Work(w) => node.work_window(*w),
        }
    }

    fn relevant_children<'a>(&self, node: &'a RollupNode) -> Vec<&'a RollupNode> {
        match self {
            StatusScope::Overall => node.children.issues.iter().collect(),
            StatusScope::Work(w) => node.children_of_type(*w),
        }
    }
}

/// Workflow vocabulary and tolerances for status derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusConfig {
    /// Statuses meaning the item is finished
    pub done: Vec<String>,
    /// Statuses meaning the item is in QA
    pub qa_stage: Vec<String>,
    /// Statuses meaning the item is in UAT
    pub uat_stage: Vec<String>,
    /// Status meaning the item is blocked
    pub blocked: String,
    /// Days a due date may move before it counts as ahead or behind
    pub wiggle_days: i64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            done: vec!["done".into(), "closed".into(), "resolved".into()],
            qa_stage: vec!["qa".into(), "in qa".into()],
            uat_stage: vec!["uat".into(), "in uat".into()],
            blocked: "blocked".into(),
            wiggle_days: 0,
        }
    }
}

impl StatusConfig {
    /// Set the wiggle tolerance.
    pub fn with_wiggle_days(mut self, days: i64) -> Self {
        self.wiggle_days = days;
        self
    }

    /// Set the done statuses.
    pub fn with_done<I, S>(mut self, done: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.done = done.into_iter().map(Into::into).collect();
        self
    }

    fn is_in(set: &[String], status: &str) -> bool {
        let status = status.trim();
        set.iter().any(|s| s.eq_ignore_ascii_case(status))
    }

    /// Whether `status` finishes `scope`. Dev is finished once the item has
    /// reached QA, UAT or done; QA once UAT or done.
    pub fn is_done_for(&self, scope: StatusScope, status: &str) -> bool {
        if Self::is_in(&self.done, status) {
            return true;
        }
        match scope {
            StatusScope::Overall => false,
            StatusScope::Work(w) => match w.bucket() {
                WorkType::Qa => Self::is_in(&self.uat_stage, status),
                WorkType::Uat => false,
                _ => Self::is_in(&self.qa_stage, status) || Self::is_in(&self.uat_stage, status),
            },
        }
    }

    /// Whether `status` is the blocked status.
    pub fn is_blocked(&self, status: &str) -> bool {
        self.blocked.eq_ignore_ascii_case(status.trim())
    }
}

/// Status from date movement alone.
///
/// `prior` is the due date at the checkpoint; `None` means the node did not
/// exist then (or had no due date).
pub fn timed_status(
    current: &DateWindow,
    prior: Option<NaiveDate>,
    now: NaiveDate,
    wiggle_days: i64,
) -> Status {
    let Some(due) = current.due else {
        return Status::Unknown;
    };
    if due < now {
        return Status::Complete;
    }
    match prior {
        Some(before) => {
            let moved = (due - before).num_days();
            if moved > wiggle_days {
                return Status::Behind;
            }
            if moved < -wiggle_days {
                return Status::Ahead;
            }
        }
        None => return Status::New,
    }
    match current.start {
        Some(start) if start > now => Status::NotStarted,
        _ => Status::OnTrack,
    }
}

/// Derives [`StatusResult`]s.
#[derive(Debug, Clone, Default)]
pub struct StatusEngine {
    config: StatusConfig,
}

impl StatusEngine {
    /// Create an engine.
    pub fn new(config: StatusConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &StatusConfig {
        &self.config
    }

    /// Status of `node` in `scope`, compared with `prior` (the same key in
    /// the checkpoint pass).
    pub fn evaluate(
        &self,
        node: &RollupNode,
        prior: Option<&RollupNode>,
        scope: StatusScope,
        now: NaiveDate,
    ) -> StatusResult {
        let item = &*node.item;
        let own = own_status(item);
        let children = scope.relevant_children(node);

        if let Some(status) = own {
            if self.config.is_done_for(scope, status) {
                return StatusResult::new(Status::Complete, scope.label());
            }
        }

        let own_blocked = own.is_some_and(|s| self.config.is_blocked(s));
        if !own_blocked && self.all_confirmed(&children, scope) {
            // Step 1 already failed, so any native status lags behind.
            return StatusResult::new(Status::Complete, "all children complete")
                .warn(item.has_native_status());
        }

        if own_blocked {
            return StatusResult::new(Status::Blocked, format!("{} is blocked", item.key));
        }
        if let Some(child) = children
            .iter()
            .find(|c| own_status(&c.item).is_some_and(|s| self.config.is_blocked(s)))
        {
            return StatusResult::new(Status::Blocked, format!("child {} is blocked", child.key()));
        }

        let window = scope.window(node);
        if window.due.is_none() {
            return StatusResult::new(Status::Unknown, "no due date");
        }

        let prior_due = prior.and_then(|p| scope.window(p).due);
        let status = timed_status(window, prior_due, now, self.config.wiggle_days);
        let message = match (status, prior_due, window.due) {
            (Status::Complete, _, _) => "due date has passed".to_string(),
            (Status::Behind | Status::Ahead, Some(before), Some(due)) => {
                format!("due date moved from {} to {}", before, due)
            }
            (Status::New, _, _) => "not present at checkpoint".to_string(),
            (Status::NotStarted, _, _) => "starts in the future".to_string(),
            _ => "due date held".to_string(),
        };
        let warning = status == Status::Complete && !self.all_confirmed(&children, scope);
        StatusResult::new(status, message).warn(warning)
    }

    /// Overall status followed by dev, qa and uat.
    pub fn evaluate_all(
        &self,
        node: &RollupNode,
        prior: Option<&RollupNode>,
        now: NaiveDate,
    ) -> [StatusResult; 4] {
        let [dev, qa, uat] = StatusScope::WORK;
        [
            self.evaluate(node, prior, StatusScope::Overall, now),
            self.evaluate(node, prior, dev, now),
            self.evaluate(node, prior, qa, now),
            self.evaluate(node, prior, uat, now),
        ]
    }

    /// Whether a node's completion in `scope` is backed by workflow
    /// statuses: its own status finishes the scope, or it has relevant
    /// children and each of them is confirmed.
    pub fn is_confirmed_complete(&self, node: &RollupNode, scope: StatusScope) -> bool {
        match own_status(&node.item) {
            Some(s) if self.config.is_done_for(scope, s) => true,
            Some(s) if self.config.is_blocked(s) => false,
            _ => self.all_confirmed(&scope.relevant_children(node), scope),
        }
    }

    fn all_confirmed(&self, children: &[&RollupNode], scope: StatusScope) -> bool {
        !children.is_empty() && children.iter().all(|c| self.is_confirmed_complete(c, scope))
    }
}

fn own_status(item: &Item) -> Option<&str> {
    item.status.as_deref().filter(|s| !s.trim().is_empty())
}
