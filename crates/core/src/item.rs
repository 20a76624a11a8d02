//! Item model - the unit of work fed into a rollup pass.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::date::{lenient_date, lenient_timestamp};
use crate::key::ItemKey;
use crate::Time;

/// A work item (release, initiative, epic, story...) linked to its parent.
///
/// This is the schema the engine owns; upstream records are mapped onto it
/// before a pass starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique key
    pub key: ItemKey,

    /// Parent key; unresolvable parents make this item a root
    #[serde(default)]
    pub parent_key: Option<ItemKey>,

    /// Hierarchy type name (e.g. "Epic")
    #[serde(rename = "type")]
    pub item_type: String,

    /// Hierarchy level as reported upstream
    #[serde(default)]
    pub hierarchy_level: Option<i32>,

    /// Summary text
    #[serde(default)]
    pub summary: String,

    /// Own start date
    #[serde(default, with = "lenient_date")]
    pub start_date: Option<NaiveDate>,

    /// Own due date
    #[serde(default, with = "lenient_date")]
    pub due_date: Option<NaiveDate>,

    /// Story point estimate
    #[serde(default)]
    pub story_points: Option<f64>,

    /// Median story point estimate
    #[serde(default)]
    pub story_points_median: Option<f64>,

    /// Estimate confidence (0-100)
    #[serde(default)]
    pub confidence: Option<f64>,

    /// Sprint memberships
    #[serde(default)]
    pub sprints: Vec<Sprint>,

    /// Labels
    #[serde(default)]
    pub labels: Vec<String>,

    /// Workflow status; `None` for items with no native status (releases)
    #[serde(default)]
    pub status: Option<String>,

    /// Workflow status category
    #[serde(default)]
    pub status_category: Option<String>,

    /// Owning team
    #[serde(default)]
    pub team: Team,

    /// When the item was created
    #[serde(default, with = "lenient_timestamp")]
    pub created: Option<Time>,

    /// Field change log
    #[serde(default)]
    pub change_history: Vec<ChangeEntry>,
}

impl Item {
    /// Create a bare item of the given type.
    pub fn new(key: impl Into<ItemKey>, item_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            parent_key: None,
            item_type: item_type.into(),
            hierarchy_level: None,
            summary: String::new(),
            start_date: None,
            due_date: None,
            story_points: None,
            story_points_median: None,
            confidence: None,
            sprints: Vec::new(),
            labels: Vec::new(),
            status: None,
            status_category: None,
            team: Team::default(),
            created: None,
            change_history: Vec::new(),
        }
    }

    /// Set the parent key.
    pub fn with_parent(mut self, parent: impl Into<ItemKey>) -> Self {
        self.parent_key = Some(parent.into());
        self
    }

    /// Set the own start and due dates.
    pub fn with_dates(mut self, start: Option<NaiveDate>, due: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.due_date = due;
        self
    }

    /// Set the workflow status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Add a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Add a sprint membership.
    pub fn with_sprint(mut self, sprint: Sprint) -> Self {
        self.sprints.push(sprint);
        self
    }

    /// Set story points, median and confidence.
    pub fn with_estimate(mut self, points: Option<f64>, median: Option<f64>, confidence: Option<f64>) -> Self {
        self.story_points = points;
        self.story_points_median = median;
        self.confidence = confidence;
        self
    }

    /// Set the owning team.
    pub fn with_team(mut self, team: Team) -> Self {
        self.team = team;
        self
    }

    /// Set the creation timestamp.
    pub fn with_created(mut self, created: Time) -> Self {
        self.created = Some(created);
        self
    }

    /// Append a change log entry.
    pub fn with_change(mut self, entry: ChangeEntry) -> Self {
        self.change_history.push(entry);
        self
    }

    /// Whether the item carries a workflow status of its own.
    pub fn has_native_status(&self) -> bool {
        self.status.is_some()
    }
}

/// A sprint (iteration) an item was scheduled into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    /// Sprint name
    #[serde(default)]
    pub name: String,

    /// First day
    #[serde(default, with = "lenient_date")]
    pub start_date: Option<NaiveDate>,

    /// Last day
    #[serde(default, with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
}

impl Sprint {
    /// Create a sprint.
    pub fn new(name: impl Into<String>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            start_date: start,
            end_date: end,
        }
    }
}

/// Team capacity figures used for estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Team {
    /// Points completed per sprint
    pub velocity: f64,

    /// Working days per sprint
    pub days_per_sprint: f64,

    /// Number of items the team works in parallel
    pub parallel_work_limit: f64,

    /// Explicit throughput override; derived when absent
    pub points_per_day_per_track: Option<f64>,
}

impl Team {
    /// Points one track completes in a day.
    pub fn points_per_day_per_track(&self) -> f64 {
        match self.points_per_day_per_track {
            Some(p) if p > 0.0 => p,
            _ => self.velocity / self.days_per_sprint / self.parallel_work_limit,
        }
    }
}

impl Default for Team {
    fn default() -> Self {
        Self {
            velocity: 21.0,
            days_per_sprint: 10.0,
            parallel_work_limit: 1.0,
            points_per_day_per_track: None,
        }
    }
}

/// One entry in an item's change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    /// When the change happened; `None` if missing or unreadable
    #[serde(default, with = "lenient_timestamp")]
    pub timestamp: Option<Time>,

    /// Changed fields; `None` if missing or not a list
    #[serde(default, deserialize_with = "lenient_changes")]
    pub field_changes: Option<Vec<FieldChange>>,
}

impl ChangeEntry {
    /// Create an entry with the given changes.
    pub fn new(timestamp: Time, field_changes: Vec<FieldChange>) -> Self {
        Self {
            timestamp: Some(timestamp),
            field_changes: Some(field_changes),
        }
    }
}

/// A single field transition within a change entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field display name
    pub field: String,

    /// Value before the change
    #[serde(default)]
    pub from: Option<String>,

    /// Value after the change
    #[serde(default)]
    pub to: Option<String>,
}

impl FieldChange {
    /// Create a field change.
    pub fn new(field: impl Into<String>, from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            field: field.into(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }
    }
}

// Drops individual malformed changes instead of failing the item.
fn lenient_changes<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<FieldChange>>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match raw {
        Some(serde_json::Value::Array(values)) => Some(
            values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
        ),
        _ => None,
    })
}
