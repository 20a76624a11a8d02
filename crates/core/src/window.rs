//! Date windows and their provenance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::key::ItemKey;

/// Where a start or due value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Source {
    /// A field on an item
    Item { key: ItemKey },
    /// A sprint boundary
    Sprint { name: String },
}

/// Attribution for one side of a [`DateWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Human readable description ("start date", "due date", ...)
    pub message: String,

    /// What supplied the value
    pub reference: Source,
}

impl Provenance {
    /// Provenance pointing at an item field.
    pub fn item(message: impl Into<String>, key: &ItemKey) -> Self {
        Self {
            message: message.into(),
            reference: Source::Item { key: key.clone() },
        }
    }

    /// Provenance pointing at a sprint.
    pub fn sprint(message: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reference: Source::Sprint { name: name.into() },
        }
    }
}

/// A start/due pair where either side may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    /// Start date
    pub start: Option<NaiveDate>,

    /// Due date
    pub due: Option<NaiveDate>,

    /// Provenance of `start`
    pub start_from: Option<Provenance>,

    /// Provenance of `due`
    pub due_to: Option<Provenance>,
}

impl DateWindow {
    /// A window with neither side known.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the start side.
    pub fn with_start(mut self, start: NaiveDate, from: Provenance) -> Self {
        self.start = Some(start);
        self.start_from = Some(from);
        self
    }

    /// Set the due side.
    pub fn with_due(mut self, due: NaiveDate, to: Provenance) -> Self {
        self.due = Some(due);
        self.due_to = Some(to);
        self
    }

    /// Both sides are known.
    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.due.is_some()
    }

    /// Neither side is known.
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.due.is_none()
    }

    /// Earliest-start / latest-due merge. Each side keeps the provenance of
    /// the window that supplied it; on ties `self` wins. Missing sides never
    /// take part in the comparison.
    pub fn merge(&self, other: &DateWindow) -> DateWindow {
        let (start, start_from) = match (self.start, other.start) {
            (Some(a), Some(b)) if b < a => (other.start, other.start_from.clone()),
            (Some(_), _) => (self.start, self.start_from.clone()),
            (None, _) => (other.start, other.start_from.clone()),
        };
        let (due, due_to) = match (self.due, other.due) {
            (Some(a), Some(b)) if b > a => (other.due, other.due_to.clone()),
            (Some(_), _) => (self.due, self.due_to.clone()),
            (None, _) => (other.due, other.due_to.clone()),
        };
        DateWindow {
            start,
            due,
            start_from,
            due_to,
        }
    }

    /// Merge any number of windows; an empty input yields an empty window.
    pub fn merge_all<'a>(windows: impl IntoIterator<Item = &'a DateWindow>) -> DateWindow {
        windows
            .into_iter()
            .fold(DateWindow::empty(), |acc, w| acc.merge(w))
    }
}
