//! Point-in-time reconstruction of items from their change history.
//!
//! The reconstructed set is an independent value: rolling it up produces a
//! prior tree that can sit next to the current one for comparison.

use timeline_core::date::parse_date;
use timeline_core::{Item, Time};
use tracing::debug;

/// Fields the status engine needs as of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedField {
    /// Workflow status
    Status,
    /// Start date
    StartDate,
    /// Due date
    DueDate,
}

impl TrackedField {
    /// Whether a change log field name refers to this field.
    pub fn matches(&self, field: &str) -> bool {
        let field = field.trim();
        let names: &[&str] = match self {
            TrackedField::Status => &["status"],
            TrackedField::StartDate => &["start date", "startdate"],
            TrackedField::DueDate => &["due date", "duedate"],
        };
        names.iter().any(|n| n.eq_ignore_ascii_case(field))
    }

    fn current_value(&self, item: &Item) -> Option<String> {
        match self {
            TrackedField::Status => item.status.clone(),
            TrackedField::StartDate => item.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            TrackedField::DueDate => item.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Value of `field` as it was at `checkpoint`.
///
/// The earliest change to the field made after the checkpoint holds the
/// value that was in effect at the checkpoint in its `from`. Without such a
/// change the current value already applied. Entries without a timestamp or
/// a change list are skipped.
pub fn reconstruct_field(item: &Item, field: TrackedField, checkpoint: Time) -> Option<String> {
    let mut earliest: Option<(Time, Option<&str>)> = None;
    for entry in &item.change_history {
        let (Some(timestamp), Some(changes)) = (entry.timestamp, entry.field_changes.as_ref()) else {
            debug!("Skipping malformed change entry on {}", item.key);
            continue;
        };
        if timestamp <= checkpoint {
            continue;
        }
        let Some(change) = changes.iter().find(|c| field.matches(&c.field)) else {
            continue;
        };
        if earliest.map_or(true, |(t, _)| timestamp < t) {
            earliest = Some((timestamp, change.from.as_deref()));
        }
    }

    match earliest {
        Some((_, from)) => from.map(str::to_string),
        None => field.current_value(item),
    }
}

/// A copy of `item` with status, start and due date as of `checkpoint`.
pub fn reconstruct_item(item: &Item, checkpoint: Time) -> Item {
    let status = reconstruct_field(item, TrackedField::Status, checkpoint)
        .filter(|s| !s.trim().is_empty());
    let start = reconstruct_field(item, TrackedField::StartDate, checkpoint);
    let due = reconstruct_field(item, TrackedField::DueDate, checkpoint);

    let mut past = item.clone();
    // Rollback never adds or removes a native status, only changes its value.
    if let (Some(current), Some(status)) = (past.status.as_mut(), status) {
        *current = status;
    }
    past.start_date = start.as_deref().and_then(parse_date);
    past.due_date = due.as_deref().and_then(parse_date);
    past
}

/// The whole set as of `checkpoint`. Items created after it are dropped.
pub fn rollback_all(items: &[Item], checkpoint: Time) -> Vec<Item> {
    items
        .iter()
        .filter(|item| item.created.map_or(true, |created| created <= checkpoint))
        .map(|item| reconstruct_item(item, checkpoint))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use timeline_core::{ChangeEntry, FieldChange};

    fn at(y: i32, m: u32, d: u32) -> Time {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn epic_with_due_change() -> Item {
        Item::new("E-1", "Epic")
            .with_dates(None, Some(date(2024, 1, 20)))
            .with_change(ChangeEntry::new(
                at(2024, 1, 10),
                vec![FieldChange::new("Due date", Some("2024-01-05"), Some("2024-01-20"))],
            ))
    }

    #[test]
    fn test_checkpoint_before_change_uses_from() {
        let item = epic_with_due_change();
        let past = reconstruct_item(&item, at(2024, 1, 1));
        assert_eq!(past.due_date, Some(date(2024, 1, 5)));
    }

    #[test]
    fn test_checkpoint_after_change_keeps_current() {
        let item = epic_with_due_change();
        let past = reconstruct_item(&item, at(2024, 1, 15));
        assert_eq!(past.due_date, Some(date(2024, 1, 20)));
    }

    #[test]
    fn test_multiple_changes_after_checkpoint() {
        let item = Item::new("S-1", "Story")
            .with_status("Done")
            .with_change(ChangeEntry::new(
                at(2024, 1, 5),
                vec![FieldChange::new("status", Some("To Do"), Some("In Progress"))],
            ))
            .with_change(ChangeEntry::new(
                at(2024, 1, 12),
                vec![FieldChange::new("status", Some("In Progress"), Some("Done"))],
            ));

        assert_eq!(
            reconstruct_field(&item, TrackedField::Status, at(2024, 1, 1)).as_deref(),
            Some("To Do")
        );
        assert_eq!(
            reconstruct_field(&item, TrackedField::Status, at(2024, 1, 8)).as_deref(),
            Some("In Progress")
        );
        assert_eq!(
            reconstruct_field(&item, TrackedField::Status, at(2024, 2, 1)).as_deref(),
            Some("Done")
        );
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let item = epic_with_due_change()
            .with_change(ChangeEntry {
                timestamp: None,
                field_changes: Some(vec![FieldChange::new("duedate", Some("2023-12-01"), None)]),
            })
            .with_change(ChangeEntry {
                timestamp: Some(at(2024, 1, 2)),
                field_changes: None,
            });
        let past = reconstruct_item(&item, at(2024, 1, 1));
        assert_eq!(past.due_date, Some(date(2024, 1, 5)));
    }

    #[test]
    fn test_field_was_empty_at_checkpoint() {
        let item = Item::new("E-1", "Epic")
            .with_dates(Some(date(2024, 1, 8)), None)
            .with_change(ChangeEntry::new(
                at(2024, 1, 3),
                vec![FieldChange::new("Start date", None, Some("2024-01-08"))],
            ));
        let past = reconstruct_item(&item, at(2024, 1, 1));
        assert!(past.start_date.is_none());
        assert_eq!(item.start_date, Some(date(2024, 1, 8)));
    }

    #[test]
    fn test_rollback_drops_items_created_later() {
        let items = vec![
            Item::new("E-1", "Epic").with_created(at(2023, 12, 1)),
            Item::new("E-2", "Epic").with_created(at(2024, 1, 10)),
            Item::new("E-3", "Epic"),
        ];
        let past = rollback_all(&items, at(2024, 1, 1));
        let keys: Vec<_> = past.iter().map(|i| i.key.to_string()).collect();
        assert_eq!(keys, vec!["E-1", "E-3"]);
    }

    #[test]
    fn test_blank_past_status_keeps_current() {
        let item = Item::new("S-1", "Story")
            .with_status("In Progress")
            .with_change(ChangeEntry::new(
                at(2024, 1, 10),
                vec![FieldChange::new("Status", None, Some("In Progress"))],
            ))
            .with_change(ChangeEntry::new(
                at(2024, 1, 12),
                vec![FieldChange::new("Status", Some("  "), Some("In Progress"))],
            ));
        let past = reconstruct_item(&item, at(2024, 1, 1));
        assert_eq!(past.status.as_deref(), Some("In Progress"));
        assert!(past.has_native_status());

        let later = reconstruct_item(&item, at(2024, 1, 11));
        assert_eq!(later.status.as_deref(), Some("In Progress"));
    }

    #[test]
    fn test_release_stays_without_status() {
        let release = Item::new("R-1", "Release").with_change(ChangeEntry::new(
            at(2024, 1, 10),
            vec![FieldChange::new("status", Some("Open"), None)],
        ));
        let past = reconstruct_item(&release, at(2024, 1, 1));
        assert!(past.status.is_none());
    }
}
