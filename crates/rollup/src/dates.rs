//! Date window resolution for a single item.
//!
//! Resolution never fails: absent or unreadable dates leave that side of the
//! window empty.

use timeline_core::{DateWindow, Item, Provenance};

/// Window from the item's own start and due fields.
pub fn from_own_fields(item: &Item) -> DateWindow {
    let mut window = DateWindow::empty();
    if let Some(start) = item.start_date {
        window = window.with_start(start, Provenance::item("start date", &item.key));
    }
    if let Some(due) = item.due_date {
        window = window.with_due(due, Provenance::item("due date", &item.key));
    }
    window
}

/// Window spanned by the item's sprints.
///
/// Only sprints with both boundaries contribute. The earliest start and the
/// latest end are picked independently, so the two sides may come from
/// different sprints.
pub fn from_sprints(item: &Item) -> DateWindow {
    let candidates: Vec<DateWindow> = item
        .sprints
        .iter()
        .filter_map(|sprint| {
            let (start, end) = (sprint.start_date?, sprint.end_date?);
            Some(
                DateWindow::empty()
                    .with_start(start, Provenance::sprint("start of sprint", &sprint.name))
                    .with_due(end, Provenance::sprint("end of sprint", &sprint.name)),
            )
        })
        .collect();
    DateWindow::merge_all(&candidates)
}

/// Own fields and sprints combined with the earliest-start / latest-due rule.
pub fn from_fields_or_sprints(item: &Item) -> DateWindow {
    from_own_fields(item).merge(&from_sprints(item))
}
