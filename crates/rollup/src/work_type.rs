//! Work type classification (dev / qa / uat / design).

use serde::{Deserialize, Serialize};
use timeline_core::Item;

/// Sub-classification of work used for breakdown reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    /// Development
    Dev,
    /// Quality assurance
    Qa,
    /// User acceptance testing
    Uat,
    /// Design; reported together with dev
    Design,
}

impl WorkType {
    /// Every known work type.
    pub const ALL: [WorkType; 4] = [WorkType::Dev, WorkType::Qa, WorkType::Uat, WorkType::Design];

    /// Convention name used in summaries and labels.
    pub fn name(&self) -> &'static str {
        match self {
            WorkType::Dev => "dev",
            WorkType::Qa => "qa",
            WorkType::Uat => "uat",
            WorkType::Design => "design",
        }
    }

    /// Case-insensitive lookup by convention name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|w| w.name().eq_ignore_ascii_case(name))
    }

    /// Reporting bucket this type lands in.
    pub fn bucket(&self) -> WorkType {
        match self {
            WorkType::Design => WorkType::Dev,
            other => *other,
        }
    }
}

impl std::fmt::Display for WorkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify an item: a `"<type>:"` summary prefix first, then a label equal
/// to a work type name, then dev.
pub fn classify(item: &Item) -> WorkType {
    if let Some(work_type) = item
        .summary
        .split_once(':')
        .and_then(|(prefix, _)| WorkType::from_name(prefix))
    {
        return work_type;
    }
    item.labels
        .iter()
        .find_map(|label| WorkType::from_name(label))
        .unwrap_or(WorkType::Dev)
}

/// Children split into disjoint reporting buckets.
#[derive(Debug)]
pub struct WorkPartition<'a, T> {
    /// Dev and design work
    pub dev_work: Vec<&'a T>,
    /// QA work
    pub qa_work: Vec<&'a T>,
    /// UAT work
    pub uat_work: Vec<&'a T>,
}

impl<'a, T> WorkPartition<'a, T> {
    /// Bucket for a work type (design maps to dev).
    pub fn bucket(&self, work_type: WorkType) -> &[&'a T] {
        match work_type.bucket() {
            WorkType::Qa => &self.qa_work,
            WorkType::Uat => &self.uat_work,
            _ => &self.dev_work,
        }
    }
}

/// Partition children by [`classify`], using `item_of` to reach each child's item.
pub fn partition<'a, T>(children: &'a [T], item_of: impl Fn(&T) -> &Item) -> WorkPartition<'a, T> {
    let mut parts = WorkPartition {
        dev_work: Vec::new(),
        qa_work: Vec::new(),
        uat_work: Vec::new(),
    };
    for child in children {
        match classify(item_of(child)).bucket() {
            WorkType::Qa => parts.qa_work.push(child),
            WorkType::Uat => parts.uat_work.push(child),
            _ => parts.dev_work.push(child),
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prefix_wins_over_label() {
        let item = Item::new("S-1", "Story")
            .with_summary("QA: regression pass")
            .with_label("uat");
        assert_eq!(classify(&item), WorkType::Qa);
    }

    #[test]
    fn test_label_exact_match() {
        let item = Item::new("S-1", "Story").with_label("frontend").with_label("UAT");
        assert_eq!(classify(&item), WorkType::Uat);

        let near_miss = Item::new("S-2", "Story").with_label("qa-ready");
        assert_eq!(classify(&near_miss), WorkType::Dev);
    }

    #[test]
    fn test_unrelated_prefix_defaults_to_dev() {
        let item = Item::new("S-1", "Story").with_summary("Login: add SSO");
        assert_eq!(classify(&item), WorkType::Dev);
    }

    fn keys(v: &[&Item]) -> Vec<String> {
        v.iter().map(|i| i.key.to_string()).collect()
    }

    #[test]
    fn test_partition_folds_design_into_dev() {
        let children = vec![
            Item::new("S-1", "Story").with_summary("design: mockups"),
            Item::new("S-2", "Story").with_summary("qa: test plan"),
            Item::new("S-3", "Story"),
            Item::new("S-4", "Story").with_label("uat"),
        ];
        let parts = partition(&children, |i| i);

        assert_eq!(keys(&parts.dev_work), vec!["S-1", "S-3"]);
        assert_eq!(keys(&parts.qa_work), vec!["S-2"]);
        assert_eq!(keys(&parts.uat_work), vec!["S-4"]);
        assert_eq!(parts.bucket(WorkType::Design).len(), 2);
    }
}
