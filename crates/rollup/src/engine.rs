//! The rollup engine - aggregates date windows up the item hierarchy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use timeline_core::{
    ConsistencyError, DateWindow, Item, ItemKey, Result, StrategySetting, TimingAssignment,
    TimingStrategy,
};
use tracing::{debug, warn};

use crate::dates;
use crate::work_type::{partition, WorkType};

/// Configuration for the rollup engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupConfig {
    /// Hierarchy type names, outermost first
    pub hierarchy: Vec<String>,
    /// Strategy per type
    pub timing: TimingAssignment,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            hierarchy: ["Release", "Initiative", "Epic", "Story"]
                .into_iter()
                .map(String::from)
                .collect(),
            timing: TimingAssignment::default(),
        }
    }
}

impl RollupConfig {
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
}

/// A validated, frozen item set with its parent -> children index.
#[derive(Debug, Clone)]
pub struct ItemSet {
    items: Vec<Arc<Item>>,
    by_key: HashMap<ItemKey, usize>,
    children: HashMap<ItemKey, Vec<usize>>,
}

impl ItemSet {
    /// Index the items. Keys must be unique.
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let mut by_key = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if by_key.insert(item.key.clone(), idx).is_some() {
                return Err(ConsistencyError::DuplicateKey(item.key.clone()));
            }
        }

        // Parents outside the set leave the item as a root.
        let mut children: HashMap<ItemKey, Vec<usize>> = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            if let Some(parent) = item.parent_key.as_ref().filter(|p| by_key.contains_key(*p)) {
                children.entry(parent.clone()).or_default().push(idx);
            }
        }

        Ok(Self {
            items: items.into_iter().map(Arc::new).collect(),
            by_key,
            children,
        })
    }

    /// All items in input order.
    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    /// Look an item up by key.
    pub fn get(&self, key: &str) -> Option<&Arc<Item>> {
        self.by_key.get(key).map(|&idx| &self.items[idx])
    }

    /// Immediate children of an item, in input order.
    pub fn children_of(&self, key: &ItemKey) -> impl Iterator<Item = &Arc<Item>> {
        self.children
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.items[idx])
    }

    /// Items of a hierarchy type (case-insensitive).
    pub fn of_type<'a>(&'a self, item_type: &'a str) -> impl Iterator<Item = &'a Arc<Item>> {
        self.items
            .iter()
            .filter(move |i| i.item_type.eq_ignore_ascii_case(item_type))
    }

    /// Items whose parent is absent or outside the set.
    pub fn roots(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.items.iter().filter(move |i| {
            i.parent_key
                .as_ref()
                .map_or(true, |p| !self.by_key.contains_key(p))
        })
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Children aggregate of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildrenRollup {
    /// Earliest-start / latest-due merge of the children's rollups
    pub window: DateWindow,
    /// Child nodes
    pub issues: Vec<RollupNode>,
}

/// Immutable result of rolling one item up.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupNode {
    /// The wrapped item
    pub item: Arc<Item>,
    /// Distance from the pass root
    pub depth: usize,
    /// Strategy applied at this node
    pub strategy: TimingStrategy,
    /// Own window; `None` when the strategy did not evaluate it
    pub self_window: Option<DateWindow>,
    /// Children aggregate
    pub children: ChildrenRollup,
    /// Combined window
    pub rollup: DateWindow,
    /// Collapsed window of dev (and design) children
    pub dev: DateWindow,
    /// Collapsed window of qa children
    pub qa: DateWindow,
    /// Collapsed window of uat children
    pub uat: DateWindow,
}

impl RollupNode {
    /// Item key.
    pub fn key(&self) -> &ItemKey {
        &self.item.key
    }

    /// Window for a work type (design maps to dev).
    pub fn work_window(&self, work_type: WorkType) -> &DateWindow {
        match work_type.bucket() {
            WorkType::Qa => &self.qa,
            WorkType::Uat => &self.uat,
            _ => &self.dev,
        }
    }

    /// Child nodes whose work type falls in the given bucket.
    pub fn children_of_type(&self, work_type: WorkType) -> Vec<&RollupNode> {
        partition(&self.children.issues, |n| &*n.item)
            .bucket(work_type)
            .to_vec()
    }

    /// Visit this node and every descendant, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a RollupNode)) {
        visit(self);
        for child in &self.children.issues {
            child.walk(visit);
        }
    }
}

/// The nodes produced by one pass, addressable by key.
#[derive(Debug, Clone, Default)]
pub struct RollupForest {
    roots: Vec<RollupNode>,
    index: HashMap<ItemKey, Vec<usize>>,
}

impl RollupForest {
    fn new(roots: Vec<RollupNode>) -> Self {
        // Roots take precedence over nested occurrences of the same key.
        let mut index: HashMap<ItemKey, Vec<usize>> = roots
            .iter()
            .enumerate()
            .map(|(i, root)| (root.key().clone(), vec![i]))
            .collect();
        for (i, root) in roots.iter().enumerate() {
            index_node(root, vec![i], &mut index);
        }
        Self { roots, index }
    }

    /// Root nodes (one per item of the reporting type).
    pub fn roots(&self) -> &[RollupNode] {
        &self.roots
    }

    /// Any node in the forest by key; the first occurrence wins.
    pub fn get(&self, key: &str) -> Option<&RollupNode> {
        let path = self.index.get(key)?;
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.roots.get(*first)?, |node, &i| node.children.issues.get(i))
    }

    /// Number of distinct keys in the forest.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the forest is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn index_node(node: &RollupNode, path: Vec<usize>, index: &mut HashMap<ItemKey, Vec<usize>>) {
    for (i, child) in node.children.issues.iter().enumerate() {
        let mut child_path = path.clone();
        child_path.push(i);
        index_node(child, child_path, index);
    }
    index.entry(node.key().clone()).or_insert(path);
}

/// Rolls items up their hierarchy.
///
/// Every call is a full pass; nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct RollupEngine {
    config: RollupConfig,
}

impl RollupEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: RollupConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Strategy for each depth below `reporting_type`.
    ///
    /// Unassigned types use `widestRange`. The deepest level is always
    /// `parentOnly`, and so is every level at or below an unrecognized
    /// strategy name.
    pub fn strategies_for(&self, reporting_type: &str) -> Result<Vec<TimingStrategy>> {
        if self.config.hierarchy.is_empty() {
            return Err(ConsistencyError::EmptyHierarchy);
        }
        let position = self
            .config
            .hierarchy
            .iter()
            .position(|t| t.eq_ignore_ascii_case(reporting_type))
            .ok_or_else(|| ConsistencyError::UnknownType(reporting_type.to_string()))?;

        let levels = &self.config.hierarchy[position..];
        let mut fallen_back = false;
        let mut strategies: Vec<TimingStrategy> = levels
            .iter()
            .map(|item_type| {
                if fallen_back {
                    return TimingStrategy::ParentOnly;
                }
                match self.config.timing.get(item_type) {
                    Some(StrategySetting::Named(strategy)) => *strategy,
                    Some(StrategySetting::Unrecognized(name)) => {
                        warn!(
                            "Unrecognized timing strategy '{}' for {}; using parentOnly from here down",
                            name, item_type
                        );
                        fallen_back = true;
                        TimingStrategy::ParentOnly
                    }
                    None => TimingStrategy::WidestRange,
                }
            })
            .collect();

        if let Some(last) = strategies.last_mut() {
            *last = TimingStrategy::ParentOnly;
        }
        Ok(strategies)
    }

    /// Roll one item up, treating it as depth 0.
    pub fn rollup(
        &self,
        item: &Arc<Item>,
        items: &ItemSet,
        strategy_by_depth: &[TimingStrategy],
    ) -> RollupNode {
        let mut path = HashSet::new();
        self.rollup_at(item, items, strategy_by_depth, 0, &mut path)
    }

    fn rollup_at(
        &self,
        item: &Arc<Item>,
        items: &ItemSet,
        strategy_by_depth: &[TimingStrategy],
        depth: usize,
        path: &mut HashSet<ItemKey>,
    ) -> RollupNode {
        let strategy = strategy_by_depth
            .get(depth)
            .copied()
            .unwrap_or(TimingStrategy::ParentOnly);

        // Depth is capped at the hierarchy length; cyclic parent links stop here.
        let max_depth = self.config.hierarchy.len().max(1);
        let mut issues = Vec::new();
        if depth + 1 < max_depth {
            path.insert(item.key.clone());
            for child in items.children_of(&item.key) {
                if path.contains(&child.key) {
                    debug!("Skipping cyclic parent link {} -> {}", item.key, child.key);
                    continue;
                }
                issues.push(self.rollup_at(child, items, strategy_by_depth, depth + 1, path));
            }
            path.remove(&item.key);
        }

        let children_window = Self::collapse(issues.iter().map(|n| &n.rollup));
        let outcome = strategy.apply(
            || dates::from_fields_or_sprints(item),
            || children_window.clone(),
        );

        let parts = partition(&issues, |n| &*n.item);
        let dev = Self::collapse(parts.dev_work.iter().map(|n| &n.rollup));
        let qa = Self::collapse(parts.qa_work.iter().map(|n| &n.rollup));
        let uat = Self::collapse(parts.uat_work.iter().map(|n| &n.rollup));

        RollupNode {
            item: Arc::clone(item),
            depth,
            strategy,
            self_window: outcome.self_window,
            children: ChildrenRollup {
                window: children_window,
                issues,
            },
            rollup: outcome.rollup,
            dev,
            qa,
            uat,
        }
    }

    /// Roll up every item of `reporting_type`.
    pub fn rollup_all(&self, items: &ItemSet, reporting_type: &str) -> Result<RollupForest> {
        let strategies = self.strategies_for(reporting_type)?;
        debug!(
            "Rolling up {} of {} items with strategies {:?}",
            reporting_type,
            items.len(),
            strategies
        );

        let roots = items
            .of_type(reporting_type)
            .map(|item| self.rollup(item, items, &strategies))
            .collect();
        Ok(RollupForest::new(roots))
    }

    /// Reduce any number of windows to one earliest-start / latest-due window.
    pub fn collapse<'a>(windows: impl IntoIterator<Item = &'a DateWindow>) -> DateWindow {
        DateWindow::merge_all(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use timeline_core::{Source, TimingAssignment};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn epic(key: &str, parent: &str, start: NaiveDate, due: NaiveDate) -> Item {
        Item::new(key, "Epic")
            .with_parent(parent)
            .with_dates(Some(start), Some(due))
    }

    fn engine(timing: &str) -> RollupEngine {
        RollupEngine::new(RollupConfig::default().with_timing(timing.parse().unwrap()))
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let items = vec![Item::new("A", "Epic"), Item::new("A", "Story")];
        assert_eq!(
            ItemSet::new(items).unwrap_err(),
            ConsistencyError::DuplicateKey(ItemKey::new("A"))
        );
    }

    #[test]
    fn test_unresolvable_parent_is_root() {
        let set = ItemSet::new(vec![
            Item::new("E-1", "Epic").with_parent("MISSING"),
            Item::new("S-1", "Story").with_parent("E-1"),
        ])
        .unwrap();
        let roots: Vec<_> = set.roots().map(|i| i.key.to_string()).collect();
        assert_eq!(roots, vec!["E-1"]);
        assert_eq!(set.children_of(&ItemKey::new("E-1")).count(), 1);
    }

    #[test]
    fn test_strategies_default_and_terminal() {
        let strategies = engine("").strategies_for("Initiative").unwrap();
        assert_eq!(
            strategies,
            vec![
                TimingStrategy::WidestRange,
                TimingStrategy::WidestRange,
                TimingStrategy::ParentOnly
            ]
        );
    }

    #[test]
    fn test_strategies_unrecognized_falls_back_below() {
        let strategies = engine("Release:childrenOnly,Initiative:bogus,Epic:widestRange")
            .strategies_for("Release")
            .unwrap();
        assert_eq!(
            strategies,
            vec![
                TimingStrategy::ChildrenOnly,
                TimingStrategy::ParentOnly,
                TimingStrategy::ParentOnly,
                TimingStrategy::ParentOnly
            ]
        );
    }

    #[test]
    fn test_strategies_unknown_reporting_type() {
        assert_eq!(
            engine("").strategies_for("Saga").unwrap_err(),
            ConsistencyError::UnknownType("Saga".into())
        );
    }

    #[test]
    fn test_children_only_initiative() {
        let set = ItemSet::new(vec![
            Item::new("I-1", "Initiative"),
            epic("E-1", "I-1", d(2024, 1, 15), d(2024, 3, 1)),
            epic("E-2", "I-1", d(2024, 2, 1), d(2024, 4, 1)),
        ])
        .unwrap();
        let forest = engine("Initiative:childrenOnly")
            .rollup_all(&set, "Initiative")
            .unwrap();

        let node = forest.get("I-1").unwrap();
        assert_eq!(node.rollup.due, Some(d(2024, 4, 1)));
        assert_eq!(node.rollup.start, Some(d(2024, 1, 15)));
        assert!(node.self_window.is_none());
        assert_eq!(
            node.rollup.due_to.as_ref().unwrap().reference,
            Source::Item { key: ItemKey::new("E-2") }
        );
    }

    #[test]
    fn test_widest_range_initiative_extends_due() {
        let set = ItemSet::new(vec![
            Item::new("I-1", "Initiative").with_dates(Some(d(2024, 1, 1)), Some(d(2024, 2, 1))),
            epic("E-1", "I-1", d(2024, 1, 15), d(2024, 4, 1)),
        ])
        .unwrap();
        let forest = engine("").rollup_all(&set, "Initiative").unwrap();

        let node = forest.get("I-1").unwrap();
        assert_eq!(node.rollup.due, Some(d(2024, 4, 1)));
        assert_eq!(node.rollup.start, Some(d(2024, 1, 1)));
        assert_eq!(node.self_window.as_ref().unwrap().due, Some(d(2024, 2, 1)));
    }

    #[test]
    fn test_children_window_is_merge_of_child_rollups() {
        let set = ItemSet::new(vec![
            Item::new("I-1", "Initiative"),
            Item::new("E-1", "Epic").with_parent("I-1"),
            Item::new("S-1", "Story")
                .with_parent("E-1")
                .with_dates(Some(d(2024, 1, 8)), Some(d(2024, 1, 19))),
            Item::new("S-2", "Story")
                .with_parent("E-1")
                .with_summary("QA: verify")
                .with_dates(Some(d(2024, 1, 22)), Some(d(2024, 1, 26))),
        ])
        .unwrap();
        let forest = engine("").rollup_all(&set, "Initiative").unwrap();

        let epic = forest.get("E-1").unwrap();
        assert_eq!(epic.children.window.start, Some(d(2024, 1, 8)));
        assert_eq!(epic.children.window.due, Some(d(2024, 1, 26)));
        assert_eq!(epic.dev.due, Some(d(2024, 1, 19)));
        assert_eq!(epic.qa.start, Some(d(2024, 1, 22)));
        assert!(epic.uat.is_empty());

        let initiative = forest.get("I-1").unwrap();
        assert_eq!(initiative.children.window, epic.rollup);
        assert_eq!(forest.len(), 4);
    }

    #[test]
    fn test_parent_only_at_terminal_level() {
        let set = ItemSet::new(vec![
            Item::new("S-1", "Story").with_dates(None, Some(d(2024, 1, 10))),
            Item::new("T-1", "Story")
                .with_parent("S-1")
                .with_dates(Some(d(2024, 1, 1)), Some(d(2024, 3, 1))),
        ])
        .unwrap();
        let forest = engine("").rollup_all(&set, "Story").unwrap();

        let story = forest.get("S-1").unwrap();
        assert_eq!(story.strategy, TimingStrategy::ParentOnly);
        assert_eq!(story.rollup.start, None);
        assert_eq!(story.rollup.due, Some(d(2024, 1, 10)));
    }

    #[test]
    fn test_cyclic_parents_terminate() {
        let set = ItemSet::new(vec![
            Item::new("A", "Initiative").with_parent("B"),
            Item::new("B", "Initiative").with_parent("A"),
        ])
        .unwrap();
        let forest = engine("").rollup_all(&set, "Initiative").unwrap();
        assert_eq!(forest.roots().len(), 2);

        let a = &forest.roots()[0];
        let mut depth = 0;
        a.walk(&mut |n| depth = depth.max(n.depth));
        assert!(depth < 4);
    }

    #[test]
    fn test_input_items_untouched() {
        let items = vec![
            Item::new("I-1", "Initiative"),
            epic("E-1", "I-1", d(2024, 1, 15), d(2024, 3, 1)),
        ];
        let set = ItemSet::new(items.clone()).unwrap();
        let first = engine("").rollup_all(&set, "Initiative").unwrap();
        let second = engine("").rollup_all(&set, "Initiative").unwrap();

        assert_eq!(set.items()[0].as_ref(), &items[0]);
        assert_eq!(first.roots(), second.roots());
    }

    #[test]
    fn test_collapse_across_releases() {
        let windows = vec![
            DateWindow::empty().with_due(d(2024, 5, 1), timeline_core::Provenance::item("due date", &ItemKey::new("R-1"))),
            DateWindow::empty().with_start(d(2024, 1, 1), timeline_core::Provenance::item("start date", &ItemKey::new("R-2"))),
        ];
        let calendar = RollupEngine::collapse(&windows);
        assert_eq!(calendar.start, Some(d(2024, 1, 1)));
        assert_eq!(calendar.due, Some(d(2024, 5, 1)));
    }

    #[test]
    fn test_unused_assignment_type_is_ignored() {
        let assignment = TimingAssignment::new().with("Theme", TimingStrategy::ChildrenOnly);
        let engine = RollupEngine::new(RollupConfig::default().with_timing(assignment));
        assert_eq!(
            engine.strategies_for("Epic").unwrap(),
            vec![TimingStrategy::WidestRange, TimingStrategy::ParentOnly]
        );
    }
}
