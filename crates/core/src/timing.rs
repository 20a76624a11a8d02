//! Timing strategies - how an item's own window combines with its children's.

use serde::{Deserialize, Serialize};

use crate::window::DateWindow;

/// One of the five named policies for combining self and children windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimingStrategy {
    /// Own window only
    ParentOnly,
    /// Children's window only
    ChildrenOnly,
    /// Own window when complete, otherwise fill gaps from children
    ParentFirstThenChildren,
    /// Children's window when complete, otherwise fill gaps from own
    ChildrenFirstThenParent,
    /// Earliest start and latest due across both
    WidestRange,
}

/// Result of applying a strategy: the combined window plus whichever input
/// windows the strategy evaluated (attribution panels only show those).
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    /// Combined window
    pub rollup: DateWindow,
    /// Own window, if it was evaluated
    pub self_window: Option<DateWindow>,
    /// Children window, if it was evaluated
    pub children_window: Option<DateWindow>,
}

impl TimingStrategy {
    /// All strategies, in configuration order.
    pub const ALL: [TimingStrategy; 5] = [
        TimingStrategy::ParentOnly,
        TimingStrategy::ChildrenOnly,
        TimingStrategy::ParentFirstThenChildren,
        TimingStrategy::ChildrenFirstThenParent,
        TimingStrategy::WidestRange,
    ];

    /// Name used in persisted configuration.
    pub fn name(&self) -> &'static str {
        match self {
            TimingStrategy::ParentOnly => "parentOnly",
            TimingStrategy::ChildrenOnly => "childrenOnly",
            TimingStrategy::ParentFirstThenChildren => "parentFirstThenChildren",
            TimingStrategy::ChildrenFirstThenParent => "childrenFirstThenParent",
            TimingStrategy::WidestRange => "widestRange",
        }
    }

    /// Look a strategy up by its persisted name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name.trim())
    }

    /// Whether the self provider is invoked.
    ///
    /// `childrenOnly` is the only strategy that skips it. Whether that is
    /// intended upstream is unresolved, so it is kept as-is.
    pub fn evaluates_self(&self) -> bool {
        !matches!(self, TimingStrategy::ChildrenOnly)
    }

    /// Whether the children provider is invoked. Every strategy does,
    /// `parentOnly` included, so the children panel is always populated.
    pub fn evaluates_children(&self) -> bool {
        true
    }

    /// Combine the two windows. Providers are invoked according to
    /// [`evaluates_self`](Self::evaluates_self) and
    /// [`evaluates_children`](Self::evaluates_children), self first.
    pub fn apply<S, C>(&self, self_provider: S, children_provider: C) -> StrategyOutcome
    where
        S: FnOnce() -> DateWindow,
        C: FnOnce() -> DateWindow,
    {
        let self_window = self.evaluates_self().then(self_provider);
        let children_window = self.evaluates_children().then(children_provider);

        let own = self_window.clone().unwrap_or_default();
        let children = children_window.clone().unwrap_or_default();

        let rollup = match self {
            TimingStrategy::ParentOnly => own,
            TimingStrategy::ChildrenOnly => children,
            TimingStrategy::ParentFirstThenChildren => prefer(own, children),
            TimingStrategy::ChildrenFirstThenParent => prefer(children, own),
            TimingStrategy::WidestRange => own.merge(&children),
        };

        StrategyOutcome {
            rollup,
            self_window,
            children_window,
        }
    }
}

impl std::fmt::Display for TimingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// A complete `first` wins verbatim; otherwise each side falls back separately.
fn prefer(first: DateWindow, second: DateWindow) -> DateWindow {
    if first.is_complete() {
        return first;
    }
    let (start, start_from) = if first.start.is_some() {
        (first.start, first.start_from)
    } else {
        (second.start, second.start_from)
    };
    let (due, due_to) = if first.due.is_some() {
        (first.due, first.due_to)
    } else {
        (second.due, second.due_to)
    };
    DateWindow {
        start,
        due,
        start_from,
        due_to,
    }
}

/// A configured strategy for one hierarchy type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategySetting {
    /// A known strategy
    Named(TimingStrategy),
    /// Missing or unrecognized name, kept verbatim for round-tripping
    Unrecognized(String),
}

impl StrategySetting {
    /// The strategy to run; unrecognized settings run `parentOnly`.
    pub fn strategy(&self) -> TimingStrategy {
        match self {
            StrategySetting::Named(s) => *s,
            StrategySetting::Unrecognized(_) => TimingStrategy::ParentOnly,
        }
    }

    fn raw_name(&self) -> &str {
        match self {
            StrategySetting::Named(s) => s.name(),
            StrategySetting::Unrecognized(raw) => raw,
        }
    }
}

/// Mapping from hierarchy type name to strategy.
///
/// Persisted as comma separated `type:strategyName` pairs, e.g.
/// `Initiative:childrenOnly,Epic:widestRange`. Parsing never fails;
/// formatting reproduces the parsed pairs in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TimingAssignment {
    entries: Vec<(String, StrategySetting)>,
}

impl TimingAssignment {
    /// Create an empty assignment (every type defaults to `widestRange`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a strategy to a type, replacing any earlier assignment.
    pub fn with(mut self, item_type: impl Into<String>, strategy: TimingStrategy) -> Self {
        let item_type = item_type.into();
        self.entries.retain(|(t, _)| !t.eq_ignore_ascii_case(&item_type));
        self.entries.push((item_type, StrategySetting::Named(strategy)));
        self
    }

    /// Setting for a type, if one was configured.
    pub fn get(&self, item_type: &str) -> Option<&StrategySetting> {
        self.entries
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(item_type))
            .map(|(_, s)| s)
    }

    /// Configured pairs in order.
    pub fn entries(&self) -> &[(String, StrategySetting)] {
        &self.entries
    }

    /// Type names whose strategy name was missing or unrecognized.
    pub fn unrecognized(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, s)| matches!(s, StrategySetting::Unrecognized(_)))
            .map(|(t, _)| t.as_str())
            .collect()
    }
}

impl std::str::FromStr for TimingAssignment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (item_type, name) = pair.split_once(':').unwrap_or((pair, ""));
                let setting = match TimingStrategy::from_name(name) {
                    Some(strategy) => StrategySetting::Named(strategy),
                    None => StrategySetting::Unrecognized(name.trim().to_string()),
                };
                (item_type.trim().to_string(), setting)
            })
            .collect();
        Ok(Self { entries })
    }
}

impl std::fmt::Display for TimingAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self
            .entries
            .iter()
            .map(|(t, s)| format!("{}:{}", t, s.raw_name()))
            .collect();
        f.write_str(&pairs.join(","))
    }
}

impl From<String> for TimingAssignment {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(assignment) => assignment,
            Err(never) => match never {},
        }
    }
}

impl From<TimingAssignment> for String {
    fn from(a: TimingAssignment) -> Self {
        a.to_string()
    }
}
