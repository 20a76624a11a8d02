//! Timeline core data models.
//!
//! This crate defines the item schema, date windows and timing strategies
//! shared by the rollup and status engines.

#![warn(missing_docs)]

// Identity
mod key;

// Items and their dates
pub mod date;
mod item;
mod window;

// Aggregation policy
mod timing;

mod error;

// Re-exports
pub use key::ItemKey;
pub use item::{ChangeEntry, FieldChange, Item, Sprint, Team};
pub use window::{DateWindow, Provenance, Source};
pub use timing::{StrategyOutcome, StrategySetting, TimingAssignment, TimingStrategy};
pub use error::{ConsistencyError, Result};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
