//! Status and progress reporting (Layer 3)
//!
//! Estimation, status derivation, progress and report assembly on top of
//! rollup passes.

#![warn(missing_docs)]

pub mod estimator;
pub mod progress;
pub mod report;
pub mod status;

pub use estimator::{
    business_days, completed_days_of_work, deterministic_extra_points, is_confidence_valid,
    is_points_valid, points_to_days, EstimationConfig, EstimationEngine,
};
pub use progress::{Progress, ProgressRollup};
pub use report::{Report, ReportBuilder, ReportConfig, ReportRow, ScopedStatus};
pub use status::{timed_status, Status, StatusConfig, StatusEngine, StatusResult, StatusScope};
