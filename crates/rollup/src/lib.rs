//! Rollup layer - date resolution, work type classification, hierarchy
//! aggregation and point-in-time reconstruction.

#![warn(missing_docs)]

pub mod dates;
pub mod work_type;
pub mod engine;
pub mod snapshot;

pub use work_type::{classify, partition, WorkPartition, WorkType};
pub use engine::{ChildrenRollup, ItemSet, RollupConfig, RollupEngine, RollupForest, RollupNode};
pub use snapshot::{reconstruct_field, reconstruct_item, rollback_all, TrackedField};
