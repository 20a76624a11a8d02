//! Item snapshot loading for the timeline engine.
//!
//! This crate provides a trait-based item source with a JSON file
//! implementation. The engine itself never performs I/O; callers load a
//! frozen item set here and hand it over.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;

pub use trait_::{ItemSource, StorageError, Result};
pub use json_storage::{read_json, JsonItemSource};
