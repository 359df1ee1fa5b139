//! Compaction boundaries and the context windows they delimit.
//!
//! `boundary` finds the entities that record a completed compaction,
//! `window` tiles the timeline between them, and `classify` maps bare
//! timestamps back onto the same window numbering.

pub mod boundary;
pub mod classify;
pub mod window;

use thiserror::Error;

pub use boundary::{summary_hash, BoundaryConfig, BoundaryDetector, BoundaryReport, BoundaryScan};
pub use classify::{UnresolvedReason, WindowAssignment, WindowClassifier};
pub use window::{build_windows, Window};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("boundary at entity {entity_index} is outside a timeline of {entity_count} entities")]
    BoundaryOutOfRange {
        entity_index: usize,
        entity_count: usize,
    },
    #[error("boundaries must be strictly increasing, got {next} after {previous}")]
    UnorderedBoundaries { previous: usize, next: usize },
}
