//! Domain types for hnbrief.
//!
//! This module contains the core data structures:
//! - Story: listed items and their enrichment state
//! - Events: Immutable records of job state changes
//! - Job: Job state, phases and snapshots

pub mod events;
pub mod job;
pub mod story;

// Re-export commonly used types
pub use events::{JobEvent, JobEventKind, SummarySource};
pub use job::{JobPhase, JobSnapshot, JobState, ResetPolicy};
pub use story::{RawStory, Story, SUMMARY_NOT_AVAILABLE, SUMMARY_SCRAPE_FAILED};
