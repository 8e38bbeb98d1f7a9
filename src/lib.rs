//! hnbrief - Resumable Hacker News story briefings
//!
//! Lists Hacker News stories for a topic, fetches and cleans each story's
//! page, and waits for a summary per story before the job reports ready.
//!
//! # Architecture
//!
//! The system is built around event sourcing:
//! - Every job state change is recorded as an immutable event
//! - Current state is derived by replaying events
//! - An interrupted job resumes where it stopped, without duplicating work
//!
//! # Modules
//!
//! - `adapters`: External system integrations (Algolia, HTTP, Chromium, Fabric)
//! - `core`: Job actor, enrichment pipeline, event store, registry, driver
//! - `domain`: Data structures (Story, JobEvent, JobState)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Start (or resume) a job and print the summarized stories
//! hnbrief run --job rust-weekly --topic rust
//!
//! # Discard the previous cycle and run again, as markdown
//! hnbrief run --job rust-weekly --fresh --format markdown
//!
//! # Check job status
//! hnbrief status --job rust-weekly
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod format;

// Re-export main types at crate root for convenience
pub use core::{JobError, JobHandle, Orchestrator, SummaryInput};
pub use domain::{JobPhase, JobSnapshot, RawStory, Story};
