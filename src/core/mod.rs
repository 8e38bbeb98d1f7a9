//! Core job machinery.
//!
//! This module contains:
//! - JobStore: Append-only job event log with an owner lock
//! - JobSettings: Timeouts, listing retry and reset policy
//! - Enrichment: Per-story resolve/extract/wait pipeline
//! - Job: The job actor and its handle
//! - Orchestrator: Start-or-attach registry
//! - Driver: Loop that summarizes previews until the job is ready

pub mod driver;
pub mod enrichment;
pub mod event_store;
pub mod job;
pub mod orchestrator;
pub mod settings;

// Re-export commonly used types
pub use driver::{drive, DriverConfig};
pub use enrichment::{EnrichError, Enrichment, PipelineOutcome, PipelineReport, PreviewReady};
pub use event_store::{hash_input, JobMeta, JobStore};
pub use job::{JobDeps, JobError, JobHandle, SummaryInput};
pub use orchestrator::Orchestrator;
pub use settings::{JobSettings, RetryPolicy};
