//! Event types for the event-sourced job.
//!
//! Every state change of a job is recorded as an immutable event in an
//! append-only log. The job is rebuilt after a restart by replaying them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::story::RawStory;

/// A single event in a job's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Cycle the event belongs to
    pub generation: u64,

    /// Story the event concerns (if applicable)
    pub story_id: Option<String>,

    /// Idempotency key format: "{generation}:{story_id or -}:{kind}"
    pub idempotency_key: String,

    /// What happened
    pub kind: JobEventKind,
}

impl JobEvent {
    /// Create a new event with the current timestamp
    pub fn new(generation: u64, story_id: Option<String>, kind: JobEventKind) -> Self {
        let idempotency_key = idempotency_key(generation, story_id.as_deref(), kind.name());
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            generation,
            story_id,
            idempotency_key,
            kind,
        }
    }

    /// Create an event that is not tied to a story
    pub fn job(generation: u64, kind: JobEventKind) -> Self {
        Self::new(generation, None, kind)
    }

    /// Create an event for a single story
    pub fn story(generation: u64, story_id: impl Into<String>, kind: JobEventKind) -> Self {
        Self::new(generation, Some(story_id.into()), kind)
    }
}

/// Build the idempotency key for an event
pub fn idempotency_key(generation: u64, story_id: Option<&str>, kind: &str) -> String {
    format!("{}:{}:{}", generation, story_id.unwrap_or("-"), kind)
}

/// Types of events that can occur during a job's life
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    /// The job was started for the first time
    JobCreated { identity: String },

    /// The topic filter was set
    TopicSet { topic: String },

    /// The listing for the cycle came back
    StoriesListed { stories: Vec<RawStory> },

    /// The listing for the cycle failed permanently
    ListingFailed { error: String },

    /// A story's extracted preview was published and now awaits a summary
    PreviewPublished { preview: String },

    /// A story reached its terminal summary
    SummaryApplied {
        summary: String,
        source: SummarySource,
    },

    /// Every story of the cycle is terminal
    ResultReady,

    /// The job was reset; `generation` on the event is the new cycle
    Reset { topic_cleared: bool },
}

impl JobEventKind {
    /// Stable short name, used in idempotency keys and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobCreated { .. } => "job_created",
            Self::TopicSet { .. } => "topic_set",
            Self::StoriesListed { .. } => "stories_listed",
            Self::ListingFailed { .. } => "listing_failed",
            Self::PreviewPublished { .. } => "preview_published",
            Self::SummaryApplied { .. } => "summary_applied",
            Self::ResultReady => "result_ready",
            Self::Reset { .. } => "reset",
        }
    }
}

/// Where a story's summary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    /// Supplied by the driver through `update_story_summary`
    Supplied,

    /// Placeholder recorded by the pipeline itself
    Fallback,
}
