//! Job state and reconstruction from events.
//!
//! A job owns the stories of its current cycle. Both the live actor and the
//! restart path mutate state exclusively through `apply_event`, so replaying
//! the log always lands on the state the job had before it stopped.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::events::{JobEvent, JobEventKind};
use super::story::{RawStory, Story};

/// Current state of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    /// Stable external identity
    pub identity: String,

    /// Topic filter, set once per topic lifetime
    pub topic: Option<String>,

    /// Cycle counter, bumped by every reset
    pub generation: u64,

    /// Stories of the current cycle, in listing order
    pub stories: Vec<Story>,

    /// Whether the listing for the current cycle has come back
    pub listed: bool,

    /// Listing failure for the current cycle
    pub failure: Option<String>,

    /// True once every story of the cycle is terminal
    pub ready: bool,
}

impl JobState {
    /// Create an empty job
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            topic: None,
            generation: 0,
            stories: Vec::new(),
            listed: false,
            failure: None,
            ready: false,
        }
    }

    /// Reconstruct job state from a sequence of events
    pub fn from_events(events: &[JobEvent]) -> Option<Self> {
        let identity = events.iter().find_map(|e| match &e.kind {
            JobEventKind::JobCreated { identity } => Some(identity.clone()),
            _ => None,
        })?;

        let mut state = Self::new(identity);
        for event in events {
            state.apply_event(event);
        }

        Some(state)
    }

    /// Apply a single event. Events from an earlier cycle are ignored.
    pub fn apply_event(&mut self, event: &JobEvent) {
        let current = event.generation == self.generation;

        match &event.kind {
            JobEventKind::JobCreated { identity } => {
                self.identity = identity.clone();
            }
            JobEventKind::TopicSet { topic } => {
                if self.topic.is_none() {
                    self.topic = Some(topic.clone());
                }
            }
            JobEventKind::StoriesListed { stories } if current => {
                self.stories = ingest(stories);
                self.listed = true;
                self.failure = None;
            }
            JobEventKind::ListingFailed { error } if current => {
                self.failure = Some(error.clone());
            }
            JobEventKind::PreviewPublished { preview } if current => {
                if let Some(story) = event.story_id.as_deref().and_then(|id| self.story_mut(id)) {
                    if story.summary.is_none() {
                        story.content_preview = Some(preview.clone());
                    }
                }
            }
            JobEventKind::SummaryApplied { summary, .. } if current => {
                if let Some(story) = event.story_id.as_deref().and_then(|id| self.story_mut(id)) {
                    if story.summary.is_none() {
                        story.apply_summary(summary.clone());
                    }
                }
            }
            JobEventKind::ResultReady if current => {
                self.ready = true;
            }
            JobEventKind::Reset { topic_cleared } => {
                self.generation = event.generation;
                self.stories.clear();
                self.listed = false;
                self.failure = None;
                self.ready = false;
                if *topic_cleared {
                    self.topic = None;
                }
            }
            _ => {}
        }
    }

    /// Derive the phase from the state
    pub fn phase(&self) -> JobPhase {
        if self.ready {
            JobPhase::Ready
        } else if self.failure.is_some() {
            JobPhase::Failed
        } else if self.topic.is_none() {
            JobPhase::Idle
        } else {
            JobPhase::Fetching
        }
    }

    /// Look up a story by id
    pub fn story(&self, story_id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == story_id)
    }

    fn story_mut(&mut self, story_id: &str) -> Option<&mut Story> {
        self.stories.iter_mut().find(|s| s.id == story_id)
    }

    /// Previews currently awaiting a summary, keyed by story id
    pub fn previews(&self) -> BTreeMap<String, String> {
        self.stories
            .iter()
            .filter(|s| s.is_pending())
            .filter_map(|s| s.content_preview.clone().map(|p| (s.id.clone(), p)))
            .collect()
    }

    /// True when the listing is in and every story has a summary
    pub fn all_terminal(&self) -> bool {
        self.listed && self.stories.iter().all(Story::is_terminal)
    }

    /// Whether the current cycle still needs its listing fetched
    pub fn needs_listing(&self) -> bool {
        self.topic.is_some() && !self.listed && self.failure.is_none() && !self.ready
    }

    /// Take a consistent, owned snapshot for queries
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            identity: self.identity.clone(),
            generation: self.generation,
            phase: self.phase(),
            topic: self.topic.clone(),
            ready: self.ready,
            failure: self.failure.clone(),
            previews: self.previews(),
            stories: self.stories.clone(),
        }
    }
}

/// Turn a listing into stories, dropping repeated ids (first wins)
fn ingest(raw: &[RawStory]) -> Vec<Story> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter(|r| seen.insert(r.id.clone()))
        .cloned()
        .map(Story::from)
        .collect()
}

/// Phase of a job's current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// No topic set yet
    Idle,

    /// Topic set, listing or enrichment in flight
    Fetching,

    /// Every story is terminal
    Ready,

    /// The listing failed for this cycle
    Failed,
}

impl Default for JobPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of a job, served to queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub identity: String,
    pub generation: u64,
    pub phase: JobPhase,
    pub topic: Option<String>,
    pub ready: bool,
    pub failure: Option<String>,
    pub previews: BTreeMap<String, String>,
    pub stories: Vec<Story>,
}

/// What a reset does to the topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Keep the topic and immediately start a fresh cycle under it
    RetainTopic,

    /// Clear the topic; the job waits for a new `set_topic`
    ClearTopic,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::RetainTopic
    }
}

impl FromStr for ResetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "retain_topic" | "retain" => Ok(Self::RetainTopic),
            "clear_topic" | "clear" => Ok(Self::ClearTopic),
            other => Err(format!("unknown reset policy: {}", other)),
        }
    }
}
