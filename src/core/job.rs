//! Job actor: the single owner of a job's state.
//!
//! Every job runs as one tokio task. Commands arrive over an mpsc channel
//! and are answered through oneshot replies; pipeline previews, listing
//! outcomes and pipeline completions arrive on their own channels. The
//! actor handles one message at a time, persists every state change to the
//! job's event log before applying it, and publishes a snapshot through a
//! watch channel so queries never wait on the actor.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::adapters::hackernews::LISTING_FAILED;
use crate::adapters::{ContentResolver, StoryLister, TextExtractor};
use crate::domain::{
    JobEvent, JobEventKind, JobSnapshot, JobState, RawStory, ResetPolicy, Story, SummarySource,
};

use super::enrichment::{Enrichment, PipelineOutcome, PipelineReport, PreviewReady};
use super::event_store::JobStore;
use super::settings::JobSettings;

/// Capacity of the command channel
const COMMAND_BUFFER: usize = 32;

/// Errors returned by job commands and queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Topic is already set to '{0}'")]
    TopicAlreadySet(String),

    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("No pending preview for story '{0}'")]
    NoPendingPreview(String),

    #[error("Summary targets generation {supplied}, job is at generation {current}")]
    StaleGeneration { supplied: u64, current: u64 },

    #[error("Failed to fetch stories: {0}")]
    ListingFailed(String),

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Job '{0}' is driven by another process")]
    Locked(String),

    #[error("Job has stopped")]
    Stopped,
}

impl JobError {
    /// Structured error payload for outer surfaces
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::ListingFailed(_) => json!({ "error": LISTING_FAILED }),
            other => json!({ "error": other.to_string() }),
        }
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", err))
    }
}

/// A summary pushed by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryInput {
    pub story_id: String,
    pub summary: String,

    /// Cycle the summary was produced for. When set, a mismatch with the
    /// job's current generation rejects the summary.
    pub generation: Option<u64>,
}

impl SummaryInput {
    pub fn new(story_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            summary: summary.into(),
            generation: None,
        }
    }

    pub fn for_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}

/// Collaborators and settings injected into every job
#[derive(Clone)]
pub struct JobDeps {
    pub lister: Arc<dyn StoryLister>,
    pub resolver: Arc<dyn ContentResolver>,
    pub extractor: Arc<dyn TextExtractor>,
    pub settings: JobSettings,
}

impl JobDeps {
    pub fn new(
        lister: Arc<dyn StoryLister>,
        resolver: Arc<dyn ContentResolver>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            lister,
            resolver,
            extractor,
            settings: JobSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: JobSettings) -> Self {
        self.settings = settings;
        self
    }
}

type Reply<T> = oneshot::Sender<Result<T, JobError>>;

/// Messages accepted by the actor
enum Command {
    SetTopic { topic: String, reply: Reply<()> },
    UpdateSummary { input: SummaryInput, reply: Reply<()> },
    Reset { reply: Reply<u64> },
    Stop,
}

/// Result of the listing task for one cycle
struct ListingOutcome {
    generation: u64,
    result: Result<Vec<RawStory>, String>,
}

/// Cloneable handle to a running job
#[derive(Clone)]
pub struct JobHandle {
    identity: String,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<JobSnapshot>,
}

impl JobHandle {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, JobError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| JobError::Stopped)?;
        response.await.map_err(|_| JobError::Stopped)?
    }

    /// Set the topic filter and start the listing for the current cycle
    pub async fn set_topic(&self, topic: impl Into<String>) -> Result<(), JobError> {
        let topic = topic.into();
        self.request(|reply| Command::SetTopic { topic, reply }).await
    }

    /// Supply the summary for a story with a pending preview
    pub async fn update_story_summary(&self, input: SummaryInput) -> Result<(), JobError> {
        self.request(|reply| Command::UpdateSummary { input, reply })
            .await
    }

    /// Discard the current cycle and start a new one. Returns the new
    /// generation.
    pub async fn reset_final_result_ready(&self) -> Result<u64, JobError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub fn get_topic(&self) -> Option<String> {
        self.snapshots.borrow().topic.clone()
    }

    /// Previews awaiting a summary, keyed by story id
    pub fn get_content_preview(&self) -> BTreeMap<String, String> {
        self.snapshots.borrow().previews.clone()
    }

    pub fn get_final_result_ready(&self) -> bool {
        self.snapshots.borrow().ready
    }

    /// Stories of the current cycle, partial until ready
    pub fn get_final_result(&self) -> Result<Vec<Story>, JobError> {
        result_of(&self.snapshots.borrow())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the cycle is ready or its listing failed
    pub async fn wait_until_ready(&self) -> Result<Vec<Story>, JobError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|s| s.ready || s.failure.is_some())
            .await
            .map_err(|_| JobError::Stopped)?
            .clone();
        result_of(&snapshot)
    }

    /// True once the actor has exited and released the owner lock
    pub fn is_closed(&self) -> bool {
        self.snapshots.has_changed().is_err()
    }

    /// Ask the actor to exit and wait until it has released the job
    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop).await;
        self.stopped().await;
    }

    /// Wait until the actor has exited
    pub async fn stopped(&self) {
        let mut snapshots = self.snapshots.clone();
        while snapshots.changed().await.is_ok() {}
    }
}

fn result_of(snapshot: &JobSnapshot) -> Result<Vec<Story>, JobError> {
    match &snapshot.failure {
        Some(failure) => Err(JobError::ListingFailed(failure.clone())),
        None => Ok(snapshot.stories.clone()),
    }
}

/// Spawn the actor for a job whose state was replayed from `store`
pub(crate) fn spawn(state: JobState, store: JobStore, deps: JobDeps) -> JobHandle {
    let identity = state.identity.clone();
    let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
    let (previews_tx, previews) = mpsc::unbounded_channel();
    let (listings_tx, listings) = mpsc::unbounded_channel();
    let (snapshots, snapshots_rx) = watch::channel(state.snapshot());

    let actor = JobActor {
        state,
        deps,
        commands,
        previews_tx,
        previews,
        listings_tx,
        listings,
        pipelines: JoinSet::new(),
        listing: None,
        waiters: HashMap::new(),
        store,
        snapshots,
    };
    tokio::spawn(actor.run());

    JobHandle {
        identity,
        commands: commands_tx,
        snapshots: snapshots_rx,
    }
}

struct JobActor {
    state: JobState,
    deps: JobDeps,
    commands: mpsc::Receiver<Command>,
    previews_tx: mpsc::UnboundedSender<PreviewReady>,
    previews: mpsc::UnboundedReceiver<PreviewReady>,
    listings_tx: mpsc::UnboundedSender<ListingOutcome>,
    listings: mpsc::UnboundedReceiver<ListingOutcome>,
    pipelines: JoinSet<PipelineReport>,
    listing: Option<JoinHandle<()>>,

    /// Completion signals of parked pipelines, by story id
    waiters: HashMap<String, oneshot::Sender<String>>,

    /// Holds the owner lock
    store: JobStore,

    /// Must stay the last field: it is dropped after the store, so a closed
    /// channel means the owner lock is already released.
    snapshots: watch::Sender<JobSnapshot>,
}

impl JobActor {
    async fn run(mut self) {
        info!(
            job = %self.state.identity,
            generation = self.state.generation,
            phase = %self.state.phase(),
            "Job started"
        );
        self.resume().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Stop) | None => break,
                    Some(command) => self.handle(command).await,
                },
                Some(ready) = self.previews.recv() => self.on_preview(ready).await,
                Some(outcome) = self.listings.recv() => self.on_listing(outcome).await,
                Some(joined) = self.pipelines.join_next(), if !self.pipelines.is_empty() => {
                    self.on_pipeline_done(joined).await
                }
            }
        }

        if let Some(listing) = self.listing.take() {
            listing.abort();
        }
        self.pipelines.abort_all();
        info!(job = %self.state.identity, "Job stopped");
    }

    /// Pick up whatever the replayed state left unfinished
    async fn resume(&mut self) {
        self.check_ready().await;

        if self.state.needs_listing() {
            self.start_listing();
        } else if self.state.listed && !self.state.ready {
            let pending = self.spawn_pipelines();
            info!(job = %self.state.identity, pending, "Resuming pipelines");
        }

        self.publish();
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::SetTopic { topic, reply } => {
                let result = self.set_topic(topic).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::UpdateSummary { input, reply } => {
                let result = self.update_summary(input).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Reset { reply } => {
                let result = self.reset().await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Stop => {}
        }
    }

    async fn set_topic(&mut self, topic: String) -> Result<(), JobError> {
        let topic = topic.trim().to_string();
        if topic.is_empty() {
            return Err(JobError::EmptyTopic);
        }
        if let Some(current) = &self.state.topic {
            return Err(JobError::TopicAlreadySet(current.clone()));
        }

        self.record(JobEvent::job(
            self.state.generation,
            JobEventKind::TopicSet {
                topic: topic.clone(),
            },
        ))
        .await?;
        info!(job = %self.state.identity, %topic, "Topic set");

        self.start_listing();
        Ok(())
    }

    async fn update_summary(&mut self, input: SummaryInput) -> Result<(), JobError> {
        let current = self.state.generation;
        if let Some(supplied) = input.generation {
            if supplied != current {
                return Err(JobError::StaleGeneration { supplied, current });
            }
        }

        let pending = self
            .state
            .story(&input.story_id)
            .map(Story::is_pending)
            .unwrap_or(false);
        if !pending {
            return Err(JobError::NoPendingPreview(input.story_id));
        }

        self.record(JobEvent::story(
            current,
            input.story_id.clone(),
            JobEventKind::SummaryApplied {
                summary: input.summary.clone(),
                source: SummarySource::Supplied,
            },
        ))
        .await?;
        debug!(job = %self.state.identity, story_id = %input.story_id, "Summary applied");

        if let Some(waiter) = self.waiters.remove(&input.story_id) {
            let _ = waiter.send(input.summary);
        }

        self.check_ready().await;
        Ok(())
    }

    async fn reset(&mut self) -> Result<u64, JobError> {
        let generation = self.state.generation + 1;
        let topic_cleared = self.deps.settings.reset_policy == ResetPolicy::ClearTopic;

        self.record(JobEvent::job(
            generation,
            JobEventKind::Reset { topic_cleared },
        ))
        .await?;

        if let Some(listing) = self.listing.take() {
            listing.abort();
        }
        // Dropping the old set aborts every pipeline of the previous cycle
        self.pipelines = JoinSet::new();
        self.waiters.clear();

        info!(job = %self.state.identity, generation, topic_cleared, "Job reset");

        if self.state.needs_listing() {
            self.start_listing();
        }
        Ok(generation)
    }

    fn start_listing(&mut self) {
        let Some(topic) = self.state.topic.clone() else {
            return;
        };
        if let Some(previous) = self.listing.take() {
            previous.abort();
        }

        let generation = self.state.generation;
        let lister = Arc::clone(&self.deps.lister);
        let settings = self.deps.settings.clone();
        let outcomes = self.listings_tx.clone();

        self.listing = Some(tokio::spawn(async move {
            let result = fetch_listing(lister.as_ref(), &topic, &settings).await;
            let _ = outcomes.send(ListingOutcome { generation, result });
        }));
    }

    async fn on_listing(&mut self, outcome: ListingOutcome) {
        if outcome.generation != self.state.generation || self.state.listed {
            debug!(
                generation = outcome.generation,
                current = self.state.generation,
                "Discarding stale listing"
            );
            return;
        }
        self.listing = None;
        let generation = self.state.generation;

        match outcome.result {
            Ok(stories) => {
                self.record_internal(JobEvent::job(
                    generation,
                    JobEventKind::StoriesListed { stories },
                ))
                .await;
                let spawned = self.spawn_pipelines();
                info!(
                    job = %self.state.identity,
                    generation,
                    stories = self.state.stories.len(),
                    spawned,
                    "Stories listed"
                );
                self.check_ready().await;
            }
            Err(error) => {
                error!(job = %self.state.identity, generation, %error, "Listing failed");
                self.record_internal(JobEvent::job(
                    generation,
                    JobEventKind::ListingFailed { error },
                ))
                .await;
            }
        }

        self.publish();
    }

    /// Spawn one pipeline per story without a summary
    fn spawn_pipelines(&mut self) -> usize {
        let generation = self.state.generation;
        let mut spawned = 0;

        for story in self.state.stories.iter().filter(|s| !s.is_terminal()) {
            let enrichment = Enrichment::new(
                generation,
                story.clone(),
                Arc::clone(&self.deps.resolver),
                Arc::clone(&self.deps.extractor),
                self.previews_tx.clone(),
            )
            .with_timeouts(
                self.deps.settings.render_timeout(),
                self.deps.settings.fetch_timeout(),
            );
            self.pipelines.spawn(enrichment.run());
            spawned += 1;
        }

        spawned
    }

    async fn on_preview(&mut self, ready: PreviewReady) {
        let PreviewReady {
            generation,
            story_id,
            preview,
            waiter,
        } = ready;

        if generation != self.state.generation {
            debug!(%story_id, generation, "Discarding stale preview");
            return;
        }

        let Some(story) = self.state.story(&story_id) else {
            warn!(%story_id, "Preview for unknown story");
            return;
        };
        if story.is_terminal() {
            return;
        }

        // A resumed pipeline republishes the preview the log already holds
        if story.content_preview.as_deref() != Some(preview.as_str()) {
            self.record_internal(JobEvent::story(
                generation,
                story_id.clone(),
                JobEventKind::PreviewPublished { preview },
            ))
            .await;
            debug!(job = %self.state.identity, %story_id, "Preview published");
        }

        self.waiters.insert(story_id, waiter);
        self.publish();
    }

    async fn on_pipeline_done(&mut self, joined: Result<PipelineReport, JoinError>) {
        let report = match joined {
            Ok(report) => report,
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                error!(job = %self.state.identity, error = %e, "Pipeline task failed");
                return;
            }
        };

        if report.generation != self.state.generation {
            return;
        }

        let PipelineOutcome::Concluded(summary) = report.outcome else {
            return;
        };

        let open = self
            .state
            .story(&report.story_id)
            .map(|s| !s.is_terminal())
            .unwrap_or(false);
        if !open {
            return;
        }

        self.waiters.remove(&report.story_id);
        debug!(story_id = %report.story_id, %summary, "Pipeline concluded without summary");
        self.record_internal(JobEvent::story(
            report.generation,
            report.story_id,
            JobEventKind::SummaryApplied {
                summary,
                source: SummarySource::Fallback,
            },
        ))
        .await;

        self.check_ready().await;
        self.publish();
    }

    /// Sole transition into the ready phase
    async fn check_ready(&mut self) {
        if self.state.ready || !self.state.all_terminal() {
            return;
        }

        self.record_internal(JobEvent::job(self.state.generation, JobEventKind::ResultReady))
            .await;
        info!(
            job = %self.state.identity,
            generation = self.state.generation,
            stories = self.state.stories.len(),
            "Job ready"
        );
    }

    /// Persist, then apply. Nothing changes when the append fails.
    async fn record(&mut self, event: JobEvent) -> Result<(), JobError> {
        self.store.append(&event).await.map_err(JobError::store)?;
        self.state.apply_event(&event);
        Ok(())
    }

    /// Persist and apply an event produced by the job itself. A failed
    /// append is logged; the in-memory state still moves forward. An event
    /// whose idempotency key is already in the log is applied but not
    /// appended again.
    async fn record_internal(&mut self, event: JobEvent) {
        match self.store.is_recorded(&event.idempotency_key).await {
            Ok(true) => {
                debug!(
                    job = %self.state.identity,
                    key = %event.idempotency_key,
                    "Event already recorded"
                );
                self.state.apply_event(&event);
                return;
            }
            Ok(false) => {}
            Err(e) => warn!(
                job = %self.state.identity,
                error = %format!("{:#}", e),
                "Failed to check event log"
            ),
        }

        if let Err(e) = self.store.append(&event).await {
            error!(
                job = %self.state.identity,
                event = event.kind.name(),
                error = %format!("{:#}", e),
                "Failed to persist event"
            );
        }
        self.state.apply_event(&event);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.snapshot());
    }
}

/// Fetch the listing under the configured timeout and retry policy
async fn fetch_listing(
    lister: &dyn StoryLister,
    topic: &str,
    settings: &JobSettings,
) -> Result<Vec<RawStory>, String> {
    let policy = &settings.listing_retry;
    let mut attempt = 1;

    loop {
        let result = match timeout(
            settings.listing_timeout(),
            lister.list(topic, settings.page_size, settings.page),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "Listing timed out after {:?}",
                settings.listing_timeout()
            )),
        };

        match result {
            Ok(stories) => return Ok(stories),
            Err(e) if policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    lister = lister.name(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    ?delay,
                    error = %e,
                    "Listing failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RawContent;
    use crate::core::settings::RetryPolicy;
    use crate::domain::SUMMARY_NOT_AVAILABLE;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    struct FlakyLister {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StoryLister for FlakyLister {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn list(&self, _topic: &str, _page_size: u32, _page: u32) -> Result<Vec<RawStory>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                anyhow::bail!("attempt {} failed", call + 1);
            }
            Ok(vec![RawStory::new("1", "one")])
        }
    }

    struct NoContent;

    #[async_trait]
    impl ContentResolver for NoContent {
        async fn render(&self, _url: &Url, _timeout: Duration) -> Result<Option<RawContent>> {
            Ok(None)
        }

        async fn fetch(&self, _url: &Url, _timeout: Duration) -> Result<Option<RawContent>> {
            Ok(None)
        }
    }

    struct Verbatim;

    impl TextExtractor for Verbatim {
        fn extract(&self, content: &RawContent) -> String {
            content.as_str().to_string()
        }
    }

    fn settings(max_attempts: u32) -> JobSettings {
        JobSettings {
            listing_retry: RetryPolicy {
                max_attempts,
                initial_delay_ms: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_listing_retries_until_success() {
        let lister = FlakyLister {
            failures: 2,
            calls: AtomicUsize::new(0),
        };

        let stories = fetch_listing(&lister, "rust", &settings(3)).await.unwrap();

        assert_eq!(stories.len(), 1);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_listing_gives_up() {
        let lister = FlakyLister {
            failures: 5,
            calls: AtomicUsize::new(0),
        };

        let error = fetch_listing(&lister, "rust", &settings(2)).await.unwrap_err();

        assert_eq!(error, "attempt 2 failed");
        assert_eq!(lister.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listing_failure_payload() {
        let error = JobError::ListingFailed("HTTP 503".to_string());
        assert_eq!(
            error.payload(),
            json!({ "error": "Failed to fetch stories from Algolia API" })
        );
        assert_eq!(
            JobError::EmptyTopic.payload(),
            json!({ "error": "Topic must not be empty" })
        );
    }

    async fn spawn_job(temp: &TempDir, lister: FlakyLister) -> JobHandle {
        let mut store = JobStore::open(temp.path(), "unit").await.unwrap();
        assert!(store.try_acquire().unwrap());
        let created = JobEvent::job(
            0,
            JobEventKind::JobCreated {
                identity: "unit".to_string(),
            },
        );
        store.append(&created).await.unwrap();

        let deps = JobDeps::new(Arc::new(lister), Arc::new(NoContent), Arc::new(Verbatim))
            .with_settings(settings(1));
        spawn(JobState::from_events(&[created]).unwrap(), store, deps)
    }

    #[tokio::test]
    async fn test_topic_rules() {
        let temp = TempDir::new().unwrap();
        let handle = spawn_job(
            &temp,
            FlakyLister {
                failures: 0,
                calls: AtomicUsize::new(0),
            },
        )
        .await;

        assert_eq!(handle.set_topic("   ").await, Err(JobError::EmptyTopic));
        assert_eq!(handle.get_topic(), None);

        handle.set_topic(" rust ").await.unwrap();
        assert_eq!(handle.get_topic().as_deref(), Some("rust"));
        assert_eq!(
            handle.set_topic("go").await,
            Err(JobError::TopicAlreadySet("rust".to_string()))
        );

        handle.stop().await;
        assert!(handle.is_closed());
        assert_eq!(handle.set_topic("x").await, Err(JobError::Stopped));
    }

    #[tokio::test]
    async fn test_untitled_story_without_text_concludes_ready() {
        let temp = TempDir::new().unwrap();
        let handle = spawn_job(
            &temp,
            FlakyLister {
                failures: 0,
                calls: AtomicUsize::new(0),
            },
        )
        .await;

        handle.set_topic("rust").await.unwrap();
        let stories = handle.wait_until_ready().await.unwrap();

        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].summary.as_deref(), Some("Summary not available"));
        assert!(handle.get_content_preview().is_empty());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_recorded_events_are_not_appended_twice() {
        let temp = TempDir::new().unwrap();
        let mut store = JobStore::open(temp.path(), "unit").await.unwrap();
        assert!(store.try_acquire().unwrap());

        let history = vec![
            JobEvent::job(
                0,
                JobEventKind::JobCreated {
                    identity: "unit".to_string(),
                },
            ),
            JobEvent::job(
                0,
                JobEventKind::TopicSet {
                    topic: "rust".to_string(),
                },
            ),
            JobEvent::job(
                0,
                JobEventKind::StoriesListed {
                    stories: vec![RawStory::new("1", "one")],
                },
            ),
        ];
        for event in &history {
            store.append(event).await.unwrap();
        }
        // The log is one event ahead of the state the actor resumes from
        store
            .append(&JobEvent::story(
                0,
                "1",
                JobEventKind::SummaryApplied {
                    summary: SUMMARY_NOT_AVAILABLE.to_string(),
                    source: SummarySource::Fallback,
                },
            ))
            .await
            .unwrap();

        let deps = JobDeps::new(
            Arc::new(FlakyLister {
                failures: 0,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(NoContent),
            Arc::new(Verbatim),
        )
        .with_settings(settings(1));
        let handle = spawn(JobState::from_events(&history).unwrap(), store, deps);

        let stories = handle.wait_until_ready().await.unwrap();
        assert_eq!(stories[0].summary.as_deref(), Some(SUMMARY_NOT_AVAILABLE));
        handle.stop().await;

        let events = JobStore::replay_job(temp.path(), "unit").await.unwrap();
        let count = |name: &str| events.iter().filter(|e| e.kind.name() == name).count();
        assert_eq!(count("summary_applied"), 1);
        assert_eq!(count("result_ready"), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_surfaces() {
        let temp = TempDir::new().unwrap();
        let handle = spawn_job(
            &temp,
            FlakyLister {
                failures: 10,
                calls: AtomicUsize::new(0),
            },
        )
        .await;

        handle.set_topic("rust").await.unwrap();

        let error = handle.wait_until_ready().await.unwrap_err();
        assert_eq!(error, JobError::ListingFailed("attempt 1 failed".to_string()));
        assert!(!handle.get_final_result_ready());
        assert!(handle.get_final_result().is_err());
        handle.stop().await;
    }
}
