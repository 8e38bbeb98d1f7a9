//! Shared test doubles for job integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use hnbrief::adapters::{ContentResolver, RawContent, StoryLister, Summarizer, TextExtractor};
use hnbrief::core::{JobDeps, JobSettings, RetryPolicy};
use hnbrief::domain::{RawStory, ResetPolicy};
use hnbrief::JobHandle;
use url::Url;

/// Upper bound for any single wait in these tests
pub const WAIT: Duration = Duration::from_secs(10);

/// Lister returning a fixed page and counting calls
pub struct FixedLister {
    stories: Vec<RawStory>,
    fail: bool,
    calls: AtomicUsize,
}

impl FixedLister {
    pub fn new(stories: Vec<RawStory>) -> Arc<Self> {
        Arc::new(Self {
            stories,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            stories: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoryLister for FixedLister {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn list(&self, _topic: &str, _page_size: u32, _page: u32) -> Result<Vec<RawStory>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("Failed to fetch stories from Algolia API: HTTP 503");
        }
        Ok(self.stories.clone())
    }
}

/// Resolver serving pages from a map. Renders return the page; fetches
/// return nothing. URLs marked as blocked never answer; URLs marked as
/// failing error on both render and fetch.
#[derive(Default)]
pub struct MapResolver {
    pages: HashMap<String, String>,
    blocked: HashSet<String>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn blocked(mut self, url: &str) -> Self {
        self.blocked.insert(url.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, url: &Url) {
        self.calls.lock().unwrap().push(url.to_string());
    }
}

#[async_trait]
impl ContentResolver for MapResolver {
    async fn render(&self, url: &Url, _timeout: Duration) -> Result<Option<RawContent>> {
        self.record(url);
        if self.blocked.contains(url.as_str()) {
            futures::future::pending::<()>().await;
        }
        if self.failing.contains(url.as_str()) {
            anyhow::bail!("render failed for {}", url);
        }
        Ok(self.pages.get(url.as_str()).cloned().map(RawContent::Text))
    }

    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<Option<RawContent>> {
        self.record(url);
        if self.failing.contains(url.as_str()) {
            anyhow::bail!("fetch failed for {}", url);
        }
        Ok(None)
    }
}

/// Extractor returning the content trimmed
pub struct TrimExtractor;

impl TextExtractor for TrimExtractor {
    fn extract(&self, content: &RawContent) -> String {
        content.as_str().trim().to_string()
    }
}

/// Summarizer producing "summary of <preview>", failing for one story
pub struct EchoSummarizer {
    pub fail_for: Option<String>,
}

#[async_trait]
impl Summarizer for EchoSummarizer {
    fn name(&self) -> &str {
        "echo"
    }

    async fn summarize(&self, story_id: &str, preview: &str) -> Result<String> {
        if self.fail_for.as_deref() == Some(story_id) {
            anyhow::bail!("summarizer unavailable");
        }
        Ok(format!("summary of {}", preview))
    }
}

/// Settings without listing retries
pub fn settings(reset_policy: ResetPolicy) -> JobSettings {
    JobSettings {
        listing_retry: RetryPolicy::none(),
        reset_policy,
        ..Default::default()
    }
}

pub fn deps(
    lister: Arc<FixedLister>,
    resolver: Arc<MapResolver>,
    reset_policy: ResetPolicy,
) -> JobDeps {
    JobDeps::new(lister, resolver, Arc::new(TrimExtractor)).with_settings(settings(reset_policy))
}

/// The three stories used across scenarios: one with a page, one with only
/// fallback text, one with nothing at all
pub fn three_stories() -> Vec<RawStory> {
    vec![
        RawStory::new("a", "Alpha").with_url("https://alpha.example/"),
        RawStory::new("b", "Beta")
            .with_url("https://beta.example/")
            .with_story_text("Beta fallback"),
        RawStory::new("c", "Gamma"),
    ]
}

/// Alpha renders; beta fails on render and on fetch
pub fn three_pages() -> MapResolver {
    MapResolver::new()
        .page("https://alpha.example/", "  Alpha text  ")
        .failing("https://beta.example/")
}

/// Wait until at least `count` previews are pending
pub async fn wait_for_previews(job: &JobHandle, count: usize) -> BTreeMap<String, String> {
    let mut snapshots = job.subscribe();
    let snapshot = tokio::time::timeout(WAIT, snapshots.wait_for(|s| s.previews.len() >= count))
        .await
        .expect("timed out waiting for previews")
        .expect("job stopped");
    snapshot.previews.clone()
}

/// Wait until the story has a summary
pub async fn wait_for_summary(job: &JobHandle, story_id: &str) -> String {
    let mut snapshots = job.subscribe();
    let snapshot = tokio::time::timeout(
        WAIT,
        snapshots.wait_for(|s| {
            s.stories
                .iter()
                .any(|story| story.id == story_id && story.summary.is_some())
        }),
    )
    .await
    .expect("timed out waiting for summary")
    .expect("job stopped");

    snapshot
        .stories
        .iter()
        .find(|s| s.id == story_id)
        .and_then(|s| s.summary.clone())
        .unwrap_or_default()
}
