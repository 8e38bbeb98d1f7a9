//! Job Lifecycle Integration Tests
//!
//! Tests for the topic/listing/preview/summary flow, readiness, resets and
//! concurrency of the per-story pipelines.

mod common;

use std::sync::Arc;

use common::*;
use hnbrief::domain::{JobPhase, RawStory, ResetPolicy, SUMMARY_NOT_AVAILABLE};
use hnbrief::{JobError, Orchestrator, SummaryInput};
use serde_json::json;
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_three_story_scenario() {
    let temp = TempDir::new().unwrap();
    let lister = FixedLister::new(three_stories());
    let resolver = Arc::new(three_pages());
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(lister.clone(), resolver.clone(), ResetPolicy::RetainTopic),
    );

    let job = orchestrator.start_or_attach("three").await.unwrap();
    assert_eq!(job.get_topic(), None);
    assert_eq!(job.snapshot().phase, JobPhase::Idle);

    job.set_topic("rust").await.unwrap();
    assert_eq!(job.get_topic().as_deref(), Some("rust"));

    let previews = wait_for_previews(&job, 2).await;
    assert_eq!(previews.get("a").map(String::as_str), Some("Alpha text"));
    assert_eq!(previews.get("b").map(String::as_str), Some("Beta fallback"));
    assert!(!previews.contains_key("c"));

    job.update_story_summary(SummaryInput::new("a", "S1"))
        .await
        .unwrap();
    assert!(!job.get_final_result_ready());

    job.update_story_summary(SummaryInput::new("b", "S2"))
        .await
        .unwrap();

    let stories = timeout(WAIT, job.wait_until_ready()).await.unwrap().unwrap();
    let summaries: Vec<&str> = stories
        .iter()
        .map(|s| s.summary.as_deref().unwrap_or(""))
        .collect();

    assert_eq!(summaries, vec!["S1", "S2", SUMMARY_NOT_AVAILABLE]);
    assert!(job.get_final_result_ready());
    assert!(job.get_content_preview().is_empty());
    assert_eq!(job.snapshot().phase, JobPhase::Ready);
    assert_eq!(lister.calls(), 1);

    // Beta's resolver failed twice before its fallback text was used
    let beta_calls = resolver
        .calls()
        .iter()
        .filter(|url| url.as_str() == "https://beta.example/")
        .count();
    assert_eq!(beta_calls, 2);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_preview_and_summary_never_coexist() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(
            FixedLister::new(three_stories()),
            Arc::new(three_pages()),
            ResetPolicy::RetainTopic,
        ),
    );

    let job = orchestrator.start_or_attach("exclusive").await.unwrap();
    let mut snapshots = job.subscribe();
    job.set_topic("rust").await.unwrap();

    wait_for_previews(&job, 2).await;
    job.update_story_summary(SummaryInput::new("a", "S1"))
        .await
        .unwrap();
    job.update_story_summary(SummaryInput::new("b", "S2"))
        .await
        .unwrap();

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        for story in &snapshot.stories {
            assert!(
                !(story.content_preview.is_some() && story.summary.is_some()),
                "story {} has both a preview and a summary",
                story.id
            );
        }
        if snapshot.ready {
            break;
        }
        timeout(WAIT, snapshots.changed()).await.unwrap().unwrap();
    }

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_summary_without_pending_preview_is_rejected() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(
            FixedLister::new(three_stories()),
            Arc::new(three_pages()),
            ResetPolicy::RetainTopic,
        ),
    );

    let job = orchestrator.start_or_attach("strict").await.unwrap();

    // Before any topic: nothing is pending
    assert_eq!(
        job.update_story_summary(SummaryInput::new("a", "early")).await,
        Err(JobError::NoPendingPreview("a".to_string()))
    );

    job.set_topic("rust").await.unwrap();
    wait_for_previews(&job, 2).await;
    let before = job.snapshot();

    // Unknown id and a story that concluded on its own
    assert_eq!(
        job.update_story_summary(SummaryInput::new("zzz", "x")).await,
        Err(JobError::NoPendingPreview("zzz".to_string()))
    );
    wait_for_summary(&job, "c").await;
    assert_eq!(
        job.update_story_summary(SummaryInput::new("c", "x")).await,
        Err(JobError::NoPendingPreview("c".to_string()))
    );

    assert_eq!(job.get_content_preview(), before.previews);
    assert_eq!(wait_for_summary(&job, "c").await, SUMMARY_NOT_AVAILABLE);

    // A summary is applied once; the second attempt finds nothing pending
    job.update_story_summary(SummaryInput::new("a", "S1"))
        .await
        .unwrap();
    assert_eq!(
        job.update_story_summary(SummaryInput::new("a", "again")).await,
        Err(JobError::NoPendingPreview("a".to_string()))
    );
    assert_eq!(wait_for_summary(&job, "a").await, "S1");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_topic_is_set_once() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(
            FixedLister::new(Vec::new()),
            Arc::new(MapResolver::new()),
            ResetPolicy::RetainTopic,
        ),
    );

    let job = orchestrator.start_or_attach("topic").await.unwrap();

    assert_eq!(job.set_topic("  ").await, Err(JobError::EmptyTopic));
    assert_ok!(job.set_topic("rust").await);
    assert_err!(job.set_topic("rust").await);
    assert_eq!(
        job.set_topic("go").await,
        Err(JobError::TopicAlreadySet("rust".to_string()))
    );
    assert_eq!(job.get_topic().as_deref(), Some("rust"));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_empty_listing_is_ready_immediately() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(
            FixedLister::new(Vec::new()),
            Arc::new(MapResolver::new()),
            ResetPolicy::RetainTopic,
        ),
    );

    let job = orchestrator.start_or_attach("empty").await.unwrap();
    job.set_topic("nothing matches").await.unwrap();

    let stories = timeout(WAIT, job.wait_until_ready()).await.unwrap().unwrap();
    assert!(stories.is_empty());
    assert!(job.get_final_result_ready());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_listing_failure_surfaces_as_error_payload() {
    let temp = TempDir::new().unwrap();
    let lister = FixedLister::failing();
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(lister.clone(), Arc::new(MapResolver::new()), ResetPolicy::RetainTopic),
    );

    let job = orchestrator.start_or_attach("broken").await.unwrap();
    job.set_topic("rust").await.unwrap();

    let error = timeout(WAIT, job.wait_until_ready())
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(error, JobError::ListingFailed(_)));
    assert_eq!(
        error.payload(),
        json!({ "error": "Failed to fetch stories from Algolia API" })
    );
    assert!(!job.get_final_result_ready());
    assert!(job.get_final_result().is_err());
    assert_eq!(job.snapshot().phase, JobPhase::Failed);
    assert_eq!(lister.calls(), 1);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_double_reset_yields_same_empty_state() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(
            FixedLister::new(three_stories()),
            Arc::new(three_pages()),
            ResetPolicy::ClearTopic,
        ),
    );

    let job = orchestrator.start_or_attach("reset").await.unwrap();
    job.set_topic("rust").await.unwrap();
    wait_for_previews(&job, 2).await;

    assert_eq!(job.reset_final_result_ready().await, Ok(1));
    let first = job.snapshot();
    assert_eq!(job.reset_final_result_ready().await, Ok(2));
    let second = job.snapshot();

    for snapshot in [&first, &second] {
        assert_eq!(snapshot.phase, JobPhase::Idle);
        assert_eq!(snapshot.topic, None);
        assert!(!snapshot.ready);
        assert!(snapshot.stories.is_empty());
        assert!(snapshot.previews.is_empty());
        assert!(snapshot.failure.is_none());
    }
    assert_eq!(
        (first.phase, &first.topic, &first.stories, &first.previews),
        (second.phase, &second.topic, &second.stories, &second.previews)
    );

    // Topic can be supplied again after a clearing reset
    job.set_topic("go").await.unwrap();
    assert_eq!(job.get_topic().as_deref(), Some("go"));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_reset_with_retained_topic_starts_new_cycle() {
    let temp = TempDir::new().unwrap();
    let lister = FixedLister::new(three_stories());
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(lister.clone(), Arc::new(three_pages()), ResetPolicy::RetainTopic),
    );

    let job = orchestrator.start_or_attach("rerun").await.unwrap();
    job.set_topic("rust").await.unwrap();
    wait_for_previews(&job, 2).await;
    job.update_story_summary(SummaryInput::new("a", "S1"))
        .await
        .unwrap();
    job.update_story_summary(SummaryInput::new("b", "S2"))
        .await
        .unwrap();
    timeout(WAIT, job.wait_until_ready()).await.unwrap().unwrap();

    let generation = job.reset_final_result_ready().await.unwrap();
    assert_eq!(generation, 1);
    assert!(!job.get_final_result_ready());
    assert_eq!(job.get_topic().as_deref(), Some("rust"));

    // The new cycle lists again and republishes fresh previews
    let previews = wait_for_previews(&job, 2).await;
    assert_eq!(previews.get("a").map(String::as_str), Some("Alpha text"));
    assert_eq!(lister.calls(), 2);

    let snapshot = job.snapshot();
    assert_eq!(snapshot.generation, 1);
    assert!(snapshot
        .stories
        .iter()
        .all(|s| s.summary.as_deref() != Some("S1")));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_stale_generation_summary_is_rejected() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(
            FixedLister::new(three_stories()),
            Arc::new(three_pages()),
            ResetPolicy::RetainTopic,
        ),
    );

    let job = orchestrator.start_or_attach("stale").await.unwrap();
    job.set_topic("rust").await.unwrap();
    wait_for_previews(&job, 2).await;
    let old_generation = job.snapshot().generation;

    job.reset_final_result_ready().await.unwrap();
    wait_for_previews(&job, 2).await;

    // A summary computed for the previous cycle must not land in the new one
    assert_eq!(
        job.update_story_summary(SummaryInput::new("a", "old").for_generation(old_generation))
            .await,
        Err(JobError::StaleGeneration {
            supplied: 0,
            current: 1
        })
    );
    assert_eq!(
        job.get_content_preview().get("a").map(String::as_str),
        Some("Alpha text")
    );

    job.update_story_summary(SummaryInput::new("a", "new").for_generation(1))
        .await
        .unwrap();
    assert_eq!(wait_for_summary(&job, "a").await, "new");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_blocked_story_does_not_block_others() {
    let temp = TempDir::new().unwrap();
    let stories = vec![
        RawStory::new("slow", "Slow").with_url("https://slow.example/"),
        RawStory::new("b", "B").with_url("https://b.example/"),
        RawStory::new("c", "C").with_url("https://c.example/"),
    ];
    let resolver = MapResolver::new()
        .blocked("https://slow.example/")
        .page("https://b.example/", "B text")
        .page("https://c.example/", "C text");

    let orchestrator = Orchestrator::new(
        temp.path(),
        deps(
            FixedLister::new(stories),
            Arc::new(resolver),
            ResetPolicy::RetainTopic,
        ),
    );

    let job = orchestrator.start_or_attach("concurrent").await.unwrap();
    job.set_topic("rust").await.unwrap();

    let previews = wait_for_previews(&job, 2).await;
    assert_eq!(previews.get("b").map(String::as_str), Some("B text"));
    assert_eq!(previews.get("c").map(String::as_str), Some("C text"));
    assert!(!previews.contains_key("slow"));

    job.update_story_summary(SummaryInput::new("b", "SB"))
        .await
        .unwrap();
    assert_eq!(wait_for_summary(&job, "b").await, "SB");
    assert!(!job.get_final_result_ready());

    // Queries keep answering while a pipeline is stuck
    let partial = job.get_final_result().unwrap();
    assert_eq!(partial.len(), 3);
    assert!(partial.iter().find(|s| s.id == "slow").unwrap().summary.is_none());

    orchestrator.shutdown().await;
}
