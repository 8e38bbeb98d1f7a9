//! Driving loop.
//!
//! Watches a job's snapshots, summarizes every pending preview with the
//! configured summarizer and pushes the summaries back until the job is
//! ready. A failed summary becomes the "not available" placeholder so the
//! job still completes.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::adapters::Summarizer;
use crate::domain::{Story, SUMMARY_NOT_AVAILABLE};

use super::job::{JobError, JobHandle, SummaryInput};

/// Driving loop settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum summaries in flight
    pub concurrency: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// A finished summary, tagged with the cycle it belongs to
struct Summarized {
    generation: u64,
    story_id: String,
    summary: String,
}

/// Drive `job` to readiness and return its final result
#[instrument(skip_all, fields(job = %job.identity()))]
pub async fn drive(
    job: &JobHandle,
    summarizer: Arc<dyn Summarizer>,
    config: &DriverConfig,
) -> Result<Vec<Story>, JobError> {
    let mut snapshots = job.subscribe();
    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut requested: HashSet<(u64, String)> = HashSet::new();
    let mut tasks: JoinSet<Summarized> = JoinSet::new();

    loop {
        let snapshot = snapshots.borrow_and_update().clone();

        if snapshot.ready {
            info!(stories = snapshot.stories.len(), "Job ready");
            return Ok(snapshot.stories);
        }
        if let Some(failure) = snapshot.failure {
            return Err(JobError::ListingFailed(failure));
        }

        // A reset moves the job to a new generation; forget the old one
        requested.retain(|(generation, _)| *generation == snapshot.generation);

        for (story_id, preview) in snapshot.previews {
            if !requested.insert((snapshot.generation, story_id.clone())) {
                continue;
            }

            let summarizer = Arc::clone(&summarizer);
            let permits = Arc::clone(&permits);
            let generation = snapshot.generation;

            tasks.spawn(async move {
                let summary = summarize(summarizer.as_ref(), &permits, &story_id, &preview).await;
                Summarized {
                    generation,
                    story_id,
                    summary,
                }
            });
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err(JobError::Stopped);
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                let done = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        warn!(error = %e, "Summary task failed");
                        continue;
                    }
                };

                let input = SummaryInput::new(done.story_id.clone(), done.summary)
                    .for_generation(done.generation);

                match job.update_story_summary(input).await {
                    Ok(()) => debug!(story_id = %done.story_id, "Summary delivered"),
                    Err(e @ (JobError::NoPendingPreview(_) | JobError::StaleGeneration { .. })) => {
                        debug!(story_id = %done.story_id, error = %e, "Summary no longer needed");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

/// Summarize one preview; any failure yields the placeholder
async fn summarize(
    summarizer: &dyn Summarizer,
    permits: &Semaphore,
    story_id: &str,
    preview: &str,
) -> String {
    let Ok(_permit) = permits.acquire().await else {
        return SUMMARY_NOT_AVAILABLE.to_string();
    };

    let outcome = AssertUnwindSafe(summarizer.summarize(story_id, preview))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            warn!(story_id, summarizer = summarizer.name(), error = %e, "Summarizer failed");
            SUMMARY_NOT_AVAILABLE.to_string()
        }
        Err(_) => {
            warn!(story_id, summarizer = summarizer.name(), "Summarizer panicked");
            SUMMARY_NOT_AVAILABLE.to_string()
        }
    }
}
