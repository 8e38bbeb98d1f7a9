//! Job registry.
//!
//! Maps stable job identities to running job actors. Starting a job that
//! is already live in this process attaches to it; otherwise the job's
//! store is opened, its owner lock taken and its history replayed before
//! the actor resumes unfinished work.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::domain::{JobEvent, JobEventKind, JobSnapshot, JobState};

use super::event_store::{JobMeta, JobStore};
use super::job::{self, JobDeps, JobError, JobHandle};

/// Start-or-attach registry for jobs under one root directory
pub struct Orchestrator {
    /// Directory holding one subdirectory per job
    root: PathBuf,

    /// Collaborators handed to every job
    deps: JobDeps,

    /// Live jobs of this process, by identity
    jobs: Mutex<HashMap<String, JobHandle>>,
}

impl Orchestrator {
    /// Create a registry rooted at `root`
    pub fn new(root: impl Into<PathBuf>, deps: JobDeps) -> Self {
        Self {
            root: root.into(),
            deps,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the live job for `identity`, or resume/create it
    #[instrument(skip(self))]
    pub async fn start_or_attach(&self, identity: &str) -> Result<JobHandle, JobError> {
        let mut jobs = self.jobs.lock().await;

        if let Some(handle) = jobs.get(identity) {
            if !handle.is_closed() {
                debug!("Attaching to live job");
                return Ok(handle.clone());
            }
            jobs.remove(identity);
        }

        let mut store = JobStore::open(&self.root, identity)
            .await
            .map_err(JobError::store)?;

        if !store.try_acquire().map_err(JobError::store)? {
            return Err(JobError::Locked(identity.to_string()));
        }

        let events = store.replay().await.map_err(JobError::store)?;
        let state = match JobState::from_events(&events) {
            Some(state) => {
                info!(
                    events = events.len(),
                    generation = state.generation,
                    phase = %state.phase(),
                    "Resuming job"
                );
                state
            }
            None => {
                let created = JobEvent::job(
                    0,
                    JobEventKind::JobCreated {
                        identity: identity.to_string(),
                    },
                );
                store.append(&created).await.map_err(JobError::store)?;
                info!("Created job");

                let mut state = JobState::new(identity);
                state.apply_event(&created);
                state
            }
        };

        let handle = job::spawn(state, store, self.deps.clone());
        jobs.insert(identity.to_string(), handle.clone());
        Ok(handle)
    }

    /// Current snapshot of a job. Live jobs answer from memory; others are
    /// replayed from disk without being attached.
    pub async fn job_status(&self, identity: &str) -> Result<Option<JobSnapshot>> {
        if let Some(handle) = self.jobs.lock().await.get(identity) {
            if !handle.is_closed() {
                return Ok(Some(handle.snapshot()));
            }
        }

        let events = JobStore::replay_job(&self.root, identity).await?;
        Ok(JobState::from_events(&events).map(|state| state.snapshot()))
    }

    /// Metadata of every job under the root, newest first
    pub async fn list_jobs(&self) -> Result<Vec<JobMeta>> {
        JobStore::list_jobs(&self.root).await
    }

    /// Stop every live job and wait until their owner locks are released
    pub async fn shutdown(&self) {
        let handles: Vec<JobHandle> = self.jobs.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.stop().await;
        }
    }
}
