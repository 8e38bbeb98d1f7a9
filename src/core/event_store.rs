//! Append-only job event store with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL) for simplicity
//! and easy debugging/inspection. Each job gets its own directory named
//! after a hash of its identity:
//!
//! ```text
//! <root>/<hash16>/events.jsonl   append-only event log
//! <root>/<hash16>/job.json       identity and creation time
//! <root>/<hash16>/owner.lock     held while a process drives the job
//! ```

use std::fs::OpenOptions as StdOpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::JobEvent;

/// Metadata written once when a job directory is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    pub identity: String,
    pub created_at: DateTime<Utc>,
}

/// File-based event store for one job
pub struct JobStore {
    /// Directory containing the job
    job_dir: PathBuf,

    /// Path to the events.jsonl file
    events_path: PathBuf,

    /// Owner lock, held for as long as this store lives
    owner: Option<std::fs::File>,
}

impl JobStore {
    /// Create or open the store for a job
    pub async fn open(root: &Path, identity: &str) -> Result<Self> {
        let job_dir = root.join(hash_input(identity));

        fs::create_dir_all(&job_dir)
            .await
            .with_context(|| format!("Failed to create job directory: {}", job_dir.display()))?;

        let meta_path = job_dir.join("job.json");
        if !meta_path.exists() {
            let meta = JobMeta {
                identity: identity.to_string(),
                created_at: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&meta).context("Failed to serialize job metadata")?;
            fs::write(&meta_path, json)
                .await
                .with_context(|| format!("Failed to write job metadata: {}", meta_path.display()))?;
        }

        let events_path = job_dir.join("events.jsonl");

        Ok(Self {
            job_dir,
            events_path,
            owner: None,
        })
    }

    /// Get the path to the events file
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Get the job directory
    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// Try to become the only process driving this job.
    ///
    /// Returns `false` when another owner holds the lock. The lock is
    /// released when the store is dropped.
    pub fn try_acquire(&mut self) -> Result<bool> {
        if self.owner.is_some() {
            return Ok(true);
        }

        let lock_path = self.job_dir.join("owner.lock");
        let file = StdOpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                self.owner = Some(file);
                Ok(true)
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(false),
            Err(e) => Err(e).context("Failed to acquire job owner lock"),
        }
    }

    /// Append an event to the log
    pub async fn append(&self, event: &JobEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<JobEvent>> {
        replay_file(&self.events_path).await
    }

    /// Check whether an event with this idempotency key was recorded
    pub async fn is_recorded(&self, idempotency_key: &str) -> Result<bool> {
        let events = self.replay().await?;
        Ok(events.iter().any(|e| e.idempotency_key == idempotency_key))
    }

    /// Replay a job without opening (or creating) its store
    pub async fn replay_job(root: &Path, identity: &str) -> Result<Vec<JobEvent>> {
        replay_file(&root.join(hash_input(identity)).join("events.jsonl")).await
    }

    /// List the metadata of every job under `root`
    pub async fn list_jobs(root: &Path) -> Result<Vec<JobMeta>> {
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let meta_path = entry.path().join("job.json");
            let Ok(content) = fs::read_to_string(&meta_path).await else {
                continue;
            };
            match serde_json::from_str::<JobMeta>(&content) {
                Ok(meta) => jobs.push(meta),
                Err(e) => tracing::warn!(path = %meta_path.display(), error = %e, "Skipping unreadable job metadata"),
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

async fn replay_file(events_path: &Path) -> Result<Vec<JobEvent>> {
    if !events_path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(events_path)
        .await
        .with_context(|| format!("Failed to open events file: {}", events_path.display()))?;

    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut events = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: JobEvent =
            serde_json::from_str(&line).with_context(|| format!("Failed to parse event: {}", line))?;
        events.push(event);
    }

    Ok(events)
}

/// Hash input content (first 16 hex chars of SHA256)
pub fn hash_input(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
