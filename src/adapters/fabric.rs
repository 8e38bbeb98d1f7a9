//! Fabric summarizer.
//!
//! Runs the `fabric` CLI in subprocess mode with a summarization pattern,
//! piping the story preview to stdin and reading the summary from stdout.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::Summarizer;

/// Default Fabric pattern used for summaries
pub const DEFAULT_PATTERN: &str = "summarize";

/// Summarizer backed by the Fabric CLI
pub struct FabricSummarizer {
    /// Path to the fabric binary (default: "fabric")
    binary_path: String,

    /// Pattern to run
    pattern: String,

    /// Per-summary timeout
    timeout: Duration,
}

impl FabricSummarizer {
    /// Create a summarizer with the default binary path
    ///
    /// Looks for fabric-ai first (Homebrew install), falls back to fabric
    pub fn new(pattern: impl Into<String>, timeout: Duration) -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .output()
            .is_ok()
        {
            "fabric-ai".to_string()
        } else {
            "fabric".to_string()
        };

        Self {
            binary_path,
            pattern: pattern.into(),
            timeout,
        }
    }

    /// Create a summarizer with a custom binary path
    pub fn with_binary_path(
        binary_path: impl Into<String>,
        pattern: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            pattern: pattern.into(),
            timeout,
        }
    }

    /// Run the pattern via subprocess
    async fn execute_subprocess(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.binary_path)
            .args(["-p", self.pattern.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!("Failed to spawn fabric process for pattern '{}'", self.pattern)
            })?;

        // Write input to stdin
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .context("Failed to write to fabric stdin")?;
            // Drop stdin to signal EOF
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Fabric pattern '{}' timed out after {:?}",
                    self.pattern, self.timeout
                )
            })?
            .with_context(|| {
                format!("Failed to wait for fabric process for pattern '{}'", self.pattern)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Fabric pattern '{}' failed with exit code {}: {}",
                self.pattern,
                exit_code,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8(output.stdout).context("Fabric output is not valid UTF-8")?;

        Ok(stdout.trim().to_string())
    }
}

#[async_trait]
impl Summarizer for FabricSummarizer {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn summarize(&self, story_id: &str, preview: &str) -> Result<String> {
        debug!(story_id, bytes = preview.len(), pattern = %self.pattern, "Summarizing");
        let summary = self.execute_subprocess(preview).await?;

        if summary.is_empty() {
            anyhow::bail!("Fabric returned an empty summary for story {}", story_id);
        }

        Ok(summary)
    }
}
