//! Job settings: listing page, timeouts, retry and reset policy.
//!
//! Settings can be embedded in the config file under `job:`; every field
//! has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ResetPolicy;

/// Tunables shared by every job of a registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Stories per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Listing page to fetch
    #[serde(default)]
    pub page: u32,

    /// Timeout for one listing attempt
    #[serde(default = "default_listing_timeout")]
    pub listing_timeout_seconds: u64,

    /// Timeout for the headless render of one URL
    #[serde(default = "default_render_timeout")]
    pub render_timeout_seconds: u64,

    /// Timeout for the plain fetch of one URL
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,

    /// Retry policy for the listing fetch
    #[serde(default)]
    pub listing_retry: RetryPolicy,

    /// What a reset does to the topic
    #[serde(default)]
    pub reset_policy: ResetPolicy,
}

fn default_page_size() -> u32 {
    100
}
fn default_listing_timeout() -> u64 {
    40
}
fn default_render_timeout() -> u64 {
    45
}
fn default_fetch_timeout() -> u64 {
    30
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            page: 0,
            listing_timeout_seconds: default_listing_timeout(),
            render_timeout_seconds: default_render_timeout(),
            fetch_timeout_seconds: default_fetch_timeout(),
            listing_retry: RetryPolicy::default(),
            reset_policy: ResetPolicy::default(),
        }
    }
}

impl JobSettings {
    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_seconds)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// Retry policy for failed external calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    2000
}
fn default_max_delay() -> u64 {
    60000
}
fn default_backoff_multiplier() -> f64 {
    1.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
