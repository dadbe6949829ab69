//! Core API rate limit guard.
//!
//! Mutating calls on the hosting side (forks, pull requests, labels) are
//! preceded by a check of the core quota. When the quota is nearly spent the
//! caller sleeps until the window resets.

use octocrab::Octocrab;
use std::time::Duration;
use tracing::{info, warn};

/// Longest sleep waiting for a reset.
const MAX_WAIT_SECS: u64 = 3600;

/// Remaining requests below which we wait for the reset.
const MIN_REMAINING_THRESHOLD: u32 = 5;

/// Quota of the core API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u32,
    /// Unix timestamp when the window resets.
    pub reset: u64,
    pub limit: u32,
}

impl RateLimitInfo {
    /// Seconds to sleep at `now`, or `None` when there is enough quota left.
    #[must_use]
    pub fn wait_at(&self, now: u64) -> Option<u64> {
        if self.remaining >= MIN_REMAINING_THRESHOLD || self.reset <= now {
            return None;
        }
        Some((self.reset - now).min(MAX_WAIT_SECS))
    }
}

/// Fetches the core API quota.
///
/// # Errors
///
/// Returns an error if the rate limit API call fails.
pub async fn check_core_rate_limit(octocrab: &Octocrab) -> Result<RateLimitInfo, octocrab::Error> {
    let rate_limit = octocrab.ratelimit().get().await?;
    let core = &rate_limit.resources.core;

    Ok(RateLimitInfo {
        remaining: core.remaining as u32,
        reset: core.reset,
        limit: core.limit as u32,
    })
}

/// Sleeps until the reset when the quota is low. Returns true if it slept.
pub async fn wait_if_needed(info: &RateLimitInfo) -> bool {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let Some(wait_secs) = info.wait_at(now) else {
        return false;
    };
    if info.reset - now > MAX_WAIT_SECS {
        warn!(
            reset = info.reset,
            max_wait = MAX_WAIT_SECS,
            "Rate limit reset too far in future, capping wait time"
        );
    }

    info!(
        remaining = info.remaining,
        limit = info.limit,
        wait_secs,
        "Rate limit low, waiting for reset"
    );
    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
    true
}

/// Checks the core quota and waits if it is nearly exhausted.
///
/// # Errors
///
/// Returns an error if the rate limit check fails.
pub async fn ensure_core_rate_limit(octocrab: &Octocrab) -> Result<(), octocrab::Error> {
    let info = check_core_rate_limit(octocrab).await?;
    wait_if_needed(&info).await;
    Ok(())
}
