//! Shared runtime context
//!
//! Threaded through every service instead of process-wide globals:
//! - HTTP clients (strict and invalid-cert tolerant)
//! - Timing constants for warm-up, staggering and retries

use crate::error::QueryError;
use rand::Rng;
use std::time::Duration;

/// User agent sent on every request
pub const USER_AGENT: &str = concat!("verwatch/", env!("CARGO_PKG_VERSION"));

/// Timing knobs for the tracking loop and dispatchers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Wait before the first deployed-version poll
    pub deployed_warmup: Duration,
    /// Gap between service starts
    pub service_stagger: Duration,
    /// Minimum gap between dispatches in one batch
    pub dispatch_stagger_min: Duration,
    /// Maximum gap between dispatches in one batch
    pub dispatch_stagger_max: Duration,
    /// Pause between WebHook tries
    pub webhook_backoff: Duration,
    /// Per-request timeout for WebHooks and notifiers
    pub request_timeout: Duration,
    /// Floor after a failed action
    pub failed_floor: Duration,
    /// Floor while an action is running
    pub executing_floor: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            deployed_warmup: Duration::from_secs(2),
            service_stagger: Duration::from_millis(500),
            dispatch_stagger_min: Duration::from_millis(100),
            dispatch_stagger_max: Duration::from_millis(250),
            webhook_backoff: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            failed_floor: Duration::from_secs(15),
            executing_floor: Duration::from_secs(3600),
        }
    }
}

impl Timing {
    /// Random gap between dispatches
    #[must_use]
    pub fn dispatch_stagger(&self) -> Duration {
        let min = u64::try_from(self.dispatch_stagger_min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.dispatch_stagger_max.as_millis()).unwrap_or(u64::MAX);
        if max <= min {
            return self.dispatch_stagger_min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Runtime handles shared by every service
#[derive(Debug, Clone)]
pub struct WatchContext {
    http: reqwest::Client,
    insecure_http: reqwest::Client,
    timing: Timing,
}

impl WatchContext {
    /// Create new context with default timing
    ///
    /// # Errors
    /// - `QueryError::Client` if the TLS backend fails to initialise
    pub fn new() -> Result<Self, QueryError> {
        Self::with_timing(Timing::default())
    }

    /// Create new context with custom timing
    ///
    /// # Errors
    /// - `QueryError::Client` if the TLS backend fails to initialise
    pub fn with_timing(timing: Timing) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| QueryError::Client(e.to_string()))?;
        let insecure_http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| QueryError::Client(e.to_string()))?;
        Ok(Self {
            http,
            insecure_http,
            timing,
        })
    }

    /// HTTP client, tolerant of invalid certificates if asked
    #[inline]
    #[must_use]
    pub fn http(&self, allow_invalid_certs: bool) -> &reqwest::Client {
        if allow_invalid_certs {
            &self.insecure_http
        } else {
            &self.http
        }
    }

    /// Timing knobs
    #[inline]
    #[must_use]
    pub fn timing(&self) -> &Timing {
        &self.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stagger_within_bounds() {
        let timing = Timing::default();
        for _ in 0..100 {
            let gap = timing.dispatch_stagger();
            assert!(gap >= Duration::from_millis(100));
            assert!(gap <= Duration::from_millis(250));
        }
    }

    #[test]
    fn stagger_degenerate_range() {
        let timing = Timing {
            dispatch_stagger_min: Duration::from_millis(10),
            dispatch_stagger_max: Duration::from_millis(10),
            ..Timing::default()
        };
        assert_eq!(timing.dispatch_stagger(), Duration::from_millis(10));
    }

    #[test]
    fn context_builds() {
        let ctx = WatchContext::new().unwrap();
        assert_eq!(ctx.timing(), &Timing::default());
    }
}
