//! Commands and WebHooks
//!
//! Each action owns a [`RunGate`] holding its rate-limit floor and is
//! addressed in the fails table by its [`ActionKey`]. Dispatch, floor
//! bookkeeping and result recording live in the orchestrator; an
//! action only knows how to run once.

mod command;
mod webhook;

pub use command::CommandAction;
pub use webhook::{WebHookAction, WebHookKind};

use crate::context::{Timing, WatchContext};
use crate::error::{ActionError, ConfigErrors};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;
use verwatch_filter::TemplateContext;
use verwatch_status::{ActionKey, Status};

/// Add a std duration to a timestamp, saturating
#[must_use]
pub fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Rate-limit floor of one action
#[derive(Debug)]
pub struct RunGate {
    next_runnable: RwLock<DateTime<Utc>>,
}

impl Default for RunGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RunGate {
    /// Create new gate, runnable immediately
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_runnable: RwLock::new(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    /// Whether the floor has passed
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        Utc::now() >= *self.next_runnable.read()
    }

    /// Current floor
    #[must_use]
    pub fn next_runnable(&self) -> DateTime<Utc> {
        *self.next_runnable.read()
    }

    /// Set the floor
    pub fn set_next_runnable(&self, at: DateTime<Utc>) {
        *self.next_runnable.write() = at;
    }

    /// Claim the gate for a run if runnable
    ///
    /// Pushes the floor out by `hold` so a concurrent dispatcher cannot
    /// start the same action. Returns false if not runnable.
    pub fn try_claim(&self, hold: Duration) -> bool {
        let now = Utc::now();
        let mut floor = self.next_runnable.write();
        if now < *floor {
            return false;
        }
        *floor = add_duration(now, hold);
        true
    }

    /// Set the floor after a run finished
    ///
    /// Pass: `now + 2 × interval`. Fail: `now + timing.failed_floor`.
    pub fn finish(&self, passed: bool, interval: Duration, timing: &Timing) -> DateTime<Utc> {
        let hold = if passed {
            interval.saturating_mul(2)
        } else {
            timing.failed_floor
        };
        let at = add_duration(Utc::now(), hold);
        self.set_next_runnable(at);
        at
    }
}

/// Everything an action may read while running
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Owning service
    pub service_id: &'a str,
    /// Version the action is run for
    pub version: &'a str,
    /// Owning service's status (deletion flag)
    pub status: &'a Status,
    /// Shared runtime context
    pub ctx: &'a WatchContext,
}

impl Invocation<'_> {
    /// Template values
    #[must_use]
    pub fn template(&self) -> TemplateContext<'_> {
        TemplateContext::new(self.service_id, self.version)
    }
}

/// A Command or WebHook
#[async_trait]
pub trait Action: Send + Sync + fmt::Debug {
    /// Fails-table address
    fn key(&self) -> ActionKey;

    /// Rate-limit floor
    fn gate(&self) -> &RunGate;

    /// Whether `now >= next_runnable`
    fn is_runnable(&self) -> bool {
        self.gate().is_runnable()
    }

    /// Current floor
    fn next_runnable(&self) -> DateTime<Utc> {
        self.gate().next_runnable()
    }

    /// Set the floor
    fn set_next_runnable(&self, at: DateTime<Utc>) {
        self.gate().set_next_runnable(at);
    }

    /// Wait before an auto-approved run
    fn delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Suppress the failure notification
    fn silent_fails(&self) -> bool {
        false
    }

    /// Identity of the definition, equal fingerprints carry fail state
    /// across a service edit
    fn fingerprint(&self) -> String;

    /// Validate configuration, paths are prefixed with `prefix`
    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let _ = prefix;
        ConfigErrors::new()
    }

    /// Run once
    ///
    /// # Errors
    /// - `ActionError` describing why the run failed
    async fn run(&self, invocation: &Invocation<'_>) -> Result<(), ActionError>;
}
