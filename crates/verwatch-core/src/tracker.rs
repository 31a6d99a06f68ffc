//! Tracking loop
//!
//! One long-lived task per active service. Each cycle queries the
//! latest-version source, applies the semantic-version gate, writes a
//! new version into the status and hands it to the orchestrator without
//! waiting for it. The deletion flag is checked at the top of every
//! cycle; nothing is force-cancelled.

use crate::deployed::{reconcile_deployed, DeployedVersionSource};
use crate::error::{QueryError, WatchError};
use crate::orchestrator::handle_update_actions;
use crate::service::Service;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use verwatch_filter::{check_progression, FilterError};

/// What a single check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// First version ever found, no actions dispatched
    FirstVersion(String),
    /// Latest version unchanged
    Unchanged,
    /// New latest version, orchestrator started
    NewVersion(String),
}

/// Spawn the tracking loop for a service
pub fn spawn_tracker(service: Arc<Service>) -> JoinHandle<()> {
    tokio::spawn(track(service))
}

/// Run the tracking loop until the service is deleted
///
/// Returns at once if the service has no latest-version source or is
/// inactive.
pub async fn track(service: Arc<Service>) {
    if service.latest_source().is_none() {
        tracing::debug!(service = service.id(), "no latest_version source, not tracking");
        return;
    }
    if !service.options().active {
        tracing::debug!(service = service.id(), "inactive, not tracking");
        return;
    }

    if let Some(lookup) = service.deployed_source().map(Arc::clone) {
        tokio::spawn(track_deployed(Arc::clone(&service), lookup));
    }

    let interval = service.options().interval;
    if let Some(remaining) = remaining_interval(&service, interval) {
        tracing::debug!(service = service.id(), ?remaining, "waiting out last interval");
        tokio::time::sleep(remaining).await;
    }

    loop {
        if service.status().is_deleting() || !service.options().active {
            tracing::debug!(service = service.id(), "tracking stopped");
            return;
        }
        if let Err(err) = check_once(&service).await {
            log_check_error(&service, &err);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Time left of the interval that started at the last query
fn remaining_interval(service: &Service, interval: Duration) -> Option<Duration> {
    let last = service.status().last_queried()?;
    let elapsed = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
    interval.checked_sub(elapsed).filter(|d| !d.is_zero())
}

/// Query once and act on the result
///
/// `last_queried` advances whether or not the query succeeded. Nothing
/// else is written on failure.
///
/// # Errors
/// - `WatchError::Query` if the source or the filter pipeline failed
/// - `WatchError::Filter` if the candidate is semantically older or unparsable
pub async fn check_once(service: &Arc<Service>) -> Result<CheckOutcome, WatchError> {
    let status = service.status();
    let source = service
        .latest_source()
        .ok_or_else(|| QueryError::Unavailable("no latest_version source".to_string()))?;

    let result = source.query(false, status, service.ctx()).await;
    status.set_last_queried();
    let version = result?;

    let latest = status.latest_version();
    if version == latest {
        status.announce_query();
        return Ok(CheckOutcome::Unchanged);
    }
    if service.options().semantic_versioning {
        check_progression(&version, &latest)?;
    }
    status.reset_regex_misses();

    if latest.is_empty() {
        status.set_latest_version(&version, true);
        if !service.has_deployed_lookup() && status.deployed_version().is_empty() {
            status.set_deployed_version(&version, true);
        }
        tracing::info!(service = service.id(), version = %version, "latest version (first query)");
        status.announce_first_version();
        return Ok(CheckOutcome::FirstVersion(version));
    }

    status.set_latest_version(&version, true);
    tracing::info!(service = service.id(), version = %version, previous = %latest, "new release");
    status.announce_query();
    tokio::spawn(handle_update_actions(Arc::clone(service)));
    Ok(CheckOutcome::NewVersion(version))
}

fn log_check_error(service: &Service, err: &WatchError) {
    match err {
        // Requirement misses already logged with streak throttling
        WatchError::Query(QueryError::Filter(
            FilterError::VersionRegexMiss(_) | FilterError::ContentRegexMiss { .. },
        )) => tracing::debug!(service = service.id(), error = %err, "query rejected"),
        WatchError::Filter(_) | WatchError::Query(QueryError::Filter(_)) => {
            tracing::warn!(service = service.id(), error = %err, "query rejected");
        }
        _ => tracing::error!(service = service.id(), error = %err, "query failed"),
    }
}

/// Poll the deployed-version lookup until the service is deleted
async fn track_deployed(service: Arc<Service>, lookup: Arc<dyn DeployedVersionSource>) {
    let status = service.status();
    let interval = service.options().interval;
    tokio::time::sleep(service.ctx().timing().deployed_warmup).await;

    loop {
        if status.is_deleting() {
            return;
        }
        let result = match lookup.query(status, service.ctx()).await {
            Ok(version) => {
                reconcile_deployed(status, &version, service.options().semantic_versioning)
            }
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::warn!(service = service.id(), error = %err, "deployed version lookup failed");
        }
        tokio::time::sleep(interval).await;
    }
}
