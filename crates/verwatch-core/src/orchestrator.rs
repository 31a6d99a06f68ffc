//! Update-action orchestrator
//!
//! Runs when the latest version changes or a user acts on a service:
//! - Notifications fire first and never gate anything
//! - No actions: the version is accepted immediately
//! - Auto-approve: every Command and WebHook is dispatched concurrently
//! - Otherwise: announce that the version waits for approval
//!
//! Every successful batch re-attempts the version gate, which is a
//! no-op once deployed (or approved) matches latest.

use crate::action::{Action, Invocation};
use crate::error::ActionError;
use crate::notify::{send_all, Notification};
use crate::service::Service;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use verwatch_status::{ActionKey, FailState, GateMode, GateOutcome, SKIP_PREFIX};

/// Outcome of one dispatch batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Actions started
    pub attempted: usize,
    /// Started actions that failed
    pub failed: usize,
    /// Actions left alone because their floor had not passed
    pub skipped: usize,
    /// Started actions whose result was dropped because latest moved on
    pub superseded: usize,
}

impl DispatchReport {
    /// Whether every started action passed for the version it ran for
    #[inline]
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.superseded == 0
    }
}

/// Result of one action run as seen by the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Passed,
    Failed,
    Superseded,
}

/// Handle a new latest version
pub async fn handle_update_actions(service: Arc<Service>) {
    let status = service.status();

    if !service.notifiers().is_empty() {
        let notify = Arc::clone(&service);
        tokio::spawn(async move {
            let note = Notification::release(notify.id(), notify.status().latest_version());
            send_all(notify.notifiers(), &note, notify.ctx()).await;
        });
    }

    if !service.has_actions() {
        updated_version(&service);
        return;
    }

    if !service.options().auto_approve {
        tracing::info!(
            service = service.id(),
            version = %status.latest_version(),
            "waiting for approval"
        );
        status.announce_query_new_version();
        return;
    }

    tracing::info!(
        service = service.id(),
        version = %status.latest_version(),
        "auto-approved, dispatching actions"
    );
    let commands = service.command_keys();
    let webhooks = service.webhook_keys();
    let (command_report, webhook_report) = futures::join!(
        dispatch(&service, &commands, true),
        dispatch(&service, &webhooks, true)
    );
    if !commands.is_empty() && command_report.all_passed() {
        updated_version(&service);
    }
    if !webhooks.is_empty() && webhook_report.all_passed() {
        updated_version(&service);
    }
}

/// Attempt the version transition
///
/// With a deployed-version lookup only the approval moves; without
/// one deployed is set to latest.
pub fn updated_version(service: &Service) -> GateOutcome {
    let mode = if service.has_deployed_lookup() {
        GateMode::ApproveOnly
    } else {
        GateMode::AdvanceDeployed
    };
    let outcome = service.status().gate_transition(mode);
    match outcome {
        GateOutcome::Advanced => tracing::info!(
            service = service.id(),
            version = %service.status().deployed_version(),
            "updated"
        ),
        GateOutcome::Approved => tracing::info!(
            service = service.id(),
            version = %service.status().approved_version(),
            "approved"
        ),
        GateOutcome::Blocked => {
            tracing::debug!(service = service.id(), "version gate blocked by unpassed actions");
        }
        GateOutcome::AlreadyAdvanced | GateOutcome::Unchanged => {}
    }
    outcome
}

/// Skip the current latest version
///
/// Returns false (and emits nothing) when deployed already matches
/// latest or the service is being deleted.
pub fn handle_skip(service: &Service) -> bool {
    let status = service.status();
    if status.is_deleting() {
        return false;
    }
    let latest = status.latest_version();
    if latest.is_empty() || status.deployed_version() == latest {
        return false;
    }
    tracing::info!(service = service.id(), version = %latest, "skipped");
    status.set_approved_version(&format!("{SKIP_PREFIX}{latest}"), true);
    true
}

/// Run one Command by index
///
/// Respects its floor. Returns true if it ran and passed.
pub async fn handle_command(service: &Arc<Service>, index: usize) -> bool {
    handle_single(service, ActionKey::Command(index)).await
}

/// Run one WebHook by name
///
/// Respects its floor. Returns true if it ran and passed.
pub async fn handle_webhook(service: &Arc<Service>, name: &str) -> bool {
    handle_single(service, ActionKey::webhook(name)).await
}

async fn handle_single(service: &Arc<Service>, key: ActionKey) -> bool {
    if service.action(&key).is_none() {
        tracing::warn!(service = service.id(), action = %key, "unknown action");
        return false;
    }
    let report = dispatch(service, std::slice::from_ref(&key), false).await;
    let passed = report.attempted == 1 && report.all_passed();
    if passed {
        updated_version(service);
    }
    passed
}

/// Dispatch actions concurrently and wait for their results
///
/// Actions not yet runnable are skipped and not waited on. Successive
/// dispatches are staggered by a random 100-250ms. Each run records its
/// own fails cell and floor.
pub async fn dispatch(service: &Arc<Service>, keys: &[ActionKey], use_delay: bool) -> DispatchReport {
    let timing = service.ctx().timing().clone();
    let (tx, mut rx) = mpsc::channel::<RunOutcome>(keys.len().max(1));
    let mut report = DispatchReport::default();

    for key in keys {
        let Some(action) = service.action(key).map(Arc::clone) else {
            tracing::warn!(service = service.id(), action = %key, "unknown action");
            continue;
        };
        let delay = if use_delay { action.delay() } else { std::time::Duration::ZERO };
        if !action.gate().try_claim(timing.executing_floor.saturating_add(delay)) {
            tracing::debug!(
                service = service.id(),
                action = %key,
                next_runnable = %action.next_runnable(),
                "not runnable yet"
            );
            report.skipped += 1;
            continue;
        }

        if report.attempted > 0 {
            tokio::time::sleep(timing.dispatch_stagger()).await;
        }
        report.attempted += 1;

        let tx = tx.clone();
        let service = Arc::clone(service);
        tokio::spawn(async move {
            let outcome = run_action(&service, action, use_delay).await;
            let _ = tx.send(outcome).await;
        });
    }
    drop(tx);

    let mut received = 0;
    while received < report.attempted {
        match rx.recv().await {
            Some(RunOutcome::Passed) => {}
            Some(RunOutcome::Failed) => report.failed += 1,
            Some(RunOutcome::Superseded) => report.superseded += 1,
            None => {
                report.failed += report.attempted - received;
                break;
            }
        }
        received += 1;
    }
    report
}

fn failure_title(key: &ActionKey) -> &'static str {
    match key {
        ActionKey::Command(_) => "Command failed",
        ActionKey::WebHook(_) => "WebHook fail",
    }
}

/// Run a claimed action and record its result
///
/// The result is only recorded if latest is still the version the
/// action ran for; otherwise it is dropped and the claim released.
async fn run_action(service: &Service, action: Arc<dyn Action>, use_delay: bool) -> RunOutcome {
    let status = service.status();
    let key = action.key();

    let delay = action.delay();
    if use_delay && !delay.is_zero() {
        tracing::debug!(service = service.id(), action = %key, ?delay, "delaying");
        tokio::time::sleep(delay).await;
    }

    let version = status.latest_version();
    let result = if status.is_deleting() {
        Err(ActionError::Deleting)
    } else {
        let invocation = Invocation {
            service_id: service.id(),
            version: &version,
            status,
            ctx: service.ctx(),
        };
        action.run(&invocation).await
    };
    let passed = result.is_ok();

    match status.set_fail_for(&key, FailState::from_outcome(passed), &version) {
        Ok(true) => {}
        Ok(false) => {
            action.gate().set_next_runnable(Utc::now());
            tracing::warn!(
                service = service.id(),
                action = %key,
                version = %version,
                latest = %status.latest_version(),
                "latest version changed during run, result dropped"
            );
            return RunOutcome::Superseded;
        }
        Err(err) => {
            tracing::warn!(service = service.id(), action = %key, error = %err, "result not recorded");
        }
    }
    let next_runnable = action
        .gate()
        .finish(passed, service.options().interval, service.ctx().timing());
    status.announce_action(key.clone(), next_runnable);

    match result {
        Ok(()) => {
            tracing::info!(service = service.id(), action = %key, version = %version, "action passed");
        }
        Err(ActionError::Deleting) => {
            tracing::debug!(service = service.id(), action = %key, "aborted, service deleting");
        }
        Err(err) => {
            tracing::error!(service = service.id(), action = %key, version = %version, error = %err, "action failed");
            if !action.silent_fails() && !service.notifiers().is_empty() {
                let note = Notification::failure(
                    service.id(),
                    version.as_str(),
                    failure_title(&key),
                    err.to_string(),
                );
                send_all(service.notifiers(), &note, service.ctx()).await;
            }
        }
    }
    if passed {
        RunOutcome::Passed
    } else {
        RunOutcome::Failed
    }
}
