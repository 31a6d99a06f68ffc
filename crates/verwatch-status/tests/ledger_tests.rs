//! Status Ledger Tests
//!
//! Concurrent access from many tasks: gate exclusivity, fail resets and
//! queue emission counts.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use verwatch_status::{
    ActionKey, DeliveryChannels, FailState, Fails, GateMode, GateOutcome, PersistField, Status,
    SubType,
};

fn ledger(commands: usize, webhooks: &[&str]) -> (Arc<Status>, verwatch_status::DeliveryReceivers) {
    let (channels, rx) = DeliveryChannels::unbounded();
    let status = Status::new("svc").with_channels(channels);
    status.init_fails(Fails::new(commands, webhooks.iter().copied()));
    (Arc::new(status), rx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gate_advances_once() {
    let (status, mut rx) = ledger(1, &["deploy"]);
    status.set_deployed_version("1.0.0", false);
    status.set_latest_version("1.1.0", false);
    status.set_fail(&ActionKey::command(0), FailState::Passed).unwrap();
    status.set_fail(&ActionKey::webhook("deploy"), FailState::Passed).unwrap();

    let tasks = (0..32)
        .map(|_| {
            let status = Arc::clone(&status);
            tokio::spawn(async move { status.gate_transition(GateMode::AdvanceDeployed) })
        })
        .collect::<Vec<_>>();

    let mut advanced = 0;
    for task in tasks {
        match task.await.unwrap() {
            GateOutcome::Advanced => advanced += 1,
            outcome => assert_eq!(outcome, GateOutcome::AlreadyAdvanced),
        }
    }

    assert_eq!(advanced, 1);
    assert_eq!(status.deployed_version(), "1.1.0");
    let updates = rx
        .drain_announce()
        .into_iter()
        .filter(|m| m.sub_type == SubType::Updated)
        .count();
    assert_eq!(updates, 1);
}

#[tokio::test]
async fn test_gate_blocked_until_every_action_passes() {
    let (status, _rx) = ledger(2, &[]);
    status.set_deployed_version("1.0.0", false);
    status.set_latest_version("1.1.0", false);

    status.set_fail(&ActionKey::command(0), FailState::Passed).unwrap();
    assert_eq!(status.gate_transition(GateMode::AdvanceDeployed), GateOutcome::Blocked);

    status.set_fail(&ActionKey::command(1), FailState::Passed).unwrap();
    assert_eq!(status.gate_transition(GateMode::AdvanceDeployed), GateOutcome::Advanced);
}

#[tokio::test]
async fn test_version_change_resets_fails() {
    let (status, _rx) = ledger(1, &["deploy"]);
    status.set_latest_version("1.0.0", false);
    status.set_fail(&ActionKey::command(0), FailState::Failed).unwrap();
    status.set_fail(&ActionKey::webhook("deploy"), FailState::Passed).unwrap();

    status.set_latest_version("1.1.0", false);

    assert_eq!(status.fail(&ActionKey::command(0)), Some(FailState::NotRun));
    assert_eq!(status.fail(&ActionKey::webhook("deploy")), Some(FailState::NotRun));
}

#[tokio::test]
async fn test_unknown_action_key_rejected() {
    let (status, _rx) = ledger(1, &[]);
    assert!(status.set_fail(&ActionKey::command(3), FailState::Passed).is_err());
    assert!(status.set_fail(&ActionKey::webhook("nope"), FailState::Passed).is_err());
}

#[tokio::test]
async fn test_persist_only_when_requested_and_changed() {
    let (status, mut rx) = ledger(0, &[]);

    assert!(status.set_latest_version("1.0.0", true));
    assert!(!status.set_latest_version("1.0.0", true));
    assert!(status.set_deployed_version("0.9.0", false));

    let persisted = rx.drain_persist();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].cell(PersistField::LatestVersion), Some("1.0.0"));
    assert!(persisted[0].cell(PersistField::DeployedVersion).is_none());
}

#[tokio::test]
async fn test_deleting_drops_nothing_already_queued() {
    let (status, mut rx) = ledger(0, &[]);
    status.set_latest_version("1.0.0", true);
    status.persist_delete();
    status.set_deleting();

    assert!(status.is_deleting());
    let persisted = rx.drain_persist();
    assert_eq!(persisted.len(), 2);
    assert!(persisted[1].delete);
}
