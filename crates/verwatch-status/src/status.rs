//! Status ledger for one service
//!
//! The only mutable record of a service's versions. Every version write
//! stamps its paired timestamp under the same lock, and a changed latest
//! or deployed version resets the [`Fails`] table. Announce and persist
//! messages are emitted after the lock is released.

use crate::delivery::DeliveryChannels;
use crate::error::StatusError;
use crate::fails::{ActionKey, FailState, Fails};
use crate::message::{
    ActionSummary, AnnounceMessage, PersistField, PersistMessage, StatusSummary, SubType,
};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Prefix of an approved version meaning "skip this one"
pub const SKIP_PREFIX: &str = "SKIP_";

/// A version string and when it last changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct VersionStamp {
    version: String,
    timestamp: Option<DateTime<Utc>>,
}

impl VersionStamp {
    /// Returns true if the value changed
    fn set(&mut self, version: &str, now: DateTime<Utc>) -> bool {
        if self.version == version {
            return false;
        }
        self.version = version.to_string();
        self.timestamp = Some(now);
        true
    }
}

#[derive(Debug, Default)]
struct Ledger {
    approved_version: String,
    latest: VersionStamp,
    deployed: VersionStamp,
    last_queried: Option<DateTime<Utc>>,
    regex_misses_version: u32,
    regex_misses_content: u32,
    fails: Fails,
}

/// How the version gate advances a service whose actions all passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// No deployed-version lookup: copy latest into deployed
    AdvanceDeployed,
    /// Deployed-version lookup present: only mark latest as approved
    ApproveOnly,
}

/// Result of [`Status::gate_transition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Deployed already equals latest
    AlreadyAdvanced,
    /// At least one action has not passed
    Blocked,
    /// Deployed was set to latest
    Advanced,
    /// Approved was set to latest
    Approved,
    /// Nothing to do (already approved, or nothing to approve)
    Unchanged,
}

/// Persisted subset of a [`Status`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Approved (or skipped) version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approved_version: String,
    /// Latest version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub latest_version: String,
    /// When the latest version changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version_timestamp: Option<DateTime<Utc>>,
    /// Deployed version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deployed_version: String,
    /// When the deployed version changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_version_timestamp: Option<DateTime<Utc>>,
}

/// Current state of one service
#[derive(Debug)]
pub struct Status {
    service_id: String,
    ledger: RwLock<Ledger>,
    channels: RwLock<DeliveryChannels>,
    deleting: AtomicBool,
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Status {
    /// Create new empty status with disconnected queues
    #[must_use]
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            ledger: RwLock::new(Ledger::default()),
            channels: RwLock::new(DeliveryChannels::disconnected()),
            deleting: AtomicBool::new(false),
        }
    }

    /// Wire the delivery queues
    #[must_use]
    pub fn with_channels(self, channels: DeliveryChannels) -> Self {
        *self.channels.write() = channels;
        self
    }

    /// Replace the delivery queues
    pub fn set_channels(&self, channels: DeliveryChannels) {
        *self.channels.write() = channels;
    }

    /// Allocate the fails table
    pub fn init_fails(&self, fails: Fails) {
        self.ledger.write().fails = fails;
    }

    /// Service ID
    #[inline]
    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    // ------------------------------------------------------------------
    // Reads

    /// Approved version (may carry [`SKIP_PREFIX`])
    #[must_use]
    pub fn approved_version(&self) -> String {
        self.ledger.read().approved_version.clone()
    }

    /// Latest version
    #[must_use]
    pub fn latest_version(&self) -> String {
        self.ledger.read().latest.version.clone()
    }

    /// When the latest version changed
    #[must_use]
    pub fn latest_version_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ledger.read().latest.timestamp
    }

    /// Deployed version
    #[must_use]
    pub fn deployed_version(&self) -> String {
        self.ledger.read().deployed.version.clone()
    }

    /// When the deployed version changed
    #[must_use]
    pub fn deployed_version_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ledger.read().deployed.timestamp
    }

    /// Last query time
    #[must_use]
    pub fn last_queried(&self) -> Option<DateTime<Utc>> {
        self.ledger.read().last_queried
    }

    /// Consecutive version-regex misses
    #[must_use]
    pub fn regex_misses_version(&self) -> u32 {
        self.ledger.read().regex_misses_version
    }

    /// Consecutive content-regex misses
    #[must_use]
    pub fn regex_misses_content(&self) -> u32 {
        self.ledger.read().regex_misses_content
    }

    /// Copy of the fails table
    #[must_use]
    pub fn fails(&self) -> Fails {
        self.ledger.read().fails.clone()
    }

    /// State of one fails cell
    #[must_use]
    pub fn fail(&self, key: &ActionKey) -> Option<FailState> {
        self.ledger.read().fails.get(key)
    }

    /// Whether deletion has started
    #[inline]
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.deleting.load(Ordering::Acquire)
    }

    /// Every version field
    #[must_use]
    pub fn summary(&self) -> StatusSummary {
        let ledger = self.ledger.read();
        StatusSummary {
            approved_version: Some(ledger.approved_version.clone()),
            latest_version: Some(ledger.latest.version.clone()),
            latest_version_timestamp: ledger.latest.timestamp,
            deployed_version: Some(ledger.deployed.version.clone()),
            deployed_version_timestamp: ledger.deployed.timestamp,
            last_queried: ledger.last_queried,
        }
    }

    /// Persisted subset
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        let ledger = self.ledger.read();
        StatusSnapshot {
            approved_version: ledger.approved_version.clone(),
            latest_version: ledger.latest.version.clone(),
            latest_version_timestamp: ledger.latest.timestamp,
            deployed_version: ledger.deployed.version.clone(),
            deployed_version_timestamp: ledger.deployed.timestamp,
        }
    }

    /// Load persisted state without emitting anything
    pub fn restore(&self, snapshot: StatusSnapshot) {
        let mut ledger = self.ledger.write();
        ledger.approved_version = snapshot.approved_version;
        ledger.latest = VersionStamp {
            version: snapshot.latest_version,
            timestamp: snapshot.latest_version_timestamp,
        };
        ledger.deployed = VersionStamp {
            version: snapshot.deployed_version,
            timestamp: snapshot.deployed_version_timestamp,
        };
    }

    // ------------------------------------------------------------------
    // Version writes

    /// Set the latest version
    ///
    /// Returns true if it changed. A change resets the fails table and,
    /// with `write_to_db`, emits a persist message.
    pub fn set_latest_version(&self, version: &str, write_to_db: bool) -> bool {
        let now = Utc::now();
        let changed = {
            let mut ledger = self.ledger.write();
            let changed = ledger.latest.set(version, now);
            if changed {
                ledger.fails.reset();
            }
            changed
        };
        if changed && write_to_db {
            self.persist([
                (PersistField::LatestVersion, version.to_string()),
                (PersistField::LatestVersionTimestamp, rfc3339(now)),
            ]);
        }
        changed
    }

    /// Set the deployed version
    ///
    /// Returns true if it changed. A change resets the fails table and,
    /// with `write_to_db`, emits a persist message.
    pub fn set_deployed_version(&self, version: &str, write_to_db: bool) -> bool {
        let now = Utc::now();
        let changed = {
            let mut ledger = self.ledger.write();
            let changed = ledger.deployed.set(version, now);
            if changed {
                ledger.fails.reset();
            }
            changed
        };
        if changed && write_to_db {
            self.persist([
                (PersistField::DeployedVersion, version.to_string()),
                (PersistField::DeployedVersionTimestamp, rfc3339(now)),
            ]);
        }
        changed
    }

    /// Set the approved version
    ///
    /// With `write_to_db` the change is persisted and announced as a skip
    /// or an approval depending on [`SKIP_PREFIX`].
    pub fn set_approved_version(&self, version: &str, write_to_db: bool) {
        self.ledger.write().approved_version = version.to_string();
        if write_to_db {
            self.persist([(PersistField::ApprovedVersion, version.to_string())]);
            self.announce_approved(version);
        }
    }

    /// Approve the latest version unless it already is
    ///
    /// Returns true if the approval was recorded (and announced once).
    pub fn approve_latest(&self) -> bool {
        let approved = {
            let mut ledger = self.ledger.write();
            if ledger.approved_version == ledger.latest.version {
                None
            } else {
                ledger.approved_version = ledger.latest.version.clone();
                Some(ledger.approved_version.clone())
            }
        };
        match approved {
            Some(version) => {
                self.persist([(PersistField::ApprovedVersion, version.clone())]);
                self.announce_approved(&version);
                true
            }
            None => false,
        }
    }

    /// Version transition gate
    ///
    /// Checks and writes under one lock so concurrent callers cannot both
    /// advance. Requires every fails cell to have passed.
    pub fn gate_transition(&self, mode: GateMode) -> GateOutcome {
        let now = Utc::now();
        let outcome = {
            let mut ledger = self.ledger.write();
            if ledger.deployed.version == ledger.latest.version {
                return GateOutcome::AlreadyAdvanced;
            }
            if !ledger.fails.all_passed() {
                return GateOutcome::Blocked;
            }
            match mode {
                GateMode::AdvanceDeployed => {
                    let latest = ledger.latest.version.clone();
                    ledger.deployed.set(&latest, now);
                    ledger.fails.reset();
                    GateOutcome::Advanced
                }
                GateMode::ApproveOnly => {
                    if ledger.fails.is_empty() {
                        return GateOutcome::Unchanged;
                    }
                    if ledger.approved_version == ledger.latest.version {
                        GateOutcome::Unchanged
                    } else {
                        ledger.approved_version = ledger.latest.version.clone();
                        GateOutcome::Approved
                    }
                }
            }
        };

        match outcome {
            GateOutcome::Advanced => {
                let deployed = self.deployed_version();
                self.persist([
                    (PersistField::DeployedVersion, deployed),
                    (PersistField::DeployedVersionTimestamp, rfc3339(now)),
                ]);
                self.announce_update();
            }
            GateOutcome::Approved => {
                let approved = self.approved_version();
                self.persist([(PersistField::ApprovedVersion, approved.clone())]);
                self.announce_approved(&approved);
            }
            _ => {}
        }
        outcome
    }

    /// Stamp the last query time
    pub fn set_last_queried(&self) {
        self.ledger.write().last_queried = Some(Utc::now());
    }

    /// Stamp the last query time with an explicit value
    pub fn set_last_queried_at(&self, at: DateTime<Utc>) {
        self.ledger.write().last_queried = Some(at);
    }

    /// Count a version-regex miss, returning the streak length
    pub fn record_version_miss(&self) -> u32 {
        let mut ledger = self.ledger.write();
        ledger.regex_misses_version = ledger.regex_misses_version.saturating_add(1);
        ledger.regex_misses_version
    }

    /// Count a content-regex miss, returning the streak length
    pub fn record_content_miss(&self) -> u32 {
        let mut ledger = self.ledger.write();
        ledger.regex_misses_content = ledger.regex_misses_content.saturating_add(1);
        ledger.regex_misses_content
    }

    /// Reset both miss counters
    pub fn reset_regex_misses(&self) {
        let mut ledger = self.ledger.write();
        ledger.regex_misses_version = 0;
        ledger.regex_misses_content = 0;
    }

    // ------------------------------------------------------------------
    // Fails

    /// Record the outcome of one action
    ///
    /// # Errors
    /// - `StatusError` if the key is not in the table
    pub fn set_fail(&self, key: &ActionKey, state: FailState) -> Result<(), StatusError> {
        self.ledger.write().fails.set(key, state)
    }

    /// Record an action result only if latest is still `version`
    ///
    /// Returns false, leaving the table untouched, when latest moved on
    /// while the action ran.
    ///
    /// # Errors
    /// - `StatusError` if the key is not in the table
    pub fn set_fail_for(
        &self,
        key: &ActionKey,
        state: FailState,
        version: &str,
    ) -> Result<bool, StatusError> {
        let mut ledger = self.ledger.write();
        if ledger.latest.version != version {
            return Ok(false);
        }
        ledger.fails.set(key, state)?;
        Ok(true)
    }

    /// Every cell back to not-run
    pub fn reset_fails(&self) {
        self.ledger.write().fails.reset();
    }

    // ------------------------------------------------------------------
    // Announce

    /// First version ever found
    pub fn announce_first_version(&self) {
        let summary = {
            let ledger = self.ledger.read();
            StatusSummary {
                latest_version: Some(ledger.latest.version.clone()),
                latest_version_timestamp: ledger.latest.timestamp,
                deployed_version: Some(ledger.deployed.version.clone()),
                deployed_version_timestamp: ledger.deployed.timestamp,
                last_queried: ledger.last_queried,
                ..StatusSummary::default()
            }
        };
        self.announce(SubType::Init, summary);
    }

    /// Queried (possibly with a new latest version)
    pub fn announce_query(&self) {
        let summary = {
            let ledger = self.ledger.read();
            StatusSummary {
                latest_version: Some(ledger.latest.version.clone()),
                latest_version_timestamp: ledger.latest.timestamp,
                last_queried: ledger.last_queried,
                ..StatusSummary::default()
            }
        };
        self.announce(SubType::Query, summary);
    }

    /// New version waiting for approval
    pub fn announce_query_new_version(&self) {
        let summary = {
            let ledger = self.ledger.read();
            StatusSummary {
                latest_version: Some(ledger.latest.version.clone()),
                latest_version_timestamp: ledger.latest.timestamp,
                ..StatusSummary::default()
            }
        };
        self.announce(SubType::New, summary);
    }

    /// Deployed version advanced
    pub fn announce_update(&self) {
        let summary = {
            let ledger = self.ledger.read();
            StatusSummary {
                deployed_version: Some(ledger.deployed.version.clone()),
                deployed_version_timestamp: ledger.deployed.timestamp,
                ..StatusSummary::default()
            }
        };
        self.announce(SubType::Updated, summary);
    }

    /// Result of a single action run
    pub fn announce_action(&self, key: ActionKey, next_runnable: DateTime<Utc>) {
        let failed = self.fail(&key).and_then(FailState::as_failed);
        let message = AnnounceMessage::action(
            &self.service_id,
            ActionSummary {
                key,
                failed,
                next_runnable,
            },
        );
        self.channels.read().announce(message);
    }

    fn announce_approved(&self, version: &str) {
        let sub_type = if version.starts_with(SKIP_PREFIX) {
            SubType::Skipped
        } else {
            SubType::Action
        };
        self.announce(
            sub_type,
            StatusSummary {
                approved_version: Some(version.to_string()),
                ..StatusSummary::default()
            },
        );
    }

    fn announce(&self, sub_type: SubType, summary: StatusSummary) {
        let message = AnnounceMessage::version(&self.service_id, sub_type, summary);
        self.channels.read().announce(message);
    }

    // ------------------------------------------------------------------
    // Persist / lifecycle

    fn persist<I>(&self, cells: I)
    where
        I: IntoIterator<Item = (PersistField, String)>,
    {
        let message = PersistMessage::update(&self.service_id, cells);
        self.channels.read().persist(message);
    }

    /// Ask for the config to be written out
    pub fn request_save(&self) {
        self.channels.read().request_save();
    }

    /// Emit a row removal
    pub fn persist_delete(&self) {
        self.channels.read().persist(PersistMessage::delete(&self.service_id));
    }

    /// Start deletion: raise the flag and disconnect every queue
    pub fn set_deleting(&self) {
        self.deleting.store(true, Ordering::Release);
        *self.channels.write() = DeliveryChannels::disconnected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryReceivers;
    use crate::message::MessageType;
    use pretty_assertions::assert_eq;

    fn wired(commands: usize, webhooks: &[&str]) -> (Status, DeliveryReceivers) {
        let (channels, receivers) = DeliveryChannels::unbounded();
        let status = Status::new("svc").with_channels(channels);
        status.init_fails(Fails::new(commands, webhooks.iter().copied()));
        (status, receivers)
    }

    fn pass_all(status: &Status) {
        for key in status.fails().keys() {
            status.set_fail(&key, FailState::Passed).unwrap();
        }
    }

    #[test]
    fn set_latest_stamps_and_resets_fails() {
        let (status, mut rx) = wired(1, &[]);
        pass_all(&status);

        assert!(status.set_latest_version("1.0.0", true));
        assert!(status.latest_version_timestamp().is_some());
        assert_eq!(status.fail(&ActionKey::command(0)), Some(FailState::NotRun));

        let persisted = rx.drain_persist();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].cell(PersistField::LatestVersion), Some("1.0.0"));
        assert!(persisted[0]
            .cell(PersistField::LatestVersionTimestamp)
            .is_some());
    }

    #[test]
    fn set_latest_same_value_is_noop() {
        let (status, mut rx) = wired(1, &[]);
        status.set_latest_version("1.0.0", true);
        let stamp = status.latest_version_timestamp();
        pass_all(&status);
        rx.drain_persist();

        assert!(!status.set_latest_version("1.0.0", true));
        assert_eq!(status.latest_version_timestamp(), stamp);
        assert_eq!(status.fail(&ActionKey::command(0)), Some(FailState::Passed));
        assert!(rx.drain_persist().is_empty());
    }

    #[test]
    fn set_deployed_without_db_write() {
        let (status, mut rx) = wired(0, &[]);
        assert!(status.set_deployed_version("2.0.0", false));
        assert_eq!(status.deployed_version(), "2.0.0");
        assert!(status.deployed_version_timestamp().is_some());
        assert!(rx.drain_persist().is_empty());
    }

    #[test]
    fn gate_noop_when_already_advanced() {
        let (status, mut rx) = wired(0, &[]);
        status.set_latest_version("1.0.0", false);
        status.set_deployed_version("1.0.0", false);

        for _ in 0..3 {
            assert_eq!(
                status.gate_transition(GateMode::AdvanceDeployed),
                GateOutcome::AlreadyAdvanced
            );
        }
        assert!(rx.drain_announce().is_empty());
        assert!(rx.drain_persist().is_empty());
    }

    #[test]
    fn gate_blocked_until_all_passed() {
        let (status, _rx) = wired(2, &["hook"]);
        status.set_latest_version("1.1.0", false);
        status.set_fail(&ActionKey::command(0), FailState::Passed).unwrap();
        status.set_fail(&ActionKey::command(1), FailState::Failed).unwrap();

        assert_eq!(
            status.gate_transition(GateMode::AdvanceDeployed),
            GateOutcome::Blocked
        );
        assert_eq!(status.deployed_version(), "");
    }

    #[test]
    fn gate_advance_announces_once() {
        let (status, mut rx) = wired(0, &[]);
        status.set_latest_version("1.1.0", false);

        assert_eq!(
            status.gate_transition(GateMode::AdvanceDeployed),
            GateOutcome::Advanced
        );
        assert_eq!(
            status.gate_transition(GateMode::AdvanceDeployed),
            GateOutcome::AlreadyAdvanced
        );

        let announces = rx.drain_announce();
        assert_eq!(announces.len(), 1);
        assert_eq!(announces[0].sub_type, SubType::Updated);
        assert_eq!(status.deployed_version(), "1.1.0");
        assert_eq!(rx.drain_persist().len(), 1);
    }

    #[test]
    fn gate_approve_only_leaves_deployed() {
        let (status, mut rx) = wired(1, &[]);
        status.set_deployed_version("1.0.0", false);
        status.set_latest_version("1.1.0", false);
        pass_all(&status);

        assert_eq!(
            status.gate_transition(GateMode::ApproveOnly),
            GateOutcome::Approved
        );
        assert_eq!(status.approved_version(), "1.1.0");
        assert_eq!(status.deployed_version(), "1.0.0");
        assert_eq!(
            status.gate_transition(GateMode::ApproveOnly),
            GateOutcome::Unchanged
        );

        let announces = rx.drain_announce();
        assert_eq!(announces.len(), 1);
        assert_eq!(announces[0].sub_type, SubType::Action);
    }

    #[test]
    fn gate_approve_only_without_actions_is_untouched() {
        let (status, mut rx) = wired(0, &[]);
        status.set_latest_version("1.1.0", false);

        assert_eq!(
            status.gate_transition(GateMode::ApproveOnly),
            GateOutcome::Unchanged
        );
        assert_eq!(status.approved_version(), "");
        assert!(rx.drain_announce().is_empty());
    }

    #[test]
    fn approve_latest_is_idempotent() {
        let (status, mut rx) = wired(0, &[]);
        status.set_latest_version("3.0.0", false);

        assert!(status.approve_latest());
        assert!(!status.approve_latest());
        assert_eq!(rx.drain_announce().len(), 1);
    }

    #[test]
    fn skipped_approval_announces_skip() {
        let (status, mut rx) = wired(0, &[]);
        status.set_approved_version("SKIP_1.0.0", true);

        let announces = rx.drain_announce();
        assert_eq!(announces.len(), 1);
        assert_eq!(announces[0].kind, MessageType::Version);
        assert_eq!(announces[0].sub_type, SubType::Skipped);
    }

    #[test]
    fn miss_counters_count_and_reset() {
        let status = Status::new("svc");
        assert_eq!(status.record_version_miss(), 1);
        assert_eq!(status.record_version_miss(), 2);
        assert_eq!(status.record_content_miss(), 1);
        status.reset_regex_misses();
        assert_eq!(status.regex_misses_version(), 0);
        assert_eq!(status.regex_misses_content(), 0);
    }

    #[test]
    fn deleting_disconnects_queues() {
        let (status, mut rx) = wired(0, &[]);
        status.set_deleting();
        assert!(status.is_deleting());

        status.set_latest_version("9.9.9", true);
        status.announce_query();
        status.persist_delete();
        status.request_save();

        assert!(rx.drain_announce().is_empty());
        assert!(rx.drain_persist().is_empty());
        assert_eq!(rx.drain_save(), 0);
    }

    #[test]
    fn action_announce_reports_cell() {
        let (status, mut rx) = wired(1, &[]);
        status.set_fail(&ActionKey::command(0), FailState::Failed).unwrap();
        status.announce_action(ActionKey::command(0), Utc::now());

        let announces = rx.drain_announce();
        assert_eq!(announces[0].kind, MessageType::Command);
        match &announces[0].payload {
            crate::message::AnnouncePayload::Action(a) => assert_eq!(a.failed, Some(true)),
            crate::message::AnnouncePayload::Status(_) => panic!("expected action payload"),
        }
    }

    #[test]
    fn snapshot_restore_is_silent() {
        let (status, mut rx) = wired(0, &[]);
        status.restore(StatusSnapshot {
            approved_version: "SKIP_2.0.0".to_string(),
            latest_version: "2.0.0".to_string(),
            deployed_version: "1.0.0".to_string(),
            ..StatusSnapshot::default()
        });

        assert_eq!(status.latest_version(), "2.0.0");
        assert_eq!(status.snapshot().approved_version, "SKIP_2.0.0");
        assert!(rx.drain_announce().is_empty());
        assert!(rx.drain_persist().is_empty());
    }

    #[test]
    fn result_for_superseded_version_dropped() {
        let (status, _rx) = wired(1, &[]);
        status.set_latest_version("1.1.0", false);

        status.set_latest_version("1.2.0", false);
        let recorded = status
            .set_fail_for(&ActionKey::command(0), FailState::Passed, "1.1.0")
            .unwrap();

        assert!(!recorded);
        assert_eq!(status.fail(&ActionKey::command(0)), Some(FailState::NotRun));
        assert!(status
            .set_fail_for(&ActionKey::command(0), FailState::Passed, "1.2.0")
            .unwrap());
        assert_eq!(status.fail(&ActionKey::command(0)), Some(FailState::Passed));
    }
}
