//! Delivery-queue message types
//!
//! - [`AnnounceMessage`] for live observers (UI broadcast)
//! - [`PersistMessage`] for durable storage
//! - [`SaveSignal`] for the manual "save config" trigger

use crate::fails::ActionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Page an announce is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Page {
    /// Service approvals page
    Approvals,
}

/// What kind of state an announce describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Version fields changed or were queried
    Version,
    /// A Command finished
    Command,
    /// A WebHook finished
    #[serde(rename = "WEBHOOK")]
    WebHook,
}

/// Refinement of [`MessageType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubType {
    /// First version ever seen
    Init,
    /// Queried, nothing changed
    Query,
    /// New latest version found
    New,
    /// Deployed version advanced
    Updated,
    /// Latest version skipped
    Skipped,
    /// Latest version approved for action
    Action,
    /// Single action result
    Event,
}

/// Version fields included in a version announce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// Approved (or skipped) version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_version: Option<String>,
    /// Latest version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// When the latest version changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version_timestamp: Option<DateTime<Utc>>,
    /// Deployed version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_version: Option<String>,
    /// When the deployed version changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_version_timestamp: Option<DateTime<Utc>>,
    /// Last query time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_queried: Option<DateTime<Utc>>,
}

/// Result of a single Command/WebHook run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    /// Which action
    pub key: ActionKey,
    /// `None` if not run since the last reset
    pub failed: Option<bool>,
    /// Rate-limit floor after the run
    pub next_runnable: DateTime<Utc>,
}

/// Announce body, shape depends on the sub type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnouncePayload {
    /// Version fields
    Status(StatusSummary),
    /// Action result
    Action(ActionSummary),
}

/// Message on the Announce queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceMessage {
    /// Target page
    pub page: Page,
    /// Message type
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Message sub type
    pub sub_type: SubType,
    /// Service the message is about
    pub service_id: String,
    /// Body
    pub payload: AnnouncePayload,
}

impl AnnounceMessage {
    /// Create a version announce
    #[must_use]
    pub fn version(service_id: impl Into<String>, sub_type: SubType, summary: StatusSummary) -> Self {
        Self {
            page: Page::Approvals,
            kind: MessageType::Version,
            sub_type,
            service_id: service_id.into(),
            payload: AnnouncePayload::Status(summary),
        }
    }

    /// Create an action-result announce
    #[must_use]
    pub fn action(service_id: impl Into<String>, summary: ActionSummary) -> Self {
        let kind = match summary.key {
            ActionKey::Command(_) => MessageType::Command,
            ActionKey::WebHook(_) => MessageType::WebHook,
        };
        Self {
            page: Page::Approvals,
            kind,
            sub_type: SubType::Event,
            service_id: service_id.into(),
            payload: AnnouncePayload::Action(summary),
        }
    }

    /// Version summary, if this is a version announce
    #[must_use]
    pub fn status(&self) -> Option<&StatusSummary> {
        match &self.payload {
            AnnouncePayload::Status(s) => Some(s),
            AnnouncePayload::Action(_) => None,
        }
    }
}

/// Column of the persisted status row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistField {
    /// `latest_version`
    LatestVersion,
    /// `latest_version_timestamp`
    LatestVersionTimestamp,
    /// `deployed_version`
    DeployedVersion,
    /// `deployed_version_timestamp`
    DeployedVersionTimestamp,
    /// `approved_version`
    ApprovedVersion,
}

impl PersistField {
    /// Column name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LatestVersion => "latest_version",
            Self::LatestVersionTimestamp => "latest_version_timestamp",
            Self::DeployedVersion => "deployed_version",
            Self::DeployedVersionTimestamp => "deployed_version_timestamp",
            Self::ApprovedVersion => "approved_version",
        }
    }
}

/// Message on the Persist queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistMessage {
    /// Row key
    pub service_id: String,
    /// Remove the row instead of updating it
    #[serde(default)]
    pub delete: bool,
    /// Changed columns
    #[serde(default)]
    pub cells: BTreeMap<PersistField, String>,
}

impl PersistMessage {
    /// Create an update for the given columns
    #[must_use]
    pub fn update<I>(service_id: impl Into<String>, cells: I) -> Self
    where
        I: IntoIterator<Item = (PersistField, String)>,
    {
        Self {
            service_id: service_id.into(),
            delete: false,
            cells: cells.into_iter().collect(),
        }
    }

    /// Create a row removal
    #[must_use]
    pub fn delete(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            delete: true,
            cells: BTreeMap::new(),
        }
    }

    /// Value of one column, if present
    #[must_use]
    pub fn cell(&self, field: PersistField) -> Option<&str> {
        self.cells.get(&field).map(String::as_str)
    }
}

/// Bare trigger on the ManualSave queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveSignal;
