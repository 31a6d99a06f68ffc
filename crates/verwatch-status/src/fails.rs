//! Tri-state action outcome table
//!
//! Every Command (by position) and every WebHook (by key) owns one cell.
//! Cells start as [`FailState::NotRun`] and return to it whenever the
//! tracked version moves, so "not attempted yet" stays distinguishable
//! from "attempted and failed".

use crate::error::StatusError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of the last attempt of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailState {
    /// No attempt since the last reset
    #[default]
    NotRun,
    /// Last attempt succeeded
    Passed,
    /// Last attempt failed
    Failed,
}

impl FailState {
    /// Map a success flag to a state
    #[inline]
    #[must_use]
    pub fn from_outcome(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    /// Whether the last attempt succeeded
    #[inline]
    #[must_use]
    pub fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Not-run and failed cells are both eligible for a selective retry
    #[inline]
    #[must_use]
    pub fn needs_retry(self) -> bool {
        !self.is_passed()
    }

    /// `None` for not-run, otherwise whether it failed
    #[inline]
    #[must_use]
    pub fn as_failed(self) -> Option<bool> {
        match self {
            Self::NotRun => None,
            Self::Passed => Some(false),
            Self::Failed => Some(true),
        }
    }
}

impl fmt::Display for FailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotRun => "not_run",
            Self::Passed => "passed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Address of one cell in the [`Fails`] table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKey {
    /// Command by position
    Command(usize),
    /// WebHook by key
    WebHook(String),
}

impl ActionKey {
    /// Command key
    #[inline]
    #[must_use]
    pub fn command(index: usize) -> Self {
        Self::Command(index)
    }

    /// WebHook key
    #[inline]
    #[must_use]
    pub fn webhook(key: impl Into<String>) -> Self {
        Self::WebHook(key.into())
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(index) => write!(f, "command[{index}]"),
            Self::WebHook(key) => write!(f, "webhook[{key}]"),
        }
    }
}

/// Per-action outcome table for one service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fails {
    command: Vec<FailState>,
    webhook: BTreeMap<String, FailState>,
}

impl Fails {
    /// Allocate a table sized to the service's actions, every cell not-run
    #[must_use]
    pub fn new<I, S>(commands: usize, webhooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: vec![FailState::NotRun; commands],
            webhook: webhooks
                .into_iter()
                .map(|key| (key.into(), FailState::NotRun))
                .collect(),
        }
    }

    /// Get the state of one cell
    #[must_use]
    pub fn get(&self, key: &ActionKey) -> Option<FailState> {
        match key {
            ActionKey::Command(index) => self.command.get(*index).copied(),
            ActionKey::WebHook(key) => self.webhook.get(key).copied(),
        }
    }

    /// Set the state of one cell
    ///
    /// # Errors
    /// - `StatusError::UnknownCommand` if the index is outside the table
    /// - `StatusError::UnknownWebHook` if the key was never allocated
    pub fn set(&mut self, key: &ActionKey, state: FailState) -> Result<(), StatusError> {
        match key {
            ActionKey::Command(index) => {
                let len = self.command.len();
                let cell = self
                    .command
                    .get_mut(*index)
                    .ok_or(StatusError::UnknownCommand { index: *index, len })?;
                *cell = state;
            }
            ActionKey::WebHook(key) => {
                let cell = self
                    .webhook
                    .get_mut(key)
                    .ok_or_else(|| StatusError::UnknownWebHook(key.clone()))?;
                *cell = state;
            }
        }
        Ok(())
    }

    /// Command cells in order
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[FailState] {
        &self.command
    }

    /// WebHook cells ordered by key
    pub fn webhooks(&self) -> impl Iterator<Item = (&str, FailState)> {
        self.webhook.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Every key in the table, commands first
    #[must_use]
    pub fn keys(&self) -> Vec<ActionKey> {
        (0..self.command.len())
            .map(ActionKey::Command)
            .chain(self.webhook.keys().cloned().map(ActionKey::WebHook))
            .collect()
    }

    /// Keys whose last attempt did not pass
    #[must_use]
    pub fn pending(&self) -> Vec<ActionKey> {
        self.keys()
            .into_iter()
            .filter(|key| self.get(key).is_some_and(FailState::needs_retry))
            .collect()
    }

    /// Number of command cells
    #[inline]
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.command.len()
    }

    /// Number of webhook cells
    #[inline]
    #[must_use]
    pub fn webhook_count(&self) -> usize {
        self.webhook.len()
    }

    /// Whether the table has no cells at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.command.is_empty() && self.webhook.is_empty()
    }

    /// Every command passed (vacuously true without commands)
    #[must_use]
    pub fn commands_all_passed(&self) -> bool {
        self.command.iter().all(|s| s.is_passed())
    }

    /// Every webhook passed (vacuously true without webhooks)
    #[must_use]
    pub fn webhooks_all_passed(&self) -> bool {
        self.webhook.values().all(|s| s.is_passed())
    }

    /// Every command and every webhook passed
    #[inline]
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.commands_all_passed() && self.webhooks_all_passed()
    }

    /// Return every cell to not-run
    pub fn reset(&mut self) {
        self.command.fill(FailState::NotRun);
        for state in self.webhook.values_mut() {
            *state = FailState::NotRun;
        }
    }
}

impl fmt::Display for Fails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.command.is_empty() {
            let cells: Vec<String> = self
                .command
                .iter()
                .enumerate()
                .map(|(i, s)| format!("{i}: {s}"))
                .collect();
            parts.push(format!("command: [{}]", cells.join(", ")));
        }
        if !self.webhook.is_empty() {
            let cells: Vec<String> = self
                .webhook
                .iter()
                .map(|(k, s)| format!("{k}: {s}"))
                .collect();
            parts.push(format!("webhook: {{{}}}", cells.join(", ")));
        }
        f.write_str(&parts.join(", "))
    }
}
