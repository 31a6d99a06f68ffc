//! Testing utilities for the verwatch workspace
//!
//! Scripted sources, recording actions and notifiers, and service
//! fixtures wired to inspectable delivery queues.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use verwatch_core::{
    Action, ActionError, DeployedVersionSource, Invocation, Notification, Notifier, QueryError,
    RunGate, Service, SourceType, Timing, VersionSource, WatchContext,
};
use verwatch_status::{ActionKey, AnnounceMessage, DeliveryChannels, DeliveryReceivers, MessageType, Status, SubType};

/// Latest-version source replaying a script
///
/// Each query pops the next entry; once the script is empty the last
/// entry repeats.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(versions.into_iter().map(|v| Ok(v.into())).collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// A source whose every query fails
    pub fn failing() -> Self {
        let source = Self::new(Vec::<String>::new());
        source.push_error("connection refused");
        source
    }

    pub fn push_version(&self, version: impl Into<String>) {
        self.script.lock().push_back(Ok(version.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.script.lock().push_back(Err(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionSource for ScriptedSource {
    fn source_type(&self) -> SourceType {
        SourceType::Custom
    }

    fn service_url(&self) -> String {
        "scripted://".to_string()
    }

    async fn query(
        &self,
        _use_cache: bool,
        _status: &Status,
        _ctx: &WatchContext,
    ) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        let entry = match next {
            Some(entry) => {
                *self.last.lock() = Some(entry.clone());
                entry
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| Err("script empty".to_string())),
        };
        entry.map_err(QueryError::Unavailable)
    }
}

/// Deployed-version lookup returning a settable value
#[derive(Debug, Default)]
pub struct StaticDeployed {
    version: Mutex<String>,
    calls: AtomicUsize,
}

impl StaticDeployed {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: Mutex::new(version.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_version(&self, version: impl Into<String>) {
        *self.version.lock() = version.into();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeployedVersionSource for StaticDeployed {
    async fn query(&self, _status: &Status, _ctx: &WatchContext) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let version = self.version.lock().clone();
        if version.is_empty() {
            return Err(QueryError::Unavailable("no version".to_string()));
        }
        Ok(version)
    }
}

/// Command or WebHook double that records each run
///
/// Outcomes are popped per run; once empty the default outcome applies.
#[derive(Debug)]
pub struct RecordingAction {
    key: ActionKey,
    outcomes: Mutex<VecDeque<bool>>,
    default_outcome: bool,
    delay: Duration,
    run_time: Duration,
    runs: AtomicUsize,
    versions: Mutex<Vec<String>>,
    gate: RunGate,
}

impl RecordingAction {
    pub fn new(key: ActionKey) -> Self {
        Self {
            key,
            outcomes: Mutex::new(VecDeque::new()),
            default_outcome: true,
            delay: Duration::ZERO,
            run_time: Duration::ZERO,
            runs: AtomicUsize::new(0),
            versions: Mutex::new(Vec::new()),
            gate: RunGate::new(),
        }
    }

    pub fn command(index: usize) -> Self {
        Self::new(ActionKey::Command(index))
    }

    pub fn webhook(name: &str) -> Self {
        Self::new(ActionKey::webhook(name))
    }

    /// Fail every run
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.default_outcome = false;
        self
    }

    /// Script the next outcomes
    #[must_use]
    pub fn with_outcomes<I: IntoIterator<Item = bool>>(self, outcomes: I) -> Self {
        self.outcomes.lock().extend(outcomes);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Take this long inside each run
    #[must_use]
    pub fn with_run_time(mut self, run_time: Duration) -> Self {
        self.run_time = run_time;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn versions(&self) -> Vec<String> {
        self.versions.lock().clone()
    }

    /// Push the floor into the future
    pub fn block_until(&self, at: DateTime<Utc>) {
        self.gate.set_next_runnable(at);
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn key(&self) -> ActionKey {
        self.key.clone()
    }

    fn gate(&self) -> &RunGate {
        &self.gate
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn fingerprint(&self) -> String {
        format!("recording:{}", self.key)
    }

    async fn run(&self, invocation: &Invocation<'_>) -> Result<(), ActionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.versions.lock().push(invocation.version.to_string());
        if !self.run_time.is_zero() {
            tokio::time::sleep(self.run_time).await;
        }
        let passed = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or(self.default_outcome);
        if passed {
            Ok(())
        } else {
            Err(ActionError::Message(format!("{} scripted failure", self.key)))
        }
    }
}

/// Notifier double that records what it was asked to send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn id(&self) -> &str {
        "recording"
    }

    async fn send(&self, note: &Notification, _ctx: &WatchContext) -> Result<(), ActionError> {
        self.sent.lock().push(note.clone());
        Ok(())
    }
}

/// Timing with no staggering, no warm-up and no failure floor
pub fn fast_timing() -> Timing {
    Timing {
        deployed_warmup: Duration::ZERO,
        service_stagger: Duration::ZERO,
        dispatch_stagger_min: Duration::ZERO,
        dispatch_stagger_max: Duration::ZERO,
        webhook_backoff: Duration::ZERO,
        request_timeout: Duration::from_secs(1),
        failed_floor: Duration::ZERO,
        executing_floor: Duration::from_secs(3600),
    }
}

pub fn test_context() -> Arc<WatchContext> {
    Arc::new(WatchContext::with_timing(fast_timing()).unwrap())
}

/// Init a service with connected queues
pub fn wire(service: Service) -> (Arc<Service>, DeliveryReceivers) {
    let (channels, receivers) = DeliveryChannels::unbounded();
    service.init(channels);
    (Arc::new(service), receivers)
}

/// Version announces of one sub-type
pub fn count_version_announces(messages: &[AnnounceMessage], sub_type: SubType) -> usize {
    messages
        .iter()
        .filter(|m| m.kind == MessageType::Version && m.sub_type == sub_type)
        .count()
}

/// Sleep in small steps until `condition` holds or `limit` passes
pub async fn wait_for<F: Fn() -> bool>(condition: F, limit: Duration) -> bool {
    let step = Duration::from_millis(10);
    let mut waited = Duration::ZERO;
    while waited <= limit {
        if condition() {
            return true;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
    condition()
}
