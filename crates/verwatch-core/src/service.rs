//! Service aggregate
//!
//! Owns the version sources, the action set, the notifiers, resolved
//! options and the one [`Status`] other code may mutate. A service is
//! built from configuration, [`Service::init`]-ed to allocate its fails
//! table and wire the delivery queues, then handed to the tracking loop.

use crate::action::Action;
use crate::context::WatchContext;
use crate::deployed::DeployedVersionSource;
use crate::notify::Notifier;
use crate::options::Options;
use crate::source::VersionSource;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use verwatch_status::{ActionKey, DeliveryChannels, Fails, Status};

/// One tracked service
pub struct Service {
    id: String,
    latest_version: Option<Arc<dyn VersionSource>>,
    deployed_version: Option<Arc<dyn DeployedVersionSource>>,
    commands: Vec<Arc<dyn Action>>,
    webhooks: BTreeMap<String, Arc<dyn Action>>,
    notifiers: Vec<Arc<dyn Notifier>>,
    options: Options,
    status: Status,
    ctx: Arc<WatchContext>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("latest_version", &self.latest_version)
            .field("deployed_version", &self.deployed_version)
            .field("commands", &self.commands.len())
            .field("webhooks", &self.webhooks.keys().collect::<Vec<_>>())
            .field("notifiers", &self.notifiers.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Create new service without sources or actions
    #[must_use]
    pub fn new(id: impl Into<String>, ctx: Arc<WatchContext>) -> Self {
        let id = id.into();
        Self {
            status: Status::new(id.clone()),
            id,
            latest_version: None,
            deployed_version: None,
            commands: Vec::new(),
            webhooks: BTreeMap::new(),
            notifiers: Vec::new(),
            options: Options::default(),
            ctx,
        }
    }

    /// Set the latest-version source
    #[must_use]
    pub fn with_latest_version(mut self, source: Arc<dyn VersionSource>) -> Self {
        self.latest_version = Some(source);
        self
    }

    /// Set the deployed-version lookup
    #[must_use]
    pub fn with_deployed_version(mut self, lookup: Arc<dyn DeployedVersionSource>) -> Self {
        self.deployed_version = Some(lookup);
        self
    }

    /// Append a Command, its key must be `command[<position>]`
    #[must_use]
    pub fn with_command(mut self, command: Arc<dyn Action>) -> Self {
        self.commands.push(command);
        self
    }

    /// Add a WebHook under `name`
    #[must_use]
    pub fn with_webhook(mut self, name: impl Into<String>, webhook: Arc<dyn Action>) -> Self {
        self.webhooks.insert(name.into(), webhook);
        self
    }

    /// Add a notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Set resolved options
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Allocate the fails table and wire the delivery queues
    pub fn init(&self, channels: DeliveryChannels) {
        self.status.init_fails(Fails::new(
            self.commands.len(),
            self.webhooks.keys().cloned(),
        ));
        self.status.set_channels(channels);
    }

    /// Service ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Status ledger
    #[inline]
    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Resolved options
    #[inline]
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Shared runtime context
    #[inline]
    #[must_use]
    pub fn ctx(&self) -> &WatchContext {
        &self.ctx
    }

    /// Latest-version source
    #[inline]
    #[must_use]
    pub fn latest_source(&self) -> Option<&Arc<dyn VersionSource>> {
        self.latest_version.as_ref()
    }

    /// Deployed-version lookup
    #[inline]
    #[must_use]
    pub fn deployed_source(&self) -> Option<&Arc<dyn DeployedVersionSource>> {
        self.deployed_version.as_ref()
    }

    /// Whether a deployed-version lookup owns `deployed_version`
    #[inline]
    #[must_use]
    pub fn has_deployed_lookup(&self) -> bool {
        self.deployed_version.is_some()
    }

    /// Commands in order
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[Arc<dyn Action>] {
        &self.commands
    }

    /// WebHooks by name
    #[inline]
    #[must_use]
    pub fn webhooks(&self) -> &BTreeMap<String, Arc<dyn Action>> {
        &self.webhooks
    }

    /// Notifiers
    #[inline]
    #[must_use]
    pub fn notifiers(&self) -> &[Arc<dyn Notifier>] {
        &self.notifiers
    }

    /// Whether any Command or WebHook is configured
    #[must_use]
    pub fn has_actions(&self) -> bool {
        !self.commands.is_empty() || !self.webhooks.is_empty()
    }

    /// Keys of every Command
    #[must_use]
    pub fn command_keys(&self) -> Vec<ActionKey> {
        (0..self.commands.len()).map(ActionKey::Command).collect()
    }

    /// Keys of every WebHook
    #[must_use]
    pub fn webhook_keys(&self) -> Vec<ActionKey> {
        self.webhooks.keys().cloned().map(ActionKey::WebHook).collect()
    }

    /// Look up an action by its fails-table key
    #[must_use]
    pub fn action(&self, key: &ActionKey) -> Option<&Arc<dyn Action>> {
        match key {
            ActionKey::Command(index) => self.commands.get(*index),
            ActionKey::WebHook(name) => self.webhooks.get(name),
        }
    }

    /// Every action with its key, Commands first
    pub fn actions(&self) -> impl Iterator<Item = (ActionKey, &Arc<dyn Action>)> {
        let commands = self
            .commands
            .iter()
            .enumerate()
            .map(|(i, a)| (ActionKey::Command(i), a));
        let webhooks = self
            .webhooks
            .iter()
            .map(|(name, a)| (ActionKey::WebHook(name.clone()), a));
        commands.chain(webhooks)
    }

    /// Take over state from the instance this one replaces
    ///
    /// Versions and the last query time are always copied. Fail states
    /// and rate-limit floors are copied for actions whose definition did
    /// not change.
    pub fn inherit(&self, old: &Service) {
        self.status.restore(old.status.snapshot());
        if let Some(at) = old.status.last_queried() {
            self.status.set_last_queried_at(at);
        }

        for (key, action) in self.actions() {
            let Some(previous) = old.action(&key) else {
                continue;
            };
            if previous.fingerprint() != action.fingerprint() {
                continue;
            }
            if let Some(state) = old.status.fail(&key) {
                if let Err(err) = self.status.set_fail(&key, state) {
                    tracing::debug!(service = %self.id, action = %key, error = %err, "fail state not carried");
                }
            }
            action.set_next_runnable(previous.next_runnable());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::CommandAction;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use verwatch_status::FailState;

    fn ctx() -> Arc<WatchContext> {
        Arc::new(WatchContext::new().unwrap())
    }

    fn with_commands(ctx: Arc<WatchContext>, argvs: &[&[&str]]) -> Service {
        let mut service = Service::new("svc", ctx);
        for (i, argv) in argvs.iter().enumerate() {
            service = service.with_command(Arc::new(CommandAction::new(i, argv.iter().copied())));
        }
        service.init(DeliveryChannels::disconnected());
        service
    }

    #[test]
    fn init_sizes_fails_table() {
        let service = with_commands(ctx(), &[&["true"], &["false"]]);
        let fails = service.status().fails();
        assert_eq!(fails.command_count(), 2);
        assert_eq!(fails.webhook_count(), 0);
        assert!(service.has_actions());
        assert_eq!(
            service.command_keys(),
            vec![ActionKey::Command(0), ActionKey::Command(1)]
        );
    }

    #[test]
    fn action_lookup() {
        let service = with_commands(ctx(), &[&["true"]]);
        assert!(service.action(&ActionKey::Command(0)).is_some());
        assert!(service.action(&ActionKey::Command(1)).is_none());
        assert!(service.action(&ActionKey::webhook("x")).is_none());
    }

    #[test]
    fn inherit_carries_unchanged_actions() {
        let ctx = ctx();
        let old = with_commands(Arc::clone(&ctx), &[&["echo", "a"], &["echo", "b"]]);
        old.status().set_latest_version("1.0.0", false);
        old.status().set_fail(&ActionKey::Command(0), FailState::Passed).unwrap();
        old.status().set_fail(&ActionKey::Command(1), FailState::Failed).unwrap();
        let floor = Utc::now() + Duration::minutes(5);
        old.commands()[0].set_next_runnable(floor);
        old.status().set_last_queried();

        let new = with_commands(ctx, &[&["echo", "a"], &["echo", "changed"]]);
        new.inherit(&old);

        assert_eq!(new.status().latest_version(), "1.0.0");
        assert_eq!(new.status().last_queried(), old.status().last_queried());
        assert_eq!(new.status().fail(&ActionKey::Command(0)), Some(FailState::Passed));
        assert_eq!(new.status().fail(&ActionKey::Command(1)), Some(FailState::NotRun));
        assert_eq!(new.commands()[0].next_runnable(), floor);
        assert!(new.commands()[1].is_runnable());
    }
}
