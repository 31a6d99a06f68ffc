//! Configuration model
//!
//! YAML with three top-level keys:
//! - `settings`: process-wide logging
//! - `defaults`: fallback values for services, webhooks and notifiers
//! - `service`: ordered map of service ID to its definition
//!
//! Every option resolves explicit value, then `defaults`, then the hard
//! default. Validation collects every problem instead of stopping at
//! the first.

use crate::action::{Action, CommandAction, WebHookAction, WebHookKind};
use crate::context::WatchContext;
use crate::deployed::{DeployedVersionSource, Header, WebDeployedVersion};
use crate::error::{ConfigError, ConfigErrors};
use crate::notify::{Notifier, NotifierKind, WebNotifier};
use crate::options::{parse_interval, Options, OptionsConfig, DEFAULT_INTERVAL};
use crate::service::Service;
use crate::source::{GitHubSource, VersionSource, WebSource};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use verwatch_filter::{Pipeline, Require, UrlCommand};
use verwatch_status::StatusSnapshot;

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Process-wide settings
    #[serde(default)]
    pub settings: Settings,
    /// Fallback values
    #[serde(default)]
    pub defaults: Defaults,
    /// Services in declaration order
    #[serde(default)]
    pub service: IndexMap<String, ServiceConfig>,
}

/// Process-wide settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Log filter directive (`info`, `verwatch_core=debug`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// `pretty` or `json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
}

/// Fallback values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Service-level fallbacks
    #[serde(default)]
    pub service: ServiceDefaults,
    /// WebHook fallbacks
    #[serde(default)]
    pub webhook: WebHookConfig,
    /// Notifier fallbacks by kind (`slack`, `gotify`, `webhook`)
    #[serde(default)]
    pub notify: IndexMap<String, NotifyConfig>,
}

/// Service-level fallbacks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDefaults {
    /// Options
    #[serde(default)]
    pub options: OptionsConfig,
    /// Latest-version source fallbacks
    #[serde(default)]
    pub latest_version: LatestVersionDefaults,
    /// Dashboard fallbacks
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Latest-version source fallbacks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatestVersionDefaults {
    /// GitHub token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Keep pre-releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_prerelease: Option<bool>,
    /// Accept invalid TLS certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_invalid_certs: Option<bool>,
}

/// Approval settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// Dispatch actions without manual approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approve: Option<bool>,
}

/// One service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Options
    #[serde(default)]
    pub options: OptionsConfig,
    /// Latest-version source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<LatestVersionConfig>,
    /// Deployed-version lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_version: Option<WebDeployedVersion>,
    /// Commands, each an argv list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<Vec<String>>,
    /// WebHooks by name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub webhook: IndexMap<String, WebHookConfig>,
    /// Notifiers by name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub notify: IndexMap<String, NotifyConfig>,
    /// Approval settings
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Persisted state to start from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSnapshot>,
}

/// Latest-version source discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatestVersionKind {
    /// GitHub releases
    #[serde(rename = "github")]
    GitHub,
    /// Any web page
    Url,
}

/// Latest-version source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatestVersionConfig {
    /// Source kind
    #[serde(rename = "type")]
    pub kind: LatestVersionKind,
    /// `owner/repo` for GitHub, the page for `url`
    #[serde(default)]
    pub url: String,
    /// GitHub token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Keep pre-releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_prerelease: Option<bool>,
    /// Accept invalid TLS certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_invalid_certs: Option<bool>,
    /// Text transforms
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_commands: Vec<UrlCommand>,
    /// Version and content requirements
    #[serde(default)]
    pub require: Require,
}

/// WebHook, every field optional so it can also serve as the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebHookConfig {
    /// Payload style
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<WebHookKind>,
    /// Target, `{{ version }}` templated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Signing secret (GitHub) or token (GitLab)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Extra headers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_headers: Vec<Header>,
    /// Required status, 0 for any 2XX
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_status_code: Option<u16>,
    /// Tries before giving up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u32>,
    /// Wait before an auto-approved send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
    /// Suppress the failure notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent_fails: Option<bool>,
    /// Accept invalid TLS certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_invalid_certs: Option<bool>,
}

/// Notifier, every field optional so it can also serve as the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    /// Kind, defaults to the map key when that names a kind
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotifierKind>,
    /// Endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Access token (Gotify)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Title template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Message template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Tries before giving up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u32>,
}

/// Defaults with durations already parsed
#[derive(Debug, Clone)]
struct ResolvedDefaults {
    interval: Duration,
    webhook_delay: Duration,
}

/// Everything a service is built from, minus the runtime context
struct Components {
    options: Options,
    latest_version: Option<Arc<dyn VersionSource>>,
    deployed_version: Option<Arc<dyn DeployedVersionSource>>,
    commands: Vec<Arc<dyn Action>>,
    webhooks: Vec<(String, Arc<dyn Action>)>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

/// First of explicit, default, hard default
fn pick<T: Clone>(explicit: Option<&T>, default: Option<&T>, hard: T) -> T {
    explicit.or(default).cloned().unwrap_or(hard)
}

fn notifier_kind(name: &str) -> Option<NotifierKind> {
    match name {
        "slack" => Some(NotifierKind::Slack),
        "gotify" => Some(NotifierKind::Gotify),
        "webhook" => Some(NotifierKind::Webhook),
        _ => None,
    }
}

fn kind_name(kind: NotifierKind) -> &'static str {
    match kind {
        NotifierKind::Slack => "slack",
        NotifierKind::Gotify => "gotify",
        NotifierKind::Webhook => "webhook",
    }
}

impl Config {
    /// Read and parse a config file
    ///
    /// # Errors
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid YAML for this model
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse YAML
    ///
    /// # Errors
    /// - `ConfigError::Parse` on syntax or unknown-field errors
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serialize back to YAML
    ///
    /// # Errors
    /// - `ConfigError::Parse` if serialization fails
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate every service without building runtime state
    ///
    /// # Errors
    /// Every problem found, with its dotted path.
    pub fn check(&self) -> Result<(), ConfigErrors> {
        let (defaults, mut errs) = self.resolve_defaults();
        for (id, service) in &self.service {
            if let Err(e) = self.components(id, service, &defaults) {
                errs.extend(e);
            }
        }
        errs.into_result()
    }

    /// Build every service, in declaration order
    ///
    /// # Errors
    /// Every problem found, with its dotted path.
    pub fn build_services(&self, ctx: &Arc<WatchContext>) -> Result<Vec<Service>, ConfigErrors> {
        let (defaults, mut errs) = self.resolve_defaults();
        let mut services = Vec::with_capacity(self.service.len());

        for (id, config) in &self.service {
            let parts = match self.components(id, config, &defaults) {
                Ok(parts) => parts,
                Err(e) => {
                    errs.extend(e);
                    continue;
                }
            };

            let mut service = Service::new(id.clone(), Arc::clone(ctx)).with_options(parts.options);
            if let Some(source) = parts.latest_version {
                service = service.with_latest_version(source);
            }
            if let Some(lookup) = parts.deployed_version {
                service = service.with_deployed_version(lookup);
            }
            for command in parts.commands {
                service = service.with_command(command);
            }
            for (name, webhook) in parts.webhooks {
                service = service.with_webhook(name, webhook);
            }
            for notifier in parts.notifiers {
                service = service.with_notifier(notifier);
            }
            if let Some(snapshot) = &config.status {
                service.status().restore(snapshot.clone());
            }
            services.push(service);
        }

        errs.into_result().map(|()| services)
    }

    fn resolve_defaults(&self) -> (ResolvedDefaults, ConfigErrors) {
        let mut errs = ConfigErrors::new();
        let interval = match &self.defaults.service.options.interval {
            Some(text) => parse_interval(text).unwrap_or_else(|e| {
                errs.push("defaults.service.options.interval", e);
                DEFAULT_INTERVAL
            }),
            None => DEFAULT_INTERVAL,
        };
        let webhook_delay = match &self.defaults.webhook.delay {
            Some(text) => parse_interval(text).unwrap_or_else(|e| {
                errs.push("defaults.webhook.delay", e);
                Duration::ZERO
            }),
            None => Duration::ZERO,
        };
        for name in self.defaults.notify.keys() {
            if notifier_kind(name).is_none() {
                errs.push(
                    format!("defaults.notify.{name}"),
                    "<invalid> (expected slack, gotify or webhook)",
                );
            }
        }
        (
            ResolvedDefaults {
                interval,
                webhook_delay,
            },
            errs,
        )
    }

    fn components(
        &self,
        id: &str,
        config: &ServiceConfig,
        defaults: &ResolvedDefaults,
    ) -> Result<Components, ConfigErrors> {
        let prefix = format!("service.{id}");
        let mut errs = ConfigErrors::new();

        let options = self.resolve_options(config, defaults, &prefix, &mut errs);
        let latest_version = config
            .latest_version
            .as_ref()
            .map(|lv| self.latest_source(lv, &options, &prefix, &mut errs));

        let deployed_version = config.deployed_version.as_ref().map(|lookup| {
            errs.extend(lookup.check_values(&format!("{prefix}.deployed_version")));
            Arc::new(lookup.clone()) as Arc<dyn DeployedVersionSource>
        });

        let mut commands: Vec<Arc<dyn Action>> = Vec::with_capacity(config.command.len());
        for (i, argv) in config.command.iter().enumerate() {
            let command = CommandAction::new(i, argv.iter().cloned());
            errs.extend(command.check_values(&format!("{prefix}.command")));
            commands.push(Arc::new(command));
        }

        let mut webhooks: Vec<(String, Arc<dyn Action>)> = Vec::with_capacity(config.webhook.len());
        for (name, webhook) in &config.webhook {
            let action = self.webhook(name, webhook, defaults, &prefix, &mut errs);
            webhooks.push((name.clone(), Arc::new(action)));
        }

        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::with_capacity(config.notify.len());
        for (name, notify) in &config.notify {
            if let Some(notifier) = self.notifier(name, notify, &prefix, &mut errs) {
                notifiers.push(Arc::new(notifier));
            }
        }

        errs.into_result().map(|()| Components {
            options,
            latest_version,
            deployed_version,
            commands,
            webhooks,
            notifiers,
        })
    }

    fn resolve_options(
        &self,
        config: &ServiceConfig,
        defaults: &ResolvedDefaults,
        prefix: &str,
        errs: &mut ConfigErrors,
    ) -> Options {
        let fallback = &self.defaults.service;
        let interval = match &config.options.interval {
            Some(text) => match parse_interval(text) {
                Ok(interval) => interval,
                Err(e) => {
                    errs.push(format!("{prefix}.options.interval"), e);
                    defaults.interval
                }
            },
            None => defaults.interval,
        };
        if interval.is_zero() {
            errs.push(format!("{prefix}.options.interval"), "must be greater than 0s");
        }

        Options::default()
            .with_interval(interval)
            .with_active(pick(
                config.options.active.as_ref(),
                fallback.options.active.as_ref(),
                true,
            ))
            .with_semantic_versioning(pick(
                config.options.semantic_versioning.as_ref(),
                fallback.options.semantic_versioning.as_ref(),
                true,
            ))
            .with_auto_approve(pick(
                config.dashboard.auto_approve.as_ref(),
                fallback.dashboard.auto_approve.as_ref(),
                false,
            ))
    }

    fn latest_source(
        &self,
        config: &LatestVersionConfig,
        options: &Options,
        prefix: &str,
        errs: &mut ConfigErrors,
    ) -> Arc<dyn VersionSource> {
        let fallback = &self.defaults.service.latest_version;
        let pipeline = Pipeline::new(config.url_commands.clone(), config.require.clone())
            .with_prerelease(pick(
                config.use_prerelease.as_ref(),
                fallback.use_prerelease.as_ref(),
                false,
            ))
            .with_semantic_versioning(options.semantic_versioning);

        let source: Arc<dyn VersionSource> = match config.kind {
            LatestVersionKind::GitHub => {
                let mut source = GitHubSource::new(config.url.clone(), pipeline);
                if let Some(token) = config
                    .access_token
                    .as_ref()
                    .or(fallback.access_token.as_ref())
                {
                    source = source.with_access_token(token.clone());
                }
                Arc::new(source)
            }
            LatestVersionKind::Url => Arc::new(
                WebSource::new(config.url.clone(), pipeline).with_allow_invalid_certs(pick(
                    config.allow_invalid_certs.as_ref(),
                    fallback.allow_invalid_certs.as_ref(),
                    false,
                )),
            ),
        };
        errs.extend(source.check_values(&format!("{prefix}.latest_version")));
        source
    }

    fn webhook(
        &self,
        name: &str,
        config: &WebHookConfig,
        defaults: &ResolvedDefaults,
        prefix: &str,
        errs: &mut ConfigErrors,
    ) -> WebHookAction {
        let fallback = &self.defaults.webhook;
        let delay = match &config.delay {
            Some(text) => parse_interval(text).unwrap_or_else(|e| {
                errs.push(format!("{prefix}.webhook.{name}.delay"), e);
                Duration::ZERO
            }),
            None => defaults.webhook_delay,
        };
        let headers = if config.custom_headers.is_empty() {
            fallback.custom_headers.clone()
        } else {
            config.custom_headers.clone()
        };

        let action = WebHookAction::new(
            name,
            pick(config.kind.as_ref(), fallback.kind.as_ref(), WebHookKind::GitHub),
            pick(config.url.as_ref(), fallback.url.as_ref(), String::new()),
            pick(config.secret.as_ref(), fallback.secret.as_ref(), String::new()),
        )
        .with_headers(headers)
        .with_desired_status_code(pick(
            config.desired_status_code.as_ref(),
            fallback.desired_status_code.as_ref(),
            0,
        ))
        .with_max_tries(pick(config.max_tries.as_ref(), fallback.max_tries.as_ref(), 3))
        .with_delay(delay)
        .with_silent_fails(pick(
            config.silent_fails.as_ref(),
            fallback.silent_fails.as_ref(),
            false,
        ))
        .with_allow_invalid_certs(pick(
            config.allow_invalid_certs.as_ref(),
            fallback.allow_invalid_certs.as_ref(),
            false,
        ));
        errs.extend(action.check_values(&format!("{prefix}.webhook")));
        action
    }

    fn notifier(
        &self,
        name: &str,
        config: &NotifyConfig,
        prefix: &str,
        errs: &mut ConfigErrors,
    ) -> Option<WebNotifier> {
        let Some(kind) = config.kind.or_else(|| notifier_kind(name)) else {
            errs.push(
                format!("{prefix}.notify.{name}.type"),
                "<required> (slack, gotify or webhook)",
            );
            return None;
        };
        let fallback = self.defaults.notify.get(kind_name(kind));
        let field = |get: fn(&NotifyConfig) -> Option<&String>| {
            get(config).or_else(|| fallback.and_then(get)).cloned()
        };

        let mut notifier = WebNotifier::new(
            name,
            kind,
            field(|c| c.url.as_ref()).unwrap_or_default(),
        )
        .with_max_tries(pick(
            config.max_tries.as_ref(),
            fallback.and_then(|f| f.max_tries.as_ref()),
            3,
        ));
        if let Some(token) = field(|c| c.token.as_ref()) {
            notifier = notifier.with_token(token);
        }
        if let Some(title) = field(|c| c.title.as_ref()) {
            notifier = notifier.with_title(title);
        }
        if let Some(message) = field(|c| c.message.as_ref()) {
            notifier = notifier.with_message(message);
        }
        errs.extend(notifier.check_values(&format!("{prefix}.notify")));
        Some(notifier)
    }
}
