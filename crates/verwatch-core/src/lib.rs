//! verwatch core
//!
//! Per-service release tracking and update-action orchestration:
//! - Latest-version sources (GitHub releases, any web page) and deployed-version lookups
//! - Commands, WebHooks and notifiers
//! - Tracking loop, update-action orchestrator and retry controller
//! - Service registry and configuration model

#![warn(unreachable_pub)]

pub mod action;
pub mod config;
pub mod context;
pub mod deployed;
pub mod error;
pub mod notify;
pub mod options;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod service;
pub mod source;
pub mod tracker;

pub use action::{Action, CommandAction, Invocation, RunGate, WebHookAction, WebHookKind};
pub use config::Config;
pub use context::{Timing, WatchContext};
pub use deployed::{reconcile_deployed, DeployedVersionSource, WebDeployedVersion};
pub use error::{ActionError, ConfigError, ConfigErrors, QueryError, WatchError};
pub use notify::{Notification, Notifier, NotifierKind, WebNotifier};
pub use options::Options;
pub use orchestrator::{
    dispatch, handle_command, handle_skip, handle_update_actions, handle_webhook,
    updated_version, DispatchReport,
};
pub use registry::ServiceRegistry;
pub use retry::{handle_failed_actions, retry_candidates, should_retry_all};
pub use service::Service;
pub use source::{GitHubSource, SourceType, VersionSource, WebSource};
pub use tracker::{check_once, spawn_tracker, track, CheckOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
