//! Notifications
//!
//! Fired best-effort and never gate a version transition. Each notifier
//! renders its title/message templates with `{{ service_id }}` and
//! `{{ version }}` and retries up to `max_tries`.

use crate::context::WatchContext;
use crate::error::{ActionError, ConfigErrors};
use crate::options::{DEFAULT_NOTIFY_MESSAGE, DEFAULT_NOTIFY_TITLE};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use verwatch_filter::{render, TemplateContext};

/// What to send
///
/// Overrides replace the notifier's templates; both are still rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    /// Service the notification is about
    pub service_id: String,
    /// Version the notification is about
    pub version: String,
    /// Title override
    pub title: Option<String>,
    /// Message override
    pub message: Option<String>,
}

impl Notification {
    /// New-release notification using the notifier's templates
    #[must_use]
    pub fn release(service_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Failure notification with an explicit title and message
    #[must_use]
    pub fn failure(
        service_id: impl Into<String>,
        version: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            version: version.into(),
            title: Some(title.into()),
            message: Some(message.into()),
        }
    }
}

/// Outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Key in the service's notify map
    fn id(&self) -> &str;

    /// Validate configuration, paths are prefixed with `prefix`
    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let _ = prefix;
        ConfigErrors::new()
    }

    /// Deliver one notification
    ///
    /// # Errors
    /// - `ActionError` once every try failed
    async fn send(&self, note: &Notification, ctx: &WatchContext) -> Result<(), ActionError>;
}

/// Notifier kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Slack incoming webhook, `{"text": ...}`
    Slack,
    /// Gotify server, `POST {url}/message?token=`
    Gotify,
    /// Generic JSON POST
    #[default]
    Webhook,
}

/// HTTP notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebNotifier {
    id: String,
    kind: NotifierKind,
    url: String,
    token: Option<String>,
    title: String,
    message: String,
    max_tries: u32,
}

impl WebNotifier {
    /// Create new notifier with the default templates and 3 tries
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NotifierKind, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            url: url.into(),
            token: None,
            title: DEFAULT_NOTIFY_TITLE.to_string(),
            message: DEFAULT_NOTIFY_MESSAGE.to_string(),
            max_tries: 3,
        }
    }

    /// Set the access token (Gotify)
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the title template
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the message template
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the number of tries
    #[inline]
    #[must_use]
    pub fn with_max_tries(mut self, tries: u32) -> Self {
        self.max_tries = tries;
        self
    }

    /// Rendered `(title, message)`
    #[must_use]
    pub fn render(&self, note: &Notification) -> (String, String) {
        let template = TemplateContext::new(&note.service_id, &note.version);
        let title = note.title.as_deref().unwrap_or(&self.title);
        let message = note.message.as_deref().unwrap_or(&self.message);
        (render(title, &template), render(message, &template))
    }

    fn request(&self, note: &Notification, ctx: &WatchContext) -> reqwest::RequestBuilder {
        let (title, message) = self.render(note);
        let http = ctx.http(false);
        let request = match self.kind {
            NotifierKind::Slack => http.post(&self.url).json(&json!({ "text": message })),
            NotifierKind::Gotify => {
                let url = format!("{}/message", self.url.trim_end_matches('/'));
                http.post(url)
                    .query(&[("token", self.token.as_deref().unwrap_or_default())])
                    .json(&json!({ "title": title, "message": message, "priority": 5 }))
            }
            NotifierKind::Webhook => http.post(&self.url).json(&json!({
                "service_id": note.service_id,
                "version": note.version,
                "title": title,
                "message": message,
            })),
        };
        request.timeout(ctx.timing().request_timeout)
    }
}

#[async_trait]
impl Notifier for WebNotifier {
    fn id(&self) -> &str {
        &self.id
    }

    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let mut errs = ConfigErrors::new();
        let prefix = format!("{prefix}.{}", self.id);
        if self.url.is_empty() {
            errs.push(format!("{prefix}.url"), "<required>");
        }
        if self.kind == NotifierKind::Gotify && self.token.as_deref().map_or(true, str::is_empty) {
            errs.push(format!("{prefix}.token"), "<required> (gotify)");
        }
        if self.max_tries == 0 {
            errs.push(format!("{prefix}.max_tries"), "must be at least 1");
        }
        errs
    }

    async fn send(&self, note: &Notification, ctx: &WatchContext) -> Result<(), ActionError> {
        let tries = self.max_tries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.request(note, ctx).send().await {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => {
                    let status = response.status().as_u16();
                    Err(ActionError::UnexpectedResponse {
                        status,
                        desired: "2XX".to_string(),
                        body: response.text().await.unwrap_or_default(),
                    })
                }
                Err(err) => Err(ActionError::Request(err)),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt >= tries => {
                    return Err(ActionError::Exhausted {
                        tries,
                        target: self.id.clone(),
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    tracing::debug!(service = %note.service_id, notify = %self.id, attempt, error = %err, "notify try failed");
                    tokio::time::sleep(ctx.timing().webhook_backoff).await;
                }
            }
        }
    }
}

/// Send to every notifier concurrently, logging failures
///
/// Returns the number of notifiers that failed.
pub async fn send_all(
    notifiers: &[Arc<dyn Notifier>],
    note: &Notification,
    ctx: &WatchContext,
) -> usize {
    let results = join_all(notifiers.iter().map(|n| async move {
        let result = n.send(note, ctx).await;
        (n.id().to_string(), result)
    }))
    .await;

    let mut failed = 0;
    for (id, result) in results {
        if let Err(err) = result {
            failed += 1;
            tracing::error!(service = %note.service_id, notify = %id, error = %err, "notification failed");
        }
    }
    failed
}
