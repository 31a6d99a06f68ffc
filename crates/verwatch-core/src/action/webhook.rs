use super::{Action, Invocation, RunGate};
use crate::deployed::Header;
use crate::error::{ActionError, ConfigErrors};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use verwatch_filter::render;
use verwatch_status::ActionKey;

type HmacSha256 = Hmac<Sha256>;

/// Response bodies that mean the hook was refused despite the status code
const REJECTION_PHRASES: [&str; 2] = ["do not have permission", "rules were not satisfied"];

/// Payload style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebHookKind {
    /// JSON push event signed with `X-Hub-Signature-256`
    #[default]
    GitHub,
    /// Form POST with `token` and `ref`
    GitLab,
}

#[derive(Serialize)]
struct GitHubPush<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    before: String,
    after: String,
}

fn random_sha() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(40)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Outbound WebHook
#[derive(Debug)]
pub struct WebHookAction {
    key: String,
    kind: WebHookKind,
    url: String,
    secret: String,
    headers: Vec<Header>,
    desired_status_code: u16,
    max_tries: u32,
    delay: Duration,
    silent_fails: bool,
    allow_invalid_certs: bool,
    gate: RunGate,
}

impl WebHookAction {
    /// Create new WebHook with hard defaults (3 tries, any 2XX, no delay)
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        kind: WebHookKind,
        url: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            url: url.into(),
            secret: secret.into(),
            headers: Vec::new(),
            desired_status_code: 0,
            max_tries: 3,
            delay: Duration::ZERO,
            silent_fails: false,
            allow_invalid_certs: false,
            gate: RunGate::new(),
        }
    }

    /// Add custom headers (values are templated)
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<Header>) -> Self {
        self.headers = headers;
        self
    }

    /// Required status code, 0 for any 2XX
    #[inline]
    #[must_use]
    pub fn with_desired_status_code(mut self, code: u16) -> Self {
        self.desired_status_code = code;
        self
    }

    /// Number of tries before giving up
    #[inline]
    #[must_use]
    pub fn with_max_tries(mut self, tries: u32) -> Self {
        self.max_tries = tries;
        self
    }

    /// Wait before an auto-approved send
    #[inline]
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Suppress the failure notification
    #[inline]
    #[must_use]
    pub fn with_silent_fails(mut self, silent: bool) -> Self {
        self.silent_fails = silent;
        self
    }

    /// Accept invalid TLS certificates
    #[inline]
    #[must_use]
    pub fn with_allow_invalid_certs(mut self, allow: bool) -> Self {
        self.allow_invalid_certs = allow;
        self
    }

    /// Maximum tries
    #[inline]
    #[must_use]
    pub fn max_tries(&self) -> u32 {
        self.max_tries.max(1)
    }

    /// Whether a response counts as delivered
    #[must_use]
    pub fn accepts(&self, status: u16, body: &str) -> bool {
        let status_ok = if self.desired_status_code == 0 {
            (200..300).contains(&status)
        } else {
            status == self.desired_status_code
        };
        status_ok && !REJECTION_PHRASES.iter().any(|p| body.contains(p))
    }

    fn desired_label(&self) -> String {
        if self.desired_status_code == 0 {
            "2XX".to_string()
        } else {
            self.desired_status_code.to_string()
        }
    }

    /// `sha256=<hex>` signature of a payload
    ///
    /// # Errors
    /// - `ActionError::Signature` if the key is rejected
    pub fn sign(&self, payload: &[u8]) -> Result<String, ActionError> {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| ActionError::Signature)?;
        mac.update(payload);
        Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn request(&self, invocation: &Invocation<'_>) -> Result<reqwest::RequestBuilder, ActionError> {
        let template = invocation.template();
        let url = render(&self.url, &template);
        let client = invocation.ctx.http(self.allow_invalid_certs);

        let mut request = match self.kind {
            WebHookKind::GitHub => {
                let payload = serde_json::to_vec(&GitHubPush {
                    git_ref: "refs/heads/master",
                    before: random_sha(),
                    after: random_sha(),
                })
                .map_err(|e| ActionError::Message(e.to_string()))?;
                let signature = self.sign(&payload)?;
                client
                    .post(url)
                    .header(CONTENT_TYPE, "application/json")
                    .header("X-GitHub-Event", "push")
                    .header("X-GitHub-Hook-Installation-Target-Type", "repository")
                    .header("X-Hub-Signature-256", signature)
                    .body(payload)
            }
            WebHookKind::GitLab => client
                .post(url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .query(&[("token", self.secret.as_str()), ("ref", "master")]),
        };
        for header in &self.headers {
            request = request.header(header.key.as_str(), render(&header.value, &template));
        }
        Ok(request.timeout(invocation.ctx.timing().request_timeout))
    }

    async fn try_once(&self, invocation: &Invocation<'_>) -> Result<(), ActionError> {
        let response = self.request(invocation)?.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if self.accepts(status, &body) {
            tracing::info!(service = invocation.service_id, webhook = %self.key, status, "WebHook received");
            return Ok(());
        }
        Err(ActionError::UnexpectedResponse {
            status,
            desired: self.desired_label(),
            body,
        })
    }
}

#[async_trait]
impl Action for WebHookAction {
    fn key(&self) -> ActionKey {
        ActionKey::WebHook(self.key.clone())
    }

    fn gate(&self) -> &RunGate {
        &self.gate
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn silent_fails(&self) -> bool {
        self.silent_fails
    }

    fn fingerprint(&self) -> String {
        format!(
            "{:?}|{}|{}|{}|{:?}",
            self.kind, self.url, self.secret, self.desired_status_code, self.headers
        )
    }

    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let mut errs = ConfigErrors::new();
        let prefix = format!("{prefix}.{}", self.key);
        if self.url.is_empty() {
            errs.push(format!("{prefix}.url"), "<required>");
        }
        if self.secret.is_empty() {
            errs.push(format!("{prefix}.secret"), "<required>");
        }
        if self.max_tries == 0 {
            errs.push(format!("{prefix}.max_tries"), "must be at least 1");
        }
        errs
    }

    async fn run(&self, invocation: &Invocation<'_>) -> Result<(), ActionError> {
        let tries = self.max_tries();
        let mut attempt = 0;
        loop {
            if invocation.status.is_deleting() {
                return Err(ActionError::Deleting);
            }
            attempt += 1;
            match self.try_once(invocation).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt >= tries => {
                    return Err(ActionError::Exhausted {
                        tries,
                        target: self.key.clone(),
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        service = invocation.service_id,
                        webhook = %self.key,
                        attempt,
                        error = %err,
                        "WebHook try failed"
                    );
                    tokio::time::sleep(invocation.ctx.timing().webhook_backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WatchContext;
    use verwatch_status::Status;

    fn hook() -> WebHookAction {
        WebHookAction::new("deploy", WebHookKind::GitHub, "https://example.test/hook", "s3cret")
    }

    #[test]
    fn accepts_any_2xx_by_default() {
        let hook = hook();
        assert!(hook.accepts(200, ""));
        assert!(hook.accepts(202, "queued"));
        assert!(!hook.accepts(302, ""));
        assert!(!hook.accepts(500, ""));
    }

    #[test]
    fn accepts_desired_code_only() {
        let hook = hook().with_desired_status_code(202);
        assert!(hook.accepts(202, ""));
        assert!(!hook.accepts(200, ""));
    }

    #[test]
    fn rejection_phrase_fails() {
        let hook = hook();
        assert!(!hook.accepts(200, "Hook rules were not satisfied."));
        assert!(!hook.accepts(200, "You do not have permission to trigger this"));
    }

    #[test]
    fn signature_is_hex_sha256() {
        let sig = hook().sign(b"{}").unwrap();
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
        assert_eq!(sig, hook().sign(b"{}").unwrap());
    }

    #[test]
    fn random_sha_shape() {
        let sha = random_sha();
        assert_eq!(sha.len(), 40);
        assert!(sha.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn check_values_requires_fields() {
        let hook = WebHookAction::new("x", WebHookKind::GitLab, "", "").with_max_tries(0);
        assert_eq!(hook.check_values("service.a.webhook").issues().len(), 3);
    }

    #[tokio::test]
    async fn deleting_aborts_before_sending() {
        let status = Status::new("svc");
        status.set_deleting();
        let ctx = WatchContext::new().unwrap();
        let invocation = Invocation {
            service_id: "svc",
            version: "1.0.0",
            status: &status,
            ctx: &ctx,
        };
        assert!(matches!(
            hook().run(&invocation).await,
            Err(ActionError::Deleting)
        ));
    }
}
