//! Deployed-version lookup
//!
//! Queries a live endpoint for the version actually running. When a
//! lookup is configured it, not the update gate, owns `deployed_version`.

use crate::context::WatchContext;
use crate::error::{ConfigErrors, QueryError};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use verwatch_filter::semantic;
use verwatch_status::Status;

/// Lookup of the running version
#[async_trait]
pub trait DeployedVersionSource: Send + Sync + fmt::Debug {
    /// Validate configuration, paths are prefixed with `prefix`
    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let _ = prefix;
        ConfigErrors::new()
    }

    /// Fetch the deployed version
    ///
    /// # Errors
    /// - `QueryError` on transport, decode or extraction failure
    async fn query(&self, status: &Status, ctx: &WatchContext) -> Result<String, QueryError>;
}

/// Basic-auth credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    /// User
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
}

/// Extra request header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Name
    pub key: String,
    /// Value
    pub value: String,
}

/// HTTP GET deployed-version lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebDeployedVersion {
    /// Endpoint
    pub url: String,
    /// Accept invalid TLS certificates
    #[serde(default)]
    pub allow_invalid_certs: bool,
    /// Basic auth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    /// Extra headers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
    /// Dotted path into a JSON body (`data.version`, `items.0.tag`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    /// Regex applied to the value, first capture group wins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl WebDeployedVersion {
    /// Create new lookup
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set JSON path
    #[must_use]
    pub fn with_json(mut self, path: impl Into<String>) -> Self {
        self.json = Some(path.into());
        self
    }

    /// Set extraction regex
    #[must_use]
    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    /// Pull the version out of a response body
    ///
    /// # Errors
    /// - `QueryError::Decode` if a JSON path is set and the body is not JSON
    /// - `QueryError::JsonPath` if the path does not resolve to a scalar
    /// - `QueryError::NoMatch` if the regex finds nothing
    pub fn extract(&self, body: &str) -> Result<String, QueryError> {
        let mut version = match &self.json {
            Some(path) => {
                let value: serde_json::Value =
                    serde_json::from_str(body).map_err(|e| QueryError::Decode {
                        url: self.url.clone(),
                        reason: e.to_string(),
                    })?;
                json_lookup(&value, path).ok_or_else(|| QueryError::JsonPath {
                    path: path.clone(),
                    url: self.url.clone(),
                })?
            }
            None => body.to_string(),
        };

        if let Some(pattern) = &self.regex {
            let re = Regex::new(pattern).map_err(|e| QueryError::Decode {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
            let caps = re.captures(&version).ok_or_else(|| QueryError::NoMatch {
                pattern: pattern.clone(),
                text: version.clone(),
            })?;
            let group = caps.get(1).or_else(|| caps.get(0));
            version = group.map(|m| m.as_str().to_string()).unwrap_or_default();
        }
        Ok(version)
    }
}

/// Walk a dotted path, numeric segments index arrays
fn json_lookup(value: &serde_json::Value, path: &str) -> Option<String> {
    let mut current = value;
    for key in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(key)?,
            serde_json::Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl DeployedVersionSource for WebDeployedVersion {
    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let mut errs = ConfigErrors::new();
        if self.url.is_empty() {
            errs.push(format!("{prefix}.url"), "<required>");
        }
        if let Some(pattern) = &self.regex {
            if let Err(e) = Regex::new(pattern) {
                errs.push(format!("{prefix}.regex"), format!("{pattern:?} <invalid> ({e})"));
            }
        }
        errs
    }

    async fn query(&self, _status: &Status, ctx: &WatchContext) -> Result<String, QueryError> {
        let mut request = ctx.http(self.allow_invalid_certs).get(&self.url);
        for header in &self.headers {
            request = request.header(header.key.as_str(), header.value.as_str());
        }
        if let Some(auth) = &self.basic_auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await.map_err(|source| QueryError::Request {
            url: self.url.clone(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(QueryError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await.map_err(|e| QueryError::Decode {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        self.extract(&body)
    }
}

/// Reconcile a queried deployed version into the status
///
/// With semantic versioning the version must parse. A deployed version
/// newer than latest (or any, when latest is unset) also becomes latest.
/// Returns true if `deployed_version` changed.
///
/// # Errors
/// - `QueryError::Filter` if semantic versioning is on and the version does not parse
pub fn reconcile_deployed(
    status: &Status,
    version: &str,
    semantic_versioning: bool,
) -> Result<bool, QueryError> {
    if semantic_versioning && !semantic::is_semantic(version) {
        return Err(verwatch_filter::FilterError::InvalidSemver(version.to_string()).into());
    }
    if version.is_empty() || version == status.deployed_version() {
        return Ok(false);
    }

    status.set_deployed_version(version, true);

    let latest = status.latest_version();
    let newer_than_latest = latest.is_empty()
        || (semantic_versioning
            && version != latest
            && semantic::compare(version, &latest) == Some(Ordering::Greater));
    if newer_than_latest {
        status.set_latest_version(version, true);
        status.announce_query_new_version();
    }

    tracing::info!(service = status.service_id(), version, "deployed version updated");
    status.announce_update();
    Ok(true)
}
