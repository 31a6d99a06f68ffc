//! Error types for verwatch core
//!
//! Provides error handling for:
//! - Version source and deployed-version lookups
//! - Command/WebHook/notifier execution
//! - Configuration loading and validation

use std::fmt;
use verwatch_filter::FilterError;
use verwatch_status::StatusError;

/// Main verwatch error type
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Version lookup failed
    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    /// Candidate rejected
    #[error("filter rejected: {0}")]
    Filter(#[from] FilterError),

    /// Action failed
    #[error("action failed: {0}")]
    Action(#[from] ActionError),

    /// Configuration problem
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Status ledger misuse
    #[error("status error: {0}")]
    Status(#[from] StatusError),

    /// Unknown service
    #[error("service {0:?} not found")]
    UnknownService(String),
}

/// Errors from version sources and deployed-version lookups
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Transport failure
    #[error("request to {url} failed: {source}")]
    Request {
        /// Target URL
        url: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },

    /// Non-success response
    #[error("{url} returned status {status}")]
    Status {
        /// Target URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Body could not be decoded
    #[error("failed to decode response from {url}: {reason}")]
    Decode {
        /// Target URL
        url: String,
        /// Decoder message
        reason: String,
    },

    /// JSON path missing in the response
    #[error("failed to find value for {path:?} in response from {url}")]
    JsonPath {
        /// Dotted path
        path: String,
        /// Target URL
        url: String,
    },

    /// Lookup regex found nothing
    #[error("regex {pattern:?} didn't find a match on {text:?}")]
    NoMatch {
        /// Pattern
        pattern: String,
        /// Searched value
        text: String,
    },

    /// Candidate rejected by the filter pipeline
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Source not available (scripted or disabled sources)
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Errors from Commands, WebHooks and notifiers
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Empty argv
    #[error("command is empty")]
    EmptyCommand,

    /// Process could not start
    #[error("failed to start {program:?}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Process exited non-zero
    #[error("{program:?} exited with {}: {stderr}", exit_code(*.code))]
    Exit {
        /// Program name
        program: String,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Trimmed stderr
        stderr: String,
    },

    /// Transport failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response did not meet the success criteria
    #[error("gave {status}, not {desired}: {body}")]
    UnexpectedResponse {
        /// Received status
        status: u16,
        /// Desired status (`2XX` for any success)
        desired: String,
        /// Response body
        body: String,
    },

    /// Gave up after every try failed
    #[error("failed {tries} times to send to {target}: {last}")]
    Exhausted {
        /// Tries made
        tries: u32,
        /// Target description
        target: String,
        /// Last failure
        last: Box<ActionError>,
    },

    /// Service deletion interrupted the action
    #[error("service is being deleted")]
    Deleting,

    /// Signing key rejected
    #[error("invalid signing secret")]
    Signature,

    /// Scripted failure (test doubles)
    #[error("{0}")]
    Message(String),
}

fn exit_code(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}

/// One configuration problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted location, e.g. `service.argus.latest_version.url`
    pub path: String,
    /// What is wrong
    pub message: String,
}

impl ConfigIssue {
    /// Create new issue
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every problem found while validating a configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigErrors {
    issues: Vec<ConfigIssue>,
}

impl ConfigErrors {
    /// Create new empty list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ConfigIssue::new(path, message));
    }

    /// Merge another list
    pub fn extend(&mut self, other: ConfigErrors) {
        self.issues.extend(other.issues);
    }

    /// Recorded problems
    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    /// Whether nothing was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Ok` if empty, otherwise `Err(self)`
    ///
    /// # Errors
    /// Returns the list when it holds any problem.
    pub fn into_result(self) -> Result<(), ConfigErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// YAML could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Validation failed
    #[error("invalid config:\n{0}")]
    Invalid(#[from] ConfigErrors),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_collects() {
        let mut errs = ConfigErrors::new();
        assert!(errs.clone().into_result().is_ok());

        errs.push("service.a.options.interval", "invalid duration \"ten\"");
        errs.push("service.b.latest_version.url", "<required>");
        assert_eq!(errs.issues().len(), 2);
        assert_eq!(
            errs.to_string(),
            "service.a.options.interval: invalid duration \"ten\"\nservice.b.latest_version.url: <required>"
        );
        assert!(errs.into_result().is_err());
    }

    #[test]
    fn exit_error_display() {
        let err = ActionError::Exit {
            program: "false".to_string(),
            code: Some(1),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "\"false\" exited with code 1: ");
    }

    #[test]
    fn watch_error_from() {
        let err: WatchError = QueryError::Unavailable("down".to_string()).into();
        assert!(err.to_string().contains("down"));
    }
}
