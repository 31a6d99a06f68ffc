//! Filter pipeline errors

/// Reasons a query result was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// Pattern failed to compile
    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex {
        /// Offending pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// Regex transform found nothing
    #[error("{kind} {pattern:?} didn't return any matches{}", on_text(.text))]
    NoMatch {
        /// `regex` or `regex_submatch`
        kind: &'static str,
        /// Pattern used
        pattern: String,
        /// Short input, shown only when small
        text: Option<String>,
    },

    /// Index selected past the available elements
    #[error("{kind} ({target}) returned {len} elements but the index wants element number {wanted}")]
    IndexOutOfRange {
        /// Transform kind
        kind: &'static str,
        /// Pattern or delimiter
        target: String,
        /// Elements available
        len: usize,
        /// One-based element requested
        wanted: i64,
    },

    /// Split delimiter absent
    #[error("split didn't find any {0:?} to split on")]
    SplitNotFound(String),

    /// Version-format requirement failed
    #[error("regex not matched on version {0:?}")]
    VersionRegexMiss(String),

    /// Content requirement failed
    #[error("regex {pattern:?} not matched on content for version {version:?}")]
    ContentRegexMiss {
        /// Pattern after templating
        pattern: String,
        /// Candidate version
        version: String,
    },

    /// Candidate is not a semantic version
    #[error("failed converting {0:?} to a semantic version. If all versions are in this style, consider adding url_commands to get the version into the style of '1.2.3a' (https://semver.org/), or disabling semantic versioning (globally with defaults.service.semantic_versioning or just for this service with the semantic_versioning var)")]
    InvalidSemver(String),

    /// Prior latest version is not a semantic version
    #[error("failed converting the previous version {0:?} to a semantic version, consider disabling semantic versioning for this service or clearing its latest_version")]
    InvalidPriorSemver(String),

    /// Candidate orders before the prior version
    #[error("queried version {candidate:?} is less than the deployed version {prior:?}")]
    OlderVersion {
        /// Candidate version
        candidate: String,
        /// Prior latest version
        prior: String,
    },

    /// Every release candidate was rejected
    #[error("no releases were found matching the url_commands and/or require")]
    NoReleases,
}

fn on_text(text: &Option<String>) -> String {
    text.as_ref()
        .map(|t| format!(" on {t:?}"))
        .unwrap_or_default()
}

impl FilterError {
    pub(crate) fn invalid_regex(pattern: &str, err: &regex::Error) -> Self {
        Self::InvalidRegex {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_shows_short_text_only() {
        let err = FilterError::NoMatch {
            kind: "regex",
            pattern: "v([0-9]+)".to_string(),
            text: Some("abc".to_string()),
        };
        assert_eq!(err.to_string(), "regex \"v([0-9]+)\" didn't return any matches on \"abc\"");

        let err = FilterError::NoMatch {
            kind: "regex",
            pattern: "x".to_string(),
            text: None,
        };
        assert_eq!(err.to_string(), "regex \"x\" didn't return any matches");
    }

    #[test]
    fn older_version_message() {
        let err = FilterError::OlderVersion {
            candidate: "1.2.9".to_string(),
            prior: "1.2.10".to_string(),
        };
        assert!(err.to_string().contains("is less than"));
    }
}
