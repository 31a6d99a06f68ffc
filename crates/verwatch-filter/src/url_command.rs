//! Ordered text transforms applied to raw query output
//!
//! - `regex`: select one match (negative index counts from the end) and
//!   return its last capture group, or the whole match without groups
//! - `regex_submatch`: capture group of the first match (default group 1)
//! - `split`: select one piece after splitting on a literal
//! - `replace`: literal replace-all

use crate::error::FilterError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Inputs shorter than this are echoed in "no match" errors
const ECHO_LIMIT: usize = 20;

/// A single transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UrlCommandKind {
    /// Regex match selection
    Regex {
        /// Pattern
        regex: String,
        /// Match to select
        #[serde(default)]
        index: i64,
    },
    /// Regex capture group of the first match
    RegexSubmatch {
        /// Pattern
        regex: String,
        /// Group to select
        #[serde(default = "default_submatch_index")]
        index: i64,
    },
    /// Split on a literal
    Split {
        /// Delimiter
        text: String,
        /// Piece to select
        #[serde(default)]
        index: i64,
    },
    /// Literal replace-all
    Replace {
        /// Text to replace
        old: String,
        /// Replacement
        #[serde(default)]
        new: String,
    },
}

fn default_submatch_index() -> i64 {
    1
}

/// A transform plus its logging policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlCommand {
    /// Transform
    #[serde(flatten)]
    pub kind: UrlCommandKind,
    /// Log a miss at debug instead of warn (the miss still aborts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_misses: Option<bool>,
}

impl UrlCommand {
    /// Create new transform with default miss logging
    #[inline]
    #[must_use]
    pub fn new(kind: UrlCommandKind) -> Self {
        Self {
            kind,
            ignore_misses: None,
        }
    }

    /// Set miss logging policy
    #[inline]
    #[must_use]
    pub fn with_ignore_misses(mut self, ignore: bool) -> Self {
        self.ignore_misses = Some(ignore);
        self
    }

    /// Regex selection shorthand
    #[must_use]
    pub fn regex(pattern: impl Into<String>, index: i64) -> Self {
        Self::new(UrlCommandKind::Regex {
            regex: pattern.into(),
            index,
        })
    }

    /// Regex capture-group shorthand
    #[must_use]
    pub fn regex_submatch(pattern: impl Into<String>, index: i64) -> Self {
        Self::new(UrlCommandKind::RegexSubmatch {
            regex: pattern.into(),
            index,
        })
    }

    /// Split shorthand
    #[must_use]
    pub fn split(text: impl Into<String>, index: i64) -> Self {
        Self::new(UrlCommandKind::Split {
            text: text.into(),
            index,
        })
    }

    /// Replace shorthand
    #[must_use]
    pub fn replace(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::new(UrlCommandKind::Replace {
            old: old.into(),
            new: new.into(),
        })
    }

    /// Validate the transform's configuration
    ///
    /// # Errors
    /// - `FilterError::InvalidRegex` if a pattern does not compile
    pub fn check(&self) -> Result<(), FilterError> {
        match &self.kind {
            UrlCommandKind::Regex { regex, .. } | UrlCommandKind::RegexSubmatch { regex, .. } => {
                Regex::new(regex)
                    .map(|_| ())
                    .map_err(|e| FilterError::invalid_regex(regex, &e))
            }
            UrlCommandKind::Split { .. } | UrlCommandKind::Replace { .. } => Ok(()),
        }
    }

    /// Apply the transform
    ///
    /// # Errors
    /// - `FilterError::NoMatch` / `FilterError::SplitNotFound` when nothing matched
    /// - `FilterError::IndexOutOfRange` when the index selects past the results
    pub fn apply(&self, text: &str) -> Result<String, FilterError> {
        match &self.kind {
            UrlCommandKind::Regex { regex, index } => regex_select(regex, *index, text),
            UrlCommandKind::RegexSubmatch { regex, index } => regex_submatch(regex, *index, text),
            UrlCommandKind::Split { text: on, index } => split_select(on, *index, text),
            UrlCommandKind::Replace { old, new } => Ok(text.replace(old.as_str(), new)),
        }
    }
}

fn echo(text: &str) -> Option<String> {
    (text.len() < ECHO_LIMIT).then(|| text.to_string())
}

/// Resolve a possibly negative index against `len`
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len_i = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len_i + index } else { index };
    usize::try_from(resolved).ok().filter(|i| *i < len)
}

fn out_of_range(kind: &'static str, target: &str, len: usize, index: i64) -> FilterError {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { len_i + index } else { index };
    FilterError::IndexOutOfRange {
        kind,
        target: target.to_string(),
        len,
        wanted: resolved.saturating_add(1),
    }
}

fn regex_select(pattern: &str, index: i64, text: &str) -> Result<String, FilterError> {
    let re = Regex::new(pattern).map_err(|e| FilterError::invalid_regex(pattern, &e))?;
    let matches: Vec<_> = re.captures_iter(text).collect();
    if matches.is_empty() {
        return Err(FilterError::NoMatch {
            kind: "regex",
            pattern: pattern.to_string(),
            text: echo(text),
        });
    }
    let i = resolve_index(index, matches.len())
        .ok_or_else(|| out_of_range("regex", pattern, matches.len(), index))?;
    let caps = &matches[i];
    let last = (0..caps.len()).rev().find_map(|g| caps.get(g));
    Ok(last.map(|m| m.as_str().to_string()).unwrap_or_default())
}

fn regex_submatch(pattern: &str, index: i64, text: &str) -> Result<String, FilterError> {
    let re = Regex::new(pattern).map_err(|e| FilterError::invalid_regex(pattern, &e))?;
    let Some(caps) = re.captures(text) else {
        return Err(FilterError::NoMatch {
            kind: "regex_submatch",
            pattern: pattern.to_string(),
            text: echo(text),
        });
    };
    let i = resolve_index(index, caps.len())
        .ok_or_else(|| out_of_range("regex_submatch", pattern, caps.len(), index))?;
    Ok(caps
        .get(i)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

fn split_select(on: &str, index: i64, text: &str) -> Result<String, FilterError> {
    let pieces: Vec<&str> = text.split(on).collect();
    if pieces.len() == 1 {
        return Err(FilterError::SplitNotFound(on.to_string()));
    }
    let i = resolve_index(index, pieces.len())
        .ok_or_else(|| out_of_range("split", on, pieces.len(), index))?;
    Ok(pieces[i].to_string())
}

/// Run every transform in order, stopping at the first failure
///
/// Misses log at warn unless the failing transform ignores misses.
///
/// # Errors
/// The first transform error.
pub fn run_all(commands: &[UrlCommand], text: &str, service_id: &str) -> Result<String, FilterError> {
    let mut current = text.to_string();
    for command in commands {
        match command.apply(&current) {
            Ok(next) => {
                tracing::trace!(service = service_id, from = %current, to = %next, "url_command resolved");
                current = next;
            }
            Err(err) => {
                if command.ignore_misses.unwrap_or(false) {
                    tracing::debug!(service = service_id, error = %err, "url_command miss");
                } else {
                    tracing::warn!(service = service_id, error = %err, "url_command miss");
                }
                return Err(err);
            }
        }
    }
    Ok(current)
}

/// Validate every transform, collecting `(position, error)` pairs
#[must_use]
pub fn check_all(commands: &[UrlCommand]) -> Vec<(usize, FilterError)> {
    commands
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.check().err().map(|e| (i, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn regex_selects_last_group() {
        let cmd = UrlCommand::regex(r"v([0-9.]+)", 0);
        assert_eq!(cmd.apply("release v1.2.3 and v1.2.4").unwrap(), "1.2.3");
    }

    #[test]
    fn regex_negative_index() {
        let cmd = UrlCommand::regex(r"v([0-9.]+)", -1);
        assert_eq!(cmd.apply("release v1.2.3 and v1.2.4").unwrap(), "1.2.4");
    }

    #[test]
    fn regex_without_group_returns_match() {
        let cmd = UrlCommand::regex(r"[0-9]+\.[0-9]+", 1);
        assert_eq!(cmd.apply("1.0 2.0 3.0").unwrap(), "2.0");
    }

    #[test]
    fn regex_no_match() {
        let cmd = UrlCommand::regex(r"v([0-9]+)", 0);
        let err = cmd.apply("nothing").unwrap_err();
        assert!(matches!(err, FilterError::NoMatch { text: Some(_), .. }));
    }

    #[test]
    fn regex_index_out_of_range() {
        let cmd = UrlCommand::regex(r"([0-9])", 5);
        let err = cmd.apply("1 2").unwrap_err();
        assert_eq!(
            err.to_string(),
            "regex (([0-9])) returned 2 elements but the index wants element number 6"
        );
    }

    #[test]
    fn regex_huge_index_saturates() {
        let cmd = UrlCommand::split(" ", i64::MAX);
        let err = cmd.apply("1 2").unwrap_err();
        assert!(matches!(
            err,
            FilterError::IndexOutOfRange { len: 2, wanted: i64::MAX, .. }
        ));
        let cmd = UrlCommand::regex(r"([0-9])", i64::MAX);
        assert!(cmd.apply("1 2").is_err());
    }

    #[test]
    fn regex_submatch_default_group() {
        let cmd = UrlCommand::regex_submatch(r"app-([0-9.]+)-(linux)", 1);
        assert_eq!(cmd.apply("app-2.1.0-linux.tar").unwrap(), "2.1.0");
        let cmd = UrlCommand::regex_submatch(r"app-([0-9.]+)-(linux)", -1);
        assert_eq!(cmd.apply("app-2.1.0-linux.tar").unwrap(), "linux");
    }

    #[test]
    fn split_selects_piece() {
        let cmd = UrlCommand::split("/", -1);
        assert_eq!(cmd.apply("refs/tags/v1.0.0").unwrap(), "v1.0.0");
    }

    #[test]
    fn split_missing_delimiter() {
        let cmd = UrlCommand::split("_", 0);
        assert_eq!(
            cmd.apply("abc").unwrap_err(),
            FilterError::SplitNotFound("_".to_string())
        );
    }

    #[test]
    fn replace_all() {
        let cmd = UrlCommand::replace("-", ".");
        assert_eq!(cmd.apply("1-2-3").unwrap(), "1.2.3");
    }

    #[test]
    fn run_all_chains_and_stops() {
        let commands = vec![
            UrlCommand::split("/", -1),
            UrlCommand::regex(r"v([0-9.]+)", 0),
        ];
        assert_eq!(run_all(&commands, "refs/tags/v1.4.0", "svc").unwrap(), "1.4.0");

        let commands = vec![
            UrlCommand::split("#", 0).with_ignore_misses(true),
            UrlCommand::replace("a", "b"),
        ];
        assert!(run_all(&commands, "abc", "svc").is_err());
    }

    #[test]
    fn check_reports_bad_regex() {
        let commands = vec![UrlCommand::replace("a", "b"), UrlCommand::regex("(", 0)];
        let errs = check_all(&commands);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].0, 1);
    }

    #[test]
    fn deserialize_tagged() {
        let yaml = "- type: regex\n  regex: 'v([0-9.]+)'\n- type: split\n  text: '-'\n  index: 1\n  ignore_misses: false\n";
        let commands: Vec<UrlCommand> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(commands[0], UrlCommand::regex("v([0-9.]+)", 0));
        assert_eq!(commands[1], UrlCommand::split("-", 1).with_ignore_misses(false));
    }
}
