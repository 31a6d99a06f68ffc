//! Service options and interval parsing
//!
//! Intervals use the `<N>h<N>m<N>s` form (`1h30m`, `45s`, `10m`); a bare
//! integer is read as seconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard-default polling interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Hard-default notification message
pub const DEFAULT_NOTIFY_MESSAGE: &str = "{{ service_id }} - {{ version }} released";

/// Hard-default notification title
pub const DEFAULT_NOTIFY_TITLE: &str = "{{ service_id }}";

/// Resolved per-service options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,
    /// Whether the tracking loop runs
    pub active: bool,
    /// Order versions semantically
    pub semantic_versioning: bool,
    /// Dispatch actions without manual approval
    pub auto_approve: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            active: true,
            semantic_versioning: true,
            auto_approve: false,
        }
    }
}

impl Options {
    /// Set polling interval
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set active flag
    #[inline]
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Set semantic versioning
    #[inline]
    #[must_use]
    pub fn with_semantic_versioning(mut self, semantic: bool) -> Self {
        self.semantic_versioning = semantic;
        self
    }

    /// Set auto-approve
    #[inline]
    #[must_use]
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }
}

/// Raw option values as written in config, every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsConfig {
    /// `<N>h<N>m<N>s`, bare integers are seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Tracking loop enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Semantic ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_versioning: Option<bool>,
}

/// Parse an interval string
///
/// Accepts `h`, `m`, `s` and `ms` units in any combination, or a bare
/// integer meaning seconds.
///
/// # Errors
/// Returns a description of the problem for empty, unitless-fractional
/// or unknown-unit input.
pub fn parse_interval(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in duration {text:?}"))?;
        if digits == 0 {
            return Err(format!("invalid duration {text:?}"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {text:?}"))?;
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "s" => Duration::from_secs(value),
            "ms" => Duration::from_millis(value),
            other => return Err(format!("unknown unit {other:?} in duration {text:?}")),
        };
        total = total.saturating_add(unit);
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// Format a duration as `<N>h<N>m<N>s`, omitting zero parts
#[must_use]
pub fn format_interval(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 {
        out.push_str(&format!("{s}s"));
    }
    out
}
