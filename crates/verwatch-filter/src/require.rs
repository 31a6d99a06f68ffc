//! Version-format and content requirements
//!
//! Misses are counted on the service's status. The first miss of a
//! streak logs at info, repeats at debug.

use crate::error::FilterError;
use crate::release::Asset;
use crate::template::{render_regex, TemplateContext};
use regex::Regex;
use serde::{Deserialize, Serialize};
use verwatch_status::Status;

/// What the content requirement searches
#[derive(Debug, Clone, Copy)]
pub enum ContentTarget<'a> {
    /// Raw response body
    Body(&'a str),
    /// Release assets (name and download URL)
    Assets(&'a [Asset]),
}

/// Requirements a candidate version must meet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Require {
    /// Regex the version must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_version: Option<String>,
    /// Regex the content must match, `{{ version }}` is substituted first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_content: Option<String>,
}

impl Require {
    /// Whether there is nothing to check
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regex_version.is_none() && self.regex_content.is_none()
    }

    /// Validate the patterns
    ///
    /// # Errors
    /// Every pattern that fails to compile.
    pub fn check(&self) -> Vec<FilterError> {
        let mut errs = Vec::new();
        if let Some(pattern) = &self.regex_version {
            if let Err(e) = Regex::new(pattern) {
                errs.push(FilterError::invalid_regex(pattern, &e));
            }
        }
        if let Some(pattern) = &self.regex_content {
            let sample = render_regex(pattern, &TemplateContext::new("", "0.0.0"));
            if let Err(e) = Regex::new(&sample) {
                errs.push(FilterError::invalid_regex(pattern, &e));
            }
        }
        errs
    }

    /// Check the version-format requirement
    ///
    /// # Errors
    /// - `FilterError::VersionRegexMiss` on no match
    /// - `FilterError::InvalidRegex` on a bad pattern
    pub fn check_version(&self, version: &str, status: &Status) -> Result<(), FilterError> {
        let Some(pattern) = &self.regex_version else {
            return Ok(());
        };
        let re = Regex::new(pattern).map_err(|e| FilterError::invalid_regex(pattern, &e))?;
        if re.is_match(version) {
            return Ok(());
        }

        let err = FilterError::VersionRegexMiss(version.to_string());
        let misses = status.record_version_miss();
        log_miss(status.service_id(), misses, &err);
        Err(err)
    }

    /// Check the content requirement
    ///
    /// # Errors
    /// - `FilterError::ContentRegexMiss` if nothing in the target matches
    /// - `FilterError::InvalidRegex` on a bad pattern
    pub fn check_content(
        &self,
        version: &str,
        target: ContentTarget<'_>,
        status: &Status,
    ) -> Result<(), FilterError> {
        let Some(pattern) = &self.regex_content else {
            return Ok(());
        };
        let rendered = render_regex(pattern, &TemplateContext::new(status.service_id(), version));
        let re = Regex::new(&rendered).map_err(|e| FilterError::invalid_regex(pattern, &e))?;

        let matched = match target {
            ContentTarget::Body(body) => re.is_match(body),
            ContentTarget::Assets(assets) => assets.iter().any(|asset| {
                let hit = re.is_match(&asset.name) || re.is_match(&asset.browser_download_url);
                tracing::trace!(service = status.service_id(), asset = %asset.name, hit, "regex_content on asset");
                hit
            }),
        };
        if matched {
            return Ok(());
        }

        let err = FilterError::ContentRegexMiss {
            pattern: rendered,
            version: version.to_string(),
        };
        let misses = status.record_content_miss();
        log_miss(status.service_id(), misses, &err);
        Err(err)
    }
}

fn log_miss(service_id: &str, misses: u32, err: &FilterError) {
    if misses == 1 {
        tracing::info!(service = service_id, error = %err, "require miss");
    } else {
        tracing::debug!(service = service_id, error = %err, misses, "require miss");
    }
}
