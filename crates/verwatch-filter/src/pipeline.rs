//! Filter pipeline
//!
//! Fail-fast chain from raw query output to one candidate version:
//! 1. Pre-release policy (release feeds only)
//! 2. url_commands
//! 3. Version-format requirement
//! 4. Content requirement
//!
//! Release feeds fall through to the next release when a step rejects a
//! candidate. The semantic-version progression check is not part of the
//! pipeline, see [`crate::semantic::check_progression`].

use crate::error::FilterError;
use crate::release::Release;
use crate::require::{ContentTarget, Require};
use crate::semantic;
use crate::url_command::{run_all, UrlCommand};
use verwatch_status::Status;

/// Configured filter chain for one service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    /// Text transforms
    pub url_commands: Vec<UrlCommand>,
    /// Version/content requirements
    pub require: Require,
    /// Keep pre-releases
    pub use_prerelease: bool,
    /// Order release candidates by semantic version
    pub semantic_versioning: bool,
}

impl Pipeline {
    /// Create new pipeline
    #[must_use]
    pub fn new(url_commands: Vec<UrlCommand>, require: Require) -> Self {
        Self {
            url_commands,
            require,
            use_prerelease: false,
            semantic_versioning: true,
        }
    }

    /// Set pre-release policy
    #[inline]
    #[must_use]
    pub fn with_prerelease(mut self, use_prerelease: bool) -> Self {
        self.use_prerelease = use_prerelease;
        self
    }

    /// Set semantic ordering
    #[inline]
    #[must_use]
    pub fn with_semantic_versioning(mut self, semantic: bool) -> Self {
        self.semantic_versioning = semantic;
        self
    }

    /// Derive a version from a text body
    ///
    /// # Errors
    /// The first rejecting step.
    pub fn select_from_text(&self, body: &str, status: &Status) -> Result<String, FilterError> {
        let version = run_all(&self.url_commands, body, status.service_id())?;
        self.require.check_version(&version, status)?;
        self.require
            .check_content(&version, ContentTarget::Body(body), status)?;
        Ok(version)
    }

    /// Apply the pre-release policy and url_commands to a release feed
    ///
    /// Releases whose tag fails the transforms are dropped. With semantic
    /// versioning, non-semantic tags are dropped and the rest ordered
    /// newest first; otherwise feed order is kept.
    #[must_use]
    pub fn prepare_releases(&self, releases: Vec<Release>, service_id: &str) -> Vec<Release> {
        let mut kept: Vec<Release> = releases
            .into_iter()
            .filter(|r| self.use_prerelease || !r.prerelease)
            .filter_map(|mut r| match run_all(&self.url_commands, &r.tag_name, service_id) {
                Ok(version) => {
                    r.version = version;
                    Some(r)
                }
                Err(err) => {
                    tracing::debug!(service = service_id, tag = %r.tag_name, error = %err, "release dropped");
                    None
                }
            })
            .collect();

        if self.semantic_versioning {
            let mut parsed: Vec<(semver::Version, Release)> = kept
                .into_iter()
                .filter_map(|r| semantic::parse(&r.version).map(|v| (v, r)))
                .collect();
            parsed.sort_by(|a, b| b.0.cmp(&a.0));
            kept = parsed.into_iter().map(|(_, r)| r).collect();
        }
        kept
    }

    /// Pick the first prepared release that meets the requirements
    ///
    /// A release equal to the current latest version is returned without
    /// re-checking, since it was accepted before.
    ///
    /// # Errors
    /// - `FilterError::NoReleases` if every release is rejected
    pub fn select_from_releases(
        &self,
        releases: &[Release],
        status: &Status,
    ) -> Result<String, FilterError> {
        let latest = status.latest_version();
        for release in releases {
            if !latest.is_empty() && release.version == latest {
                return Ok(release.version.clone());
            }
            if self.require.check_version(&release.version, status).is_err() {
                continue;
            }
            if self
                .require
                .check_content(&release.version, ContentTarget::Assets(&release.assets), status)
                .is_err()
            {
                continue;
            }
            return Ok(release.version.clone());
        }
        Err(FilterError::NoReleases)
    }
}
