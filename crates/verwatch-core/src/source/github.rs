use super::{SourceType, VersionSource};
use crate::context::WatchContext;
use crate::error::{ConfigErrors, QueryError};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use verwatch_filter::{url_command, Pipeline, Release};
use verwatch_status::Status;

const API_ROOT: &str = "https://api.github.com/repos";

/// Last successful response
#[derive(Debug, Default)]
struct ReleaseCache {
    etag: Option<String>,
    /// Releases after the pre-release policy, url_commands and ordering
    releases: Option<Vec<Release>>,
}

/// GitHub releases source
///
/// Conditional requests send the cached ETag; a `304 Not Modified`
/// reuses the filtered releases from the previous response.
#[derive(Debug)]
pub struct GitHubSource {
    repo: String,
    access_token: Option<String>,
    pipeline: Pipeline,
    cache: Mutex<ReleaseCache>,
}

impl GitHubSource {
    /// Create new source from `owner/repo` or a full API URL
    #[must_use]
    pub fn new(repo: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            repo: repo.into(),
            access_token: None,
            pipeline,
            cache: Mutex::new(ReleaseCache::default()),
        }
    }

    /// Authenticate with a token
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Releases endpoint
    #[must_use]
    pub fn api_url(&self) -> String {
        if self.repo.starts_with("http://") || self.repo.starts_with("https://") {
            self.repo.clone()
        } else {
            format!("{API_ROOT}/{}/releases", self.repo.trim_matches('/'))
        }
    }

    /// Filter pipeline
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn cached(&self) -> Option<Vec<Release>> {
        self.cache.lock().releases.clone()
    }

    async fn fetch(&self, status: &Status, ctx: &WatchContext) -> Result<Vec<Release>, QueryError> {
        let url = self.api_url();
        let etag = self.cache.lock().etag.clone();

        let mut request = ctx
            .http(false)
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.access_token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }
        if let Some(etag) = &etag {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = request.send().await.map_err(|source| QueryError::Request {
            url: url.clone(),
            source,
        })?;

        if response.status() == StatusCode::NOT_MODIFIED {
            if let Some(releases) = self.cached() {
                tracing::debug!(service = status.service_id(), "releases unchanged (etag)");
                return Ok(releases);
            }
        }
        if !response.status().is_success() {
            return Err(QueryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let new_etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let raw: Vec<Release> = response.json().await.map_err(|e| QueryError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let releases = self.pipeline.prepare_releases(raw, status.service_id());

        let mut cache = self.cache.lock();
        cache.etag = new_etag;
        cache.releases = Some(releases.clone());
        Ok(releases)
    }
}

#[async_trait]
impl VersionSource for GitHubSource {
    fn source_type(&self) -> SourceType {
        SourceType::GitHub
    }

    fn service_url(&self) -> String {
        if self.repo.contains("://") {
            self.repo.clone()
        } else {
            format!("https://github.com/{}", self.repo.trim_matches('/'))
        }
    }

    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let mut errs = ConfigErrors::new();
        if self.repo.is_empty() {
            errs.push(format!("{prefix}.url"), "<required> (owner/repo)");
        } else if !self.repo.contains('/') {
            errs.push(
                format!("{prefix}.url"),
                format!("{:?} <invalid> (expected owner/repo)", self.repo),
            );
        }
        for (i, err) in url_command::check_all(&self.pipeline.url_commands) {
            errs.push(format!("{prefix}.url_commands[{i}]"), err.to_string());
        }
        for err in self.pipeline.require.check() {
            errs.push(format!("{prefix}.require"), err.to_string());
        }
        errs
    }

    async fn query(
        &self,
        use_cache: bool,
        status: &Status,
        ctx: &WatchContext,
    ) -> Result<String, QueryError> {
        let releases = match self.cached().filter(|_| use_cache) {
            Some(releases) => releases,
            None => self.fetch(status, ctx).await?,
        };
        Ok(self.pipeline.select_from_releases(&releases, status)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_owner_repo() {
        let source = GitHubSource::new("release-argus/Argus", Pipeline::default());
        assert_eq!(
            source.api_url(),
            "https://api.github.com/repos/release-argus/Argus/releases"
        );
        assert_eq!(source.service_url(), "https://github.com/release-argus/Argus");
    }

    #[test]
    fn keeps_full_url() {
        let url = "https://ghe.example.test/api/v3/repos/a/b/releases";
        let source = GitHubSource::new(url, Pipeline::default());
        assert_eq!(source.api_url(), url);
    }

    #[test]
    fn check_values_requires_owner_repo() {
        let source = GitHubSource::new("argus", Pipeline::default());
        assert_eq!(source.check_values("lv").issues().len(), 1);
        let source = GitHubSource::new("a/b", Pipeline::default());
        assert!(source.check_values("lv").is_empty());
    }

    #[tokio::test]
    async fn use_cache_skips_fetch() {
        let source = GitHubSource::new("a/b", Pipeline::default());
        let prepared = source
            .pipeline()
            .prepare_releases(vec![Release::new("1.0.0"), Release::new("0.9.0")], "svc");
        source.cache.lock().releases = Some(prepared);

        let status = Status::new("svc");
        let ctx = WatchContext::new().unwrap();
        let version = source.query(true, &status, &ctx).await.unwrap();
        assert_eq!(version, "1.0.0");
    }
}
