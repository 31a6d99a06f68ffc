use super::{SourceType, VersionSource};
use crate::context::WatchContext;
use crate::error::{ConfigErrors, QueryError};
use async_trait::async_trait;
use verwatch_filter::{url_command, Pipeline};
use verwatch_status::Status;

/// Generic web page source
#[derive(Debug, Clone)]
pub struct WebSource {
    url: String,
    allow_invalid_certs: bool,
    pipeline: Pipeline,
}

impl WebSource {
    /// Create new web source
    #[must_use]
    pub fn new(url: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            url: url.into(),
            allow_invalid_certs: false,
            pipeline,
        }
    }

    /// Accept invalid TLS certificates
    #[inline]
    #[must_use]
    pub fn with_allow_invalid_certs(mut self, allow: bool) -> Self {
        self.allow_invalid_certs = allow;
        self
    }

    /// Filter pipeline
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    async fn fetch(&self, ctx: &WatchContext) -> Result<String, QueryError> {
        let response = ctx
            .http(self.allow_invalid_certs)
            .get(&self.url)
            .send()
            .await
            .map_err(|source| QueryError::Request {
                url: self.url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|e| QueryError::Decode {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl VersionSource for WebSource {
    fn source_type(&self) -> SourceType {
        SourceType::Url
    }

    fn service_url(&self) -> String {
        self.url.clone()
    }

    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let mut errs = ConfigErrors::new();
        if self.url.is_empty() {
            errs.push(format!("{prefix}.url"), "<required>");
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
        _use_cache: bool,
        status: &Status,
        ctx: &WatchContext,
    ) -> Result<String, QueryError> {
        let body = self.fetch(ctx).await?;
        Ok(self.pipeline.select_from_text(&body, status)?)
    }
}
