//! Latest-version sources
//!
//! Every source fetches raw data and runs it through its
//! [`Pipeline`](verwatch_filter::Pipeline), returning one candidate
//! version. Variants:
//! - [`GitHubSource`]: release feed with ETag caching
//! - [`WebSource`]: any URL, transforms applied to the body

mod github;
mod web;

pub use github::GitHubSource;
pub use web::WebSource;

use crate::context::WatchContext;
use crate::error::{ConfigErrors, QueryError};
use async_trait::async_trait;
use std::fmt;
use verwatch_status::Status;

/// Discriminator of a [`VersionSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Release feed
    GitHub,
    /// Generic web page
    Url,
    /// Anything else (test doubles, embedders)
    Custom,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GitHub => "github",
            Self::Url => "url",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Lookup of the newest published version
#[async_trait]
pub trait VersionSource: Send + Sync + fmt::Debug {
    /// Discriminator
    fn source_type(&self) -> SourceType;

    /// Human-facing URL for logs and the UI
    fn service_url(&self) -> String;

    /// Validate configuration, paths are prefixed with `prefix`
    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let _ = prefix;
        ConfigErrors::new()
    }

    /// Fetch and filter, returning the candidate version
    ///
    /// `use_cache` lets a caller reuse cached response data instead of
    /// forcing a remote call. Filter misses update `status` counters.
    ///
    /// # Errors
    /// - `QueryError` on transport, decode or filter failure
    async fn query(
        &self,
        use_cache: bool,
        status: &Status,
        ctx: &WatchContext,
    ) -> Result<String, QueryError>;
}
