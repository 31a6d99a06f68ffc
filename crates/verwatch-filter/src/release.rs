//! Release-feed candidates

use serde::{Deserialize, Serialize};

/// Downloadable release asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// File name
    #[serde(default)]
    pub name: String,
    /// Download URL
    #[serde(default)]
    pub browser_download_url: String,
}

impl Asset {
    /// Create new asset
    #[must_use]
    pub fn new(name: impl Into<String>, browser_download_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            browser_download_url: browser_download_url.into(),
        }
    }
}

/// One entry of a release feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Tag the release was cut from
    pub tag_name: String,
    /// Marked as a pre-release upstream
    #[serde(default)]
    pub prerelease: bool,
    /// Attached assets
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Tag after the url_commands ran
    #[serde(skip)]
    pub version: String,
}

impl Release {
    /// Create new release from a tag
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    /// Mark as pre-release
    #[inline]
    #[must_use]
    pub fn with_prerelease(mut self, prerelease: bool) -> Self {
        self.prerelease = prerelease;
        self
    }

    /// Attach an asset
    #[must_use]
    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feed_json() {
        let json = r#"[
            {"tag_name": "v1.0.0", "prerelease": false, "assets": [
                {"name": "app.tar.gz", "browser_download_url": "https://example.test/app.tar.gz", "size": 10}
            ], "html_url": "https://example.test/r/1"},
            {"tag_name": "v1.1.0-rc1", "prerelease": true}
        ]"#;
        let releases: Vec<Release> = serde_json::from_str(json).unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].assets[0].name, "app.tar.gz");
        assert!(releases[1].prerelease);
        assert!(releases[1].assets.is_empty());
        assert!(releases[0].version.is_empty());
    }
}
