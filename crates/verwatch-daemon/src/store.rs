//! State file
//!
//! Persist messages and save requests are folded back into the loaded
//! configuration, which is then rewritten in place. Writes go through a
//! sibling temp file and a rename.

use anyhow::Context;
use std::path::{Path, PathBuf};
use verwatch_core::{Config, ServiceRegistry};
use verwatch_status::{PersistMessage, StatusSnapshot};

/// Configuration plus the path it is written back to
#[derive(Debug)]
pub(crate) struct StateStore {
    path: PathBuf,
    config: Config,
    dirty: bool,
}

impl StateStore {
    pub(crate) fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
            dirty: false,
        }
    }

    #[inline]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[cfg(test)]
    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Record a persist message
    ///
    /// Deletes drop the service entry; updates only mark the store dirty,
    /// the values are read from the live status at the next flush.
    pub(crate) fn apply(&mut self, message: &PersistMessage) {
        if message.delete {
            self.config.service.shift_remove(&message.service_id);
        }
        self.dirty = true;
    }

    /// Copy live snapshots into the configuration
    pub(crate) fn refresh<I>(&mut self, snapshots: I)
    where
        I: IntoIterator<Item = (String, StatusSnapshot)>,
    {
        for (id, snapshot) in snapshots {
            if let Some(service) = self.config.service.get_mut(&id) {
                service.status = Some(snapshot);
            }
        }
    }

    /// Snapshot every registered service and write the file
    pub(crate) async fn flush(&mut self, registry: &ServiceRegistry) -> anyhow::Result<()> {
        let snapshots = registry
            .ids()
            .into_iter()
            .filter_map(|id| registry.get(&id).map(|s| (id, s.status().snapshot())))
            .collect::<Vec<_>>();
        self.refresh(snapshots);
        self.write().await
    }

    async fn write(&mut self) -> anyhow::Result<()> {
        let yaml = self.config.to_yaml()?;
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, yaml)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use verwatch_core::WatchContext;
    use verwatch_status::DeliveryChannels;

    const CONFIG: &str = r"
service:
  alpha:
    command:
      - [echo, hi]
  beta:
    command:
      - [echo, hi]
";

    fn store(dir: &tempfile::TempDir) -> StateStore {
        let path = dir.path().join("config.yml");
        std::fs::write(&path, CONFIG).unwrap();
        StateStore::new(path, Config::from_yaml(CONFIG).unwrap())
    }

    #[test]
    fn delete_removes_service() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&dir);

        store.apply(&PersistMessage::delete("alpha"));

        assert!(store.is_dirty());
        assert_eq!(
            store.config().service.keys().cloned().collect::<Vec<_>>(),
            vec!["beta".to_string()]
        );
    }

    #[tokio::test]
    async fn refresh_and_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&dir);
        let snapshot = StatusSnapshot {
            latest_version: "1.2.0".to_string(),
            deployed_version: "1.1.0".to_string(),
            ..StatusSnapshot::default()
        };

        store.apply(&PersistMessage::update("beta", []));
        store.refresh([
            ("beta".to_string(), snapshot.clone()),
            ("gone".to_string(), StatusSnapshot::default()),
        ]);
        store.write().await.unwrap();

        assert!(!store.is_dirty());
        let reloaded = Config::load(dir.path().join("config.yml")).unwrap();
        assert_eq!(reloaded.service["beta"].status, Some(snapshot));
        assert_eq!(reloaded.service["alpha"].status, None);
        assert_eq!(reloaded.service.len(), 2);
    }

    #[tokio::test]
    async fn flush_writes_live_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&dir);
        let ctx = Arc::new(WatchContext::new().unwrap());
        let (channels, _rx) = DeliveryChannels::unbounded();
        let registry = ServiceRegistry::new(channels);
        for service in Config::from_yaml(CONFIG).unwrap().build_services(&ctx).unwrap() {
            registry.register(service);
        }
        registry
            .get("alpha")
            .unwrap()
            .status()
            .set_latest_version("2.0.0", false);

        store.flush(&registry).await.unwrap();

        let reloaded = Config::load(dir.path().join("config.yml")).unwrap();
        assert_eq!(
            reloaded.service["alpha"]
                .status
                .as_ref()
                .map(|s| s.latest_version.as_str()),
            Some("2.0.0")
        );
    }
}
