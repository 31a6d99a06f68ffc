//! Registry of running services
//!
//! Lock-free lookup of services by ID (dashmap), an ordered ID list for
//! staggered start-up, and the join handle of each tracking loop.

use crate::service::Service;
use crate::tracker::spawn_tracker;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use verwatch_status::DeliveryChannels;

/// Every configured service
#[derive(Debug)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<Service>>,
    handles: DashMap<String, JoinHandle<()>>,
    order: RwLock<Vec<String>>,
    channels: DeliveryChannels,
}

impl ServiceRegistry {
    /// Create new registry; every service is wired to `channels`
    #[must_use]
    pub fn new(channels: DeliveryChannels) -> Self {
        Self {
            services: DashMap::new(),
            handles: DashMap::new(),
            order: RwLock::new(Vec::new()),
            channels,
        }
    }

    /// Add a service without starting it
    ///
    /// An existing service with the same ID is marked deleting and its
    /// state carried over.
    pub fn register(&self, service: Service) -> Arc<Service> {
        service.init(self.channels.clone());
        let id = service.id().to_string();

        if let Some(old) = self.services.get(&id).map(|s| Arc::clone(s.value())) {
            old.status().set_deleting();
            service.inherit(&old);
            tracing::info!(service = %id, "replacing service");
        } else {
            self.order.write().push(id.clone());
        }

        let service = Arc::new(service);
        self.services.insert(id, Arc::clone(&service));
        service
    }

    /// Start the tracking loop of a registered service
    ///
    /// Returns false if the ID is unknown.
    pub fn start(&self, id: &str) -> bool {
        let Some(service) = self.get(id) else {
            return false;
        };
        let handle = spawn_tracker(service);
        // The old loop exits on its own once it sees the deleting flag
        self.handles.insert(id.to_string(), handle);
        true
    }

    /// Start every registered service in order, staggered
    pub async fn start_all(&self) {
        let ids = self.ids();
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                if let Some(service) = self.get(id) {
                    tokio::time::sleep(service.ctx().timing().service_stagger).await;
                }
            }
            self.start(id);
        }
        tracing::info!(count = ids.len(), "services started");
    }

    /// Register and start, replacing any service with the same ID
    pub fn replace(&self, service: Service) -> Arc<Service> {
        let service = self.register(service);
        self.start(service.id());
        service
    }

    /// Remove a service
    ///
    /// Emits a persist delete, then marks it deleting so its loop exits
    /// at the next check.
    pub fn remove(&self, id: &str) -> Option<Arc<Service>> {
        let (_, service) = self.services.remove(id)?;
        self.order.write().retain(|s| s != id);
        self.handles.remove(id);
        service.status().persist_delete();
        service.status().set_deleting();
        tracing::info!(service = %id, "service removed");
        Some(service)
    }

    /// Look up a service
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Service>> {
        self.services.get(id).map(|s| Arc::clone(s.value()))
    }

    /// IDs in configuration order
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Number of services
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Mark every service deleting and stop the sleeping loops
    pub fn shutdown_all(&self) {
        for entry in &self.services {
            entry.value().status().set_deleting();
        }
        for entry in &self.handles {
            entry.value().abort();
        }
        self.handles.clear();
        tracing::info!(count = self.services.len(), "services shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WatchContext;
    use pretty_assertions::assert_eq;

    fn service(id: &str, ctx: &Arc<WatchContext>) -> Service {
        Service::new(id, Arc::clone(ctx))
    }

    #[test]
    fn register_keeps_order() {
        let ctx = Arc::new(WatchContext::new().unwrap());
        let registry = ServiceRegistry::new(DeliveryChannels::disconnected());
        registry.register(service("b", &ctx));
        registry.register(service("a", &ctx));
        registry.register(service("b", &ctx));
        assert_eq!(registry.ids(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn register_replaces_and_carries_versions() {
        let ctx = Arc::new(WatchContext::new().unwrap());
        let registry = ServiceRegistry::new(DeliveryChannels::disconnected());
        let old = registry.register(service("a", &ctx));
        old.status().set_latest_version("1.0.0", false);

        let new = registry.register(service("a", &ctx));
        assert!(old.status().is_deleting());
        assert!(!new.status().is_deleting());
        assert_eq!(new.status().latest_version(), "1.0.0");
    }

    #[test]
    fn remove_persists_delete() {
        let ctx = Arc::new(WatchContext::new().unwrap());
        let (channels, mut rx) = DeliveryChannels::unbounded();
        let registry = ServiceRegistry::new(channels);
        registry.register(service("a", &ctx));

        let removed = registry.remove("a").unwrap();
        assert!(removed.status().is_deleting());
        assert!(registry.is_empty());
        let persisted = rx.drain_persist();
        assert_eq!(persisted.len(), 1);
        assert!(persisted[0].delete);
        assert!(registry.remove("a").is_none());
    }
}
