//! Monitoring registry
//!
//! Instances that expose runtime statistics implement [`Monitorable`] and are
//! registered under `"<scope>/<name>"`. The registry is an ordinary value
//! owned by the process context, not a static.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::NamedList;
use tracing::debug;

/// Capability of exposing runtime statistics.
pub trait Monitorable: Send + Sync {
    fn name(&self) -> String;

    fn category(&self) -> &str {
        "OTHER"
    }

    fn description(&self) -> String {
        String::new()
    }

    fn statistics(&self) -> NamedList;
}

/// Name-keyed set of monitorable instances.
#[derive(Default)]
pub struct MonitorRegistry {
    entries: RwLock<BTreeMap<String, Arc<dyn Monitorable>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which `name` is registered in `scope`. A leading `/` on
    /// the name is dropped, so handler `/ping` in `main` is `main/ping`.
    pub fn key(scope: &str, name: &str) -> String {
        format!("{scope}/{}", name.trim_start_matches('/'))
    }

    /// Register, replacing any previous entry with the same key.
    pub fn register(&self, scope: &str, name: &str, item: Arc<dyn Monitorable>) -> String {
        let key = Self::key(scope, name);
        debug!(key = %key, "[Monitor] registered");
        self.entries.write().insert(key.clone(), item);
        key
    }

    pub fn unregister(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Remove `key` only while it still maps to `item`. A newer entry
    /// registered under the same key is left in place.
    pub fn unregister_item<M: ?Sized>(&self, key: &str, item: *const M) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(current) if std::ptr::addr_eq(Arc::as_ptr(current), item) => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Remove every entry registered under `scope`.
    pub fn unregister_scope(&self, scope: &str) -> usize {
        let prefix = format!("{scope}/");
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Monitorable>> {
        self.entries.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Point-in-time statistics for every entry, keyed like the registry.
    ///
    /// Statistics are collected after the read lock is released.
    pub fn snapshot(&self) -> NamedList {
        let items: Vec<(String, Arc<dyn Monitorable>)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        items
            .into_iter()
            .map(|(key, item)| {
                let entry = NamedList::new()
                    .with("name", item.name())
                    .with("category", item.category())
                    .with("description", item.description())
                    .with("stats", item.statistics());
                (key, entry)
            })
            .collect()
    }
}

impl std::fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(&'static str);

    impl Monitorable for Counter {
        fn name(&self) -> String {
            self.0.to_string()
        }

        fn statistics(&self) -> NamedList {
            NamedList::new().with("requests", 7)
        }
    }

    #[test]
    fn test_scope_unregister() {
        let reg = MonitorRegistry::new();
        reg.register("core1", "/select", Arc::new(Counter("select")));
        reg.register("core1", "/ping", Arc::new(Counter("ping")));
        reg.register("core2", "/ping", Arc::new(Counter("ping")));

        assert_eq!(reg.unregister_scope("core1"), 2);
        assert_eq!(reg.keys(), vec!["core2/ping".to_string()]);
    }

    #[test]
    fn test_unregister_item_keeps_replacement() {
        let reg = MonitorRegistry::new();
        let old: Arc<dyn Monitorable> = Arc::new(Counter("old"));
        let new: Arc<dyn Monitorable> = Arc::new(Counter("new"));
        reg.register("core1", "core", Arc::clone(&old));
        reg.register("core1", "core", Arc::clone(&new));

        assert!(!reg.unregister_item("core1/core", Arc::as_ptr(&old)));
        assert_eq!(reg.get("core1/core").unwrap().name(), "new");
        assert!(reg.unregister_item("core1/core", Arc::as_ptr(&new)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_snapshot_contains_stats() {
        let reg = MonitorRegistry::new();
        reg.register("core1", "/ping", Arc::new(Counter("ping")));
        let snap = reg.snapshot();
        let entry = snap.get("core1/ping").and_then(|v| v.as_named_list()).unwrap();
        assert_eq!(entry.get_str("category"), Some("OTHER"));
        let stats = entry.get("stats").and_then(|v| v.as_named_list()).unwrap();
        assert_eq!(stats.get_i64("requests"), Some(7));
    }
}
