//! # Runtime Flows
//!
//! Containers, cores, the plugin registry and the store wired together
//! the way the host binary wires them.
//!
//! ## Flows Tested:
//!
//! 1. **Partial start-up**: a core with an unknown handler key is recorded
//!    as failed while its siblings serve
//! 2. **Replacement**: a displaced core closes exactly once, after its
//!    last reader
//! 3. **Lazy plugins**: concurrent first use builds one instance
//! 4. **Store**: no configured URIs means one local store with real space

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;
    use tempfile::TempDir;

    use ch_01_plugin_registry::{FactoryRegistry, Plugin, PluginInfo, PluginRegistry};
    use ch_02_core_lifecycle::{CloseHook, LifecycleState, Managed};
    use ch_03_core_store::{CoreStore, StoreConfig, StoreScheme, UserCategory};
    use ch_04_core_cluster::{ClusterConfig, ClusterError, CoreCluster, Fetcher, Headers};
    use core_runtime::{
        AdminAction, AdminRequest, ContainersOptions, CoreContainer, CoreContainers,
        CoreDescriptor, CoreRequest, ProcessContext,
    };
    use shared_types::{ConfigNode, NamedList};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Fails every request without touching the network.
    struct NullFetcher;

    #[async_trait]
    impl Fetcher for NullFetcher {
        async fn get(&self, url: &str, _headers: &Headers) -> Result<String, ClusterError> {
            Err(ClusterError::Status {
                url: url.to_string(),
                status: 503,
            })
        }

        async fn post_json(&self, url: &str, _body: &Value, _headers: &Headers) -> Result<String, ClusterError> {
            Err(ClusterError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    fn host_toml(dir: &Path, body: &str) -> ConfigNode {
        let text = format!(
            "[store]\nlocal_dir = {:?}\n\n{body}",
            dir.display().to_string()
        );
        ConfigNode::parse("host.toml", &text).unwrap()
    }

    fn start(dir: &Path, body: &str) -> Arc<CoreContainers> {
        let options = ContainersOptions {
            http_port: None,
            fetcher: Some(Arc::new(NullFetcher)),
        };
        CoreContainers::with_options(host_toml(dir, body), options).unwrap()
    }

    fn context(dir: &Path) -> Arc<ProcessContext> {
        let store = Arc::new(CoreStore::new(StoreConfig::new(dir)));
        let cluster = CoreCluster::new(ClusterConfig::default(), Arc::new(NullFetcher)).unwrap();
        Arc::new(ProcessContext::new(store, cluster))
    }

    const TWO_CORES: &str = r#"
[[roles.search.cores]]
name = "main"
[[roles.search.cores.plugins]]
name = "/ping"
class = "ping"
default = true

[[roles.search.cores]]
name = "reports"
[[roles.search.cores.plugins]]
name = "/ping"
class = "ping"
[[roles.search.cores.plugins]]
name = "/render"
class = "pdf-renderer"
"#;

    // =============================================================================
    // INTEGRATION TESTS: CONTAINERS AND CORES
    // =============================================================================

    /// A bad plugin key fails only the core that declares it.
    #[tokio::test]
    async fn test_bad_plugin_key_fails_only_its_core() {
        let dir = TempDir::new().unwrap();
        let containers = start(dir.path(), TWO_CORES);

        assert_eq!(containers.init().unwrap(), 1);
        containers.on_inited().await.unwrap();

        let main = containers.get_core("main").unwrap();
        let pong = main.handle(&CoreRequest::new("/ping")).unwrap();
        assert_eq!(pong.get_str("status"), Some("OK"));
        drop(main);
        assert!(containers.get_core("reports").is_none());

        let search = containers.container("search").unwrap();
        let failures = search.init_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "reports");
        assert!(failures[0].message.contains("pdf-renderer"), "{}", failures[0].message);

        let admin = containers.admin().unwrap();
        let status = admin.handle(&AdminRequest::new(AdminAction::Status)).unwrap();
        let reported = &status["containers"]["search"]["init_failures"]["reports"];
        assert_eq!(reported["kind"], "config");

        // A reload of the failed core fails the same way and stays recorded.
        let reload = AdminRequest::new(AdminAction::Reload).with_param("core", "reports");
        assert_eq!(admin.handle(&reload).unwrap_err().http_status(), 400);
        assert_eq!(search.init_failures().len(), 1);

        containers.shutdown().await;
    }

    /// The displaced core closes once, and only after its reader lets go.
    #[tokio::test]
    async fn test_replaced_core_closes_exactly_once() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let container = CoreContainer::new("search", "main", Arc::clone(&ctx));
        let inline = || {
            ConfigNode::parse("inline", "[[plugins]]\nname = \"/ping\"\nclass = \"ping\"\n").unwrap()
        };
        let build = |name: &str| {
            let descriptor = CoreDescriptor::new(name, "search").with_inline_config(inline());
            let core = ctx.core_factory("default").unwrap().create(&descriptor, &ctx).unwrap();
            core.on_inited().unwrap();
            core
        };

        let old = build("main");
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        old.lifecycle()
            .add_close_hook(CloseHook::new("count").pre(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        container.register("main", Arc::clone(&old), false);

        let reader = container.get_core("main").unwrap();
        container.register("main", build("main"), false);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(old.state(), LifecycleState::Inited);

        // The in-flight request still completes on the old core.
        assert!(reader.handle(&CoreRequest::new("/ping")).is_ok());
        drop(reader);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(old.state(), LifecycleState::Closed);

        container.shutdown();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    // =============================================================================
    // INTEGRATION TESTS: PLUGIN REGISTRY
    // =============================================================================

    trait Greeter: Plugin {
        fn greet(&self) -> String;
    }

    struct Hello;

    impl Plugin for Hello {}

    impl Greeter for Hello {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    /// Concurrent first callers of a lazy plugin share one instance.
    #[test]
    fn test_lazy_plugin_built_once_under_contention() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let factories: Arc<FactoryRegistry<dyn Greeter>> = Arc::new(FactoryRegistry::new());
        factories.register("hello", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(Hello) as Arc<dyn Greeter>)
        });

        let registry = PluginRegistry::new("main", factories, None);
        registry
            .load(&[PluginInfo::new("/hello", "hello").lazy()])
            .unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let instances: Vec<Arc<dyn Greeter>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.get("/hello").unwrap().get().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(instances[0].greet(), "hello");
    }

    // =============================================================================
    // INTEGRATION TESTS: STORE
    // =============================================================================

    /// Without URIs the store is one local entry reporting real space.
    #[tokio::test]
    async fn test_store_without_uris_is_local() {
        let dir = TempDir::new().unwrap();
        let store = CoreStore::new(StoreConfig::new(dir.path()));

        let infos = store.get_store_infos().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].scheme(), StoreScheme::Local);
        let capacity = infos[0].capacity().await.unwrap();
        assert!(capacity.total > 0);
        assert!(capacity.free <= capacity.total);

        let prefs = NamedList::new().with("lang", "en");
        store
            .save_user("alice", UserCategory::Preferences, &prefs)
            .await
            .unwrap();
        let loaded = store.load_user("alice", UserCategory::Preferences).await.unwrap();
        assert_eq!(loaded.get_str("lang"), Some("en"));
        assert!(store.delete_user("alice").await.unwrap());
        assert!(store
            .load_user("alice", UserCategory::Preferences)
            .await
            .unwrap()
            .is_empty());

        store.close();
        store.release_handles();
    }
}
