//! # Core Host Runtime Benchmarks
//!
//! Hot paths that every request or handshake goes through:
//!
//! | Area | Operation | Expectation |
//! |------|-----------|-------------|
//! | core-runtime | Route candidates for a request path | Linear in segments |
//! | core-runtime | Dispatch to a loaded handler | No allocation beyond the response |
//! | ch-01 Plugin Registry | Lookup plus lazy `get` once built | Lock-free read after first use |
//! | ch-04 Core Cluster | Host key derivation | One SHA-256 over the identity |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ch_01_plugin_registry::{FactoryRegistry, Plugin, PluginInfo, PluginRegistry};
use ch_02_core_lifecycle::RefHandle;
use ch_03_core_store::{CoreStore, StoreConfig};
use ch_04_core_cluster::{ClusterConfig, ClusterError, CoreCluster, Fetcher, Headers, HostIdentity, HostKey};
use core_runtime::cores::{route_candidates, CoreConfig};
use core_runtime::{Core, CoreDescriptor, CoreRequest, ProcessContext};
use shared_types::ConfigNode;

// ============================================================================
// core-runtime: request routing
// ============================================================================

fn bench_route_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("core-runtime-routing");

    for depth in [1usize, 4, 16] {
        let path: String = (0..depth).map(|i| format!("/seg{i}")).collect();
        group.bench_with_input(BenchmarkId::new("route_candidates", depth), &path, |b, path| {
            b.iter(|| black_box(route_candidates(path)))
        });
    }

    group.finish();
}

struct Offline;

#[async_trait::async_trait]
impl Fetcher for Offline {
    async fn get(&self, url: &str, _headers: &Headers) -> Result<String, ClusterError> {
        Err(ClusterError::Status {
            url: url.to_string(),
            status: 503,
        })
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
        _headers: &Headers,
    ) -> Result<String, ClusterError> {
        Err(ClusterError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

const PLUGINS: &str = r#"
[[plugins]]
name = "/ping"
class = "ping"
default = true

[[plugins]]
name = "/select"
class = "echo"
"#;

fn bench_core_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let _guard = runtime.enter();

    let dir = tempfile::TempDir::new().expect("tempdir");
    let store = Arc::new(CoreStore::new(StoreConfig::new(dir.path())));
    let cluster = CoreCluster::new(ClusterConfig::default(), Arc::new(Offline)).expect("cluster");
    let ctx = ProcessContext::new(store, cluster);

    let node = ConfigNode::parse("core.toml", PLUGINS).expect("plugins");
    let config = CoreConfig::from_node(node).expect("core config");
    let core = Arc::new(Core::new(CoreDescriptor::new("main", "search"), config, &ctx));
    core.on_inited().expect("core init");
    let core = RefHandle::adopt(core);

    let mut group = c.benchmark_group("core-runtime-dispatch");
    group.measurement_time(Duration::from_secs(5));

    let ping = CoreRequest::new("/ping");
    group.bench_function("ping", |b| b.iter(|| black_box(core.handle(&ping))));

    let deep = CoreRequest::new("/select/a/b/c").with_param("q", "rust");
    group.bench_function("echo_longest_prefix", |b| {
        b.iter(|| black_box(core.handle(&deep)))
    });

    let missing = CoreRequest::new("/nowhere/at/all");
    group.bench_function("not_found", |b| b.iter(|| black_box(core.handle(&missing))));

    group.finish();
    drop(core);
}

// ============================================================================
// ch-01: plugin lookup
// ============================================================================

trait Counter: Plugin {
    fn value(&self) -> u64;
}

struct Fixed(u64);

impl Plugin for Fixed {}

impl Counter for Fixed {
    fn value(&self) -> u64 {
        self.0
    }
}

fn bench_registry_get(c: &mut Criterion) {
    let factories: Arc<FactoryRegistry<dyn Counter>> = Arc::new(FactoryRegistry::new());
    factories.register("fixed", |_| Ok(Arc::new(Fixed(7)) as Arc<dyn Counter>));

    let infos: Vec<PluginInfo> = (0..64)
        .map(|i| {
            let info = PluginInfo::new(format!("/p{i}"), "fixed");
            if i % 2 == 0 {
                info.lazy()
            } else {
                info
            }
        })
        .collect();
    let registry = PluginRegistry::new("bench", factories, None);
    registry.load(&infos).expect("load plugins");

    let mut group = c.benchmark_group("ch-01-plugin-registry");

    group.bench_function("get_eager", |b| {
        b.iter(|| {
            let handle = registry.get(black_box("/p1")).expect("registered");
            black_box(handle.get().map(|p| p.value()))
        })
    });

    // Built once here, so the loop measures the already-initialised path.
    let _ = registry.get("/p0").map(|h| h.get());
    group.bench_function("get_lazy_built", |b| {
        b.iter(|| {
            let handle = registry.get(black_box("/p0")).expect("registered");
            black_box(handle.get().map(|p| p.value()))
        })
    });

    group.finish();
}

// ============================================================================
// ch-04: host identity
// ============================================================================

fn bench_host_key(c: &mut Criterion) {
    let identity = HostIdentity {
        name: "search-07".into(),
        domain: "example.org".into(),
        lan_address: "10.0.3.7".into(),
        public_address: "203.0.113.7".into(),
        http_port: 8983,
        https_port: 8984,
    };

    c.bench_function("ch-04-host-key-derive", |b| {
        b.iter(|| black_box(HostKey::derive(black_box(&identity))))
    });
}

criterion_group!(
    benches,
    bench_route_candidates,
    bench_core_dispatch,
    bench_registry_get,
    bench_host_key,
);
criterion_main!(benches);
