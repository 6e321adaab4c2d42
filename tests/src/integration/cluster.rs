//! # Cluster Membership
//!
//! Two hosts on loopback, each serving the admin surface over real HTTP,
//! running the join handshake against each other.
//!
//! ## Flows Tested:
//!
//! 1. **Self join**: a join address naming the local identity never
//!    leaves the process
//! 2. **Join**: both hosts end up `Known` to each other
//! 3. **Wrong secret**: the join is refused and neither side learns a peer

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    use ch_04_core_cluster::{
        ClusterConfig, ClusterError, CoreCluster, Fetcher, Headers, HostIdentity, HostState,
    };
    use core_runtime::{http, ContainersOptions, CoreContainers};
    use shared_types::{ConfigNode, CoreResult};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Records every URL and answers nothing.
    #[derive(Default)]
    struct RecordingFetcher {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for RecordingFetcher {
        async fn get(&self, url: &str, _headers: &Headers) -> Result<String, ClusterError> {
            self.urls.lock().push(url.to_string());
            Err(ClusterError::Http {
                url: url.to_string(),
                message: "recorded".into(),
            })
        }

        async fn post_json(&self, url: &str, _body: &Value, _headers: &Headers) -> Result<String, ClusterError> {
            self.urls.lock().push(url.to_string());
            Err(ClusterError::Http {
                url: url.to_string(),
                message: "recorded".into(),
            })
        }
    }

    /// One host: its containers plus the HTTP server in front of them.
    struct Host {
        containers: Arc<CoreContainers>,
        port: u16,
        stop: Option<oneshot::Sender<()>>,
        task: JoinHandle<CoreResult<()>>,
    }

    impl Host {
        /// Bind, build and serve. The cluster join (if any) is left to
        /// [`Host::join`] so the server is already answering by then.
        async fn serve(dir: &Path, secret: &str, join_port: Option<u16>) -> Self {
            let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
                .await
                .unwrap();
            let port = listener.local_addr().unwrap().port();

            let join = join_port
                .map(|p| format!("join_address = \"127.0.0.1:{p}\"\n"))
                .unwrap_or_default();
            let text = format!(
                "[store]\nlocal_dir = {:?}\n\n\
                 [host]\nname = \"127.0.0.1\"\nlan_address = \"127.0.0.1\"\n\n\
                 [cluster]\nid = \"it\"\nsecret = \"{secret}\"\n{join}",
                dir.join(port.to_string()).display().to_string()
            );
            let root = ConfigNode::parse("host.toml", &text).unwrap();
            let options = ContainersOptions {
                http_port: Some(port),
                fetcher: None,
            };
            let containers = CoreContainers::with_options(root, options).unwrap();
            containers.init().unwrap();

            let (stop, stopped) = oneshot::channel::<()>();
            let task = tokio::spawn(http::serve_on(listener, Arc::clone(&containers), async move {
                let _ = stopped.await;
            }));
            Self {
                containers,
                port,
                stop: Some(stop),
                task,
            }
        }

        async fn join(&self) {
            self.containers.on_inited().await.unwrap();
        }

        fn cluster(&self) -> &Arc<CoreCluster> {
            self.containers.cluster()
        }

        fn known(&self) -> usize {
            self.cluster().hosts_in_state(HostState::Known).len()
        }

        async fn stop(mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            (&mut self.task).await.unwrap().unwrap();
            self.containers.shutdown().await;
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .is_ok()
    }

    // =============================================================================
    // INTEGRATION TESTS: JOIN HANDSHAKE
    // =============================================================================

    /// Joining the local identity is refused before any request is sent.
    #[tokio::test]
    async fn test_self_join_is_rejected() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let config = ClusterConfig {
            identity: HostIdentity {
                name: "node-a".into(),
                lan_address: "127.0.0.1".into(),
                http_port: 18990,
                ..HostIdentity::default()
            },
            join_address: Some("127.0.0.1:18990".into()),
            ..ClusterConfig::default()
        };
        let cluster = CoreCluster::new(config, Arc::clone(&fetcher) as Arc<dyn Fetcher>).unwrap();

        assert!(!cluster.join_host().await.unwrap());
        assert!(cluster.wait_idle(Duration::from_secs(1)).await);
        assert!(fetcher.urls.lock().is_empty());
        assert_eq!(cluster.get_clusters().len(), 1);
        cluster.close();
    }

    /// A joiner and its target both see two known hosts.
    #[tokio::test]
    async fn test_two_hosts_join_over_http() {
        let dir = TempDir::new().unwrap();
        let a = Host::serve(dir.path(), "s3cret", None).await;
        a.join().await;
        let b = Host::serve(dir.path(), "s3cret", Some(a.port)).await;
        b.join().await;

        let joined = wait_until(|| a.known() == 2 && b.known() == 2).await;
        assert!(joined, "a knows {}, b knows {}", a.known(), b.known());

        let a_key = a.cluster().self_key().clone();
        let b_key = b.cluster().self_key().clone();
        assert_ne!(a_key, b_key);
        assert!(a.cluster().get_cluster(&b_key).is_some());
        assert!(b.cluster().get_cluster(&a_key).is_some());

        b.stop().await;
        a.stop().await;
    }

    /// A joiner holding the wrong secret is turned away.
    #[tokio::test]
    async fn test_wrong_secret_join_is_refused() {
        let dir = TempDir::new().unwrap();
        let a = Host::serve(dir.path(), "s3cret", None).await;
        a.join().await;
        let b = Host::serve(dir.path(), "guess", Some(a.port)).await;
        b.join().await;

        assert!(b.cluster().wait_idle(Duration::from_secs(10)).await);
        assert!(a.cluster().wait_idle(Duration::from_secs(10)).await);
        assert_eq!(a.cluster().get_clusters().len(), 1);
        assert_eq!(b.cluster().get_clusters().len(), 1);

        b.stop().await;
        a.stop().await;
    }
}
