//! # Outbound Ports (Driven Ports)
//!
//! Production: `ReqwestFetcher`. Tests substitute an in-memory fetcher.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClusterError;

/// Extra request headers as `(name, value)` pairs.
pub type Headers = Vec<(&'static str, String)>;

/// Minimal HTTP client used for probes, handshakes and fetches.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`, returning the body of a successful response.
    async fn get(&self, url: &str, headers: &Headers) -> Result<String, ClusterError>;

    /// POST a JSON body to `url`, returning the body of a successful
    /// response.
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &Headers,
    ) -> Result<String, ClusterError>;
}

/// Receives the outcome of a [`fetch`](crate::CoreCluster::fetch), exactly
/// once, on a runtime worker task.
pub trait FetchListener: Send + 'static {
    fn on_fetch(self: Box<Self>, uri: &str, result: Result<String, ClusterError>);
}

impl<F> FetchListener for F
where
    F: FnOnce(&str, Result<String, ClusterError>) + Send + 'static,
{
    fn on_fetch(self: Box<Self>, uri: &str, result: Result<String, ClusterError>) {
        (*self)(uri, result)
    }
}
