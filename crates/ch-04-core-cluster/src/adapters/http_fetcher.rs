//! `reqwest`-backed [`Fetcher`].
//!
//! One pooled client is shared by every probe, handshake and fetch.
//! Dropping the fetcher closes the pool.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::error::{ClusterError, ClusterResult};
use crate::ports::{Fetcher, Headers};

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> ClusterResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ClusterError::Config {
                context: "cluster.http_client".into(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    async fn send(url: &str, request: RequestBuilder, headers: &Headers) -> ClusterResult<String> {
        let request = headers
            .iter()
            .fold(request, |req, (name, value)| req.header(*name, value));
        let response = request.send().await.map_err(|e| ClusterError::Http {
            url: url.to_string(),
            message: if e.is_connect() {
                "connection refused".to_string()
            } else if e.is_timeout() {
                "timed out".to_string()
            } else {
                e.to_string()
            },
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|e| ClusterError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn get(&self, url: &str, headers: &Headers) -> ClusterResult<String> {
        Self::send(url, self.client.get(url), headers).await
    }

    async fn post_json(&self, url: &str, body: &Value, headers: &Headers) -> ClusterResult<String> {
        Self::send(url, self.client.post(url).json(body), headers).await
    }
}
