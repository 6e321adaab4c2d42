//! Distributed filesystem backend over the WebHDFS REST API
//!
//! `dfs://namenode:port/root` maps to
//! `http://namenode:port/webhdfs/v1/root/<path>?op=...`.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read | `GET op=OPEN` (redirect to a datanode followed) |
//! | write | `PUT op=CREATE` without following the redirect, then `PUT` body to `Location` |
//! | mkdirs | `PUT op=MKDIRS` |
//! | exists | `GET op=GETFILESTATUS` |
//! | delete | `DELETE op=DELETE&recursive=true` |
//! | list | `GET op=LISTSTATUS` |
//! | capacity | `GET op=GETCONTENTSUMMARY` on the root (space quota) |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::domain::StoreScheme;
use crate::error::{StoreError, StoreResult};
use crate::ports::{Capacity, StoreFs};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStatusResponse {
    file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileStatuses {
    file_status: Vec<FileStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    path_suffix: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContentSummaryResponse {
    content_summary: ContentSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentSummary {
    space_consumed: i64,
    space_quota: i64,
}

/// WebHDFS-backed store filesystem.
#[derive(Debug, Clone)]
pub struct WebHdfsStoreFs {
    /// Follows redirects (reads).
    client: Client,
    /// Does not follow redirects (two-step create).
    no_redirect: Client,
    host: String,
    port: u16,
    root: String,
    user: Option<String>,
}

impl WebHdfsStoreFs {
    pub fn new(host: impl Into<String>, port: u16, root: impl Into<String>) -> StoreResult<Self> {
        let host = host.into();
        let build = |policy: Policy| {
            Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .connect_timeout(CONNECT_TIMEOUT)
                .redirect(policy)
                .build()
                .map_err(|e| StoreError::remote(format!("dfs://{host}:{port}"), e.to_string()))
        };
        Ok(Self {
            client: build(Policy::limited(10))?,
            no_redirect: build(Policy::none())?,
            host,
            port,
            root: root.into().trim_end_matches('/').to_string(),
            user: None,
        })
    }

    /// Act as this HDFS user (`user.name` query parameter).
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// REST URL for `path` under the root with the given operation.
    pub fn url(&self, path: &str, op: &str) -> String {
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            full.push('/');
            full.push_str(segment);
        }
        if full.is_empty() {
            full.push('/');
        }
        let mut url = format!(
            "http://{}:{}/webhdfs/v1{}?op={}",
            self.host, self.port, full, op
        );
        if let Some(user) = &self.user {
            url.push_str("&user.name=");
            url.push_str(user);
        }
        url
    }

    async fn expect_ok(url: &str, response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::remote(url, format!("HTTP {status}: {body}")))
    }

    fn send_err(url: &str) -> impl FnOnce(reqwest::Error) -> StoreError + '_ {
        move |e| StoreError::remote(url, e.to_string())
    }
}

#[async_trait]
impl StoreFs for WebHdfsStoreFs {
    fn scheme(&self) -> StoreScheme {
        StoreScheme::Distributed
    }

    fn location(&self) -> String {
        format!("dfs://{}:{}{}", self.host, self.port, self.root)
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let url = self.url(path, "OPEN");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::send_err(&url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_ok(&url, response).await?;
        let bytes = response.bytes().await.map_err(Self::send_err(&url))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        let url = self.url(path, "CREATE&overwrite=true");
        let response = self
            .no_redirect
            .put(&url)
            .send()
            .await
            .map_err(Self::send_err(&url))?;

        let location = if response.status().is_redirection() {
            response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| StoreError::remote(&url, "redirect without Location"))?
        } else {
            // Some gateways accept the body on the first request.
            Self::expect_ok(&url, response).await?;
            url.clone()
        };

        debug!(target_url = %location, "[ch-03] DFS create");
        let response = self
            .no_redirect
            .put(&location)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(Self::send_err(&location))?;
        Self::expect_ok(&location, response).await.map(|_| ())
    }

    async fn mkdirs(&self, path: &str) -> StoreResult<()> {
        let url = self.url(path, "MKDIRS");
        let response = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(Self::send_err(&url))?;
        let parsed: BooleanResponse = Self::expect_ok(&url, response)
            .await?
            .json()
            .await
            .map_err(Self::send_err(&url))?;
        if parsed.boolean {
            Ok(())
        } else {
            Err(StoreError::remote(url, "MKDIRS returned false"))
        }
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        let url = self.url(path, "GETFILESTATUS");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::send_err(&url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_ok(&url, response).await.map(|_| true)
    }

    async fn delete(&self, path: &str) -> StoreResult<bool> {
        let url = self.url(path, "DELETE&recursive=true");
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(Self::send_err(&url))?;
        let parsed: BooleanResponse = Self::expect_ok(&url, response)
            .await?
            .json()
            .await
            .map_err(Self::send_err(&url))?;
        Ok(parsed.boolean)
    }

    async fn list(&self, path: &str) -> StoreResult<Vec<String>> {
        let url = self.url(path, "LISTSTATUS");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::send_err(&url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let parsed: ListStatusResponse = Self::expect_ok(&url, response)
            .await?
            .json()
            .await
            .map_err(Self::send_err(&url))?;
        let mut names: Vec<String> = parsed
            .file_statuses
            .file_status
            .into_iter()
            .map(|s| s.path_suffix)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn capacity(&self) -> StoreResult<Capacity> {
        let url = self.url("", "GETCONTENTSUMMARY");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::send_err(&url))?;
        let parsed: ContentSummaryResponse = Self::expect_ok(&url, response)
            .await?
            .json()
            .await
            .map_err(Self::send_err(&url))?;
        Ok(capacity_from_summary(&parsed.content_summary))
    }
}

/// A negative quota means unlimited; report `u64::MAX` as the total.
fn capacity_from_summary(summary: &ContentSummary) -> Capacity {
    let consumed = u64::try_from(summary.space_consumed).unwrap_or(0);
    let total = u64::try_from(summary.space_quota).unwrap_or(u64::MAX);
    let remaining = total.saturating_sub(consumed);
    Capacity {
        total,
        usable: remaining,
        free: remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::body::Bytes;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode as AxStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::any;
    use axum::Router;
    use parking_lot::Mutex;

    #[test]
    fn test_url_building() {
        let fs = WebHdfsStoreFs::new("nn", 9870, "/cores/").unwrap().with_user("hdfs");
        assert_eq!(
            fs.url("users/bob/profile.xml", "OPEN"),
            "http://nn:9870/webhdfs/v1/cores/users/bob/profile.xml?op=OPEN&user.name=hdfs"
        );
        let bare = WebHdfsStoreFs::new("nn", 9870, "").unwrap();
        assert_eq!(bare.url("", "GETCONTENTSUMMARY"), "http://nn:9870/webhdfs/v1/?op=GETCONTENTSUMMARY");
    }

    #[test]
    fn test_unlimited_quota() {
        let cap = capacity_from_summary(&ContentSummary {
            space_consumed: 100,
            space_quota: -1,
        });
        assert_eq!(cap.total, u64::MAX);
        assert_eq!(cap.usable, u64::MAX - 100);
    }

    type Files = Arc<Mutex<HashMap<String, Vec<u8>>>>;

    #[derive(Clone)]
    struct Fake {
        files: Files,
        base: String,
    }

    /// Minimal namenode: two-step CREATE, OPEN, GETFILESTATUS.
    async fn namenode(
        State(fake): State<Fake>,
        Path(path): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        method: axum::http::Method,
        body: Bytes,
    ) -> Response {
        let key = format!("/{path}");
        let op = query.get("op").cloned().unwrap_or_default();
        match (method.as_str(), op.as_str()) {
            ("PUT", "CREATE") if query.contains_key("datanode") => {
                fake.files.lock().insert(key, body.to_vec());
                AxStatus::CREATED.into_response()
            }
            ("PUT", "CREATE") => {
                let mut headers = HeaderMap::new();
                let location = format!("{}/webhdfs/v1{key}?op=CREATE&datanode=true", fake.base);
                headers.insert("location", location.parse().unwrap());
                (AxStatus::TEMPORARY_REDIRECT, headers).into_response()
            }
            ("GET", "OPEN") => match fake.files.lock().get(&key) {
                Some(bytes) => bytes.clone().into_response(),
                None => AxStatus::NOT_FOUND.into_response(),
            },
            ("GET", "GETFILESTATUS") => {
                if fake.files.lock().contains_key(&key) {
                    AxStatus::OK.into_response()
                } else {
                    AxStatus::NOT_FOUND.into_response()
                }
            }
            _ => AxStatus::BAD_REQUEST.into_response(),
        }
    }

    #[tokio::test]
    async fn test_two_step_create_then_open() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let fake = Fake {
            files: Arc::new(Mutex::new(HashMap::new())),
            base: format!("http://{addr}"),
        };
        let app = Router::new()
            .route("/webhdfs/v1/*path", any(namenode))
            .with_state(fake.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let fs = WebHdfsStoreFs::new("127.0.0.1", addr.port(), "/store").unwrap();
        assert_eq!(fs.read("settings.xml").await.unwrap(), None);
        assert!(!fs.exists("settings.xml").await.unwrap());

        fs.write("settings.xml", b"<lst/>").await.unwrap();
        assert!(fake.files.lock().contains_key("/store/settings.xml"));
        assert_eq!(
            fs.read("settings.xml").await.unwrap(),
            Some(b"<lst/>".to_vec())
        );
        assert!(fs.exists("settings.xml").await.unwrap());
    }
}
