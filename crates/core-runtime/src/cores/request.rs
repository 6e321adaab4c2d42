//! Requests and the handler contract

use ch_01_plugin_registry::Plugin;
use shared_types::{CoreResult, NamedList, Value};

use super::Core;

/// A request addressed to one core.
#[derive(Debug, Clone, Default)]
pub struct CoreRequest {
    /// Handler path inside the core, e.g. `/select/json`.
    pub path: String,
    pub params: NamedList,
    pub body: Option<serde_json::Value>,
}

impl CoreRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.add(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get_str(name)
    }
}

/// A request handler plugin. Handlers are resolved through the core's
/// plugin registry and must be safe to call concurrently.
pub trait RequestHandler: Plugin {
    fn handle(&self, core: &Core, request: &CoreRequest) -> CoreResult<NamedList>;
}

/// Candidate handler names for `path`, longest first: `/a/b/c`, `/a/b`, `/a`.
///
/// Repeated and trailing slashes are ignored. The root path yields nothing.
pub fn route_candidates(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    (1..=segments.len())
        .rev()
        .map(|n| format!("/{}", segments[..n].join("/")))
        .collect()
}
