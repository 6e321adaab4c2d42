use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ch_02_core_lifecycle::{LifecycleState, RefHandle};
use shared_types::{ConfigNode, CoreError};
use tempfile::TempDir;

use super::*;
use crate::context::ProcessContext;
use crate::handlers::EchoHandler;
use crate::test_support::context;

const ROUTES: &str = r#"
[[plugins]]
name = "/ping"
class = "ping"
default = true

[[plugins]]
name = "/select"
class = "echo"
[plugins.args]
prefix = "select"

[[plugins]]
name = "/select/fast"
class = "echo"
[plugins.args]
prefix = "fast"
"#;

fn build(ctx: &ProcessContext, name: &str, plugins: &str) -> Arc<Core> {
    let config = CoreConfig::from_node(ConfigNode::parse("core.toml", plugins).unwrap()).unwrap();
    Arc::new(Core::new(CoreDescriptor::new(name, "search"), config, ctx))
}

fn inited(ctx: &ProcessContext, name: &str, plugins: &str) -> RefHandle<Core> {
    let core = build(ctx, name, plugins);
    core.on_inited().unwrap();
    RefHandle::adopt(core)
}

#[tokio::test]
async fn test_longest_prefix_routing() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let core = inited(&ctx, "main", ROUTES);

    let fast = core.handle(&CoreRequest::new("/select/fast/now")).unwrap();
    assert_eq!(fast.get_str("prefix"), Some("fast"));
    assert_eq!(fast.get_str("path"), Some("/select/fast/now"));

    let slow = core.handle(&CoreRequest::new("/select/other")).unwrap();
    assert_eq!(slow.get_str("prefix"), Some("select"));

    let root = core.handle(&CoreRequest::new("")).unwrap();
    assert_eq!(root.get_str("status"), Some("OK"));
    assert_eq!(root.get_str("core"), Some("main"));

    let err = core.handle(&CoreRequest::new("/missing")).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(ref what) if what == "main/missing"));
}

#[tokio::test]
async fn test_echo_returns_params_and_body() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let core = inited(&ctx, "main", ROUTES);

    let request = CoreRequest::new("/select")
        .with_param("q", "rust")
        .with_body(serde_json::json!({ "rows": 10 }));
    let response = core.handle(&request).unwrap();
    let params = match response.get("params") {
        Some(shared_types::Value::Map(params)) => params.clone(),
        other => panic!("unexpected params {other:?}"),
    };
    assert_eq!(params.get_str("q"), Some("rust"));
    assert_eq!(response.get_str("body"), Some(r#"{"rows":10}"#));
}

#[tokio::test]
async fn test_use_before_init_is_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let core = build(&ctx, "main", ROUTES);

    let err = core.handle(&CoreRequest::new("/ping")).unwrap_err();
    assert!(err.is_contract());
    assert_eq!(core.state(), LifecycleState::Created);

    core.on_inited().unwrap();
    let err = core.on_inited().unwrap_err();
    assert!(err.is_contract());
    assert!(core.handle(&CoreRequest::new("/ping")).is_ok());
    drop(RefHandle::adopt(core));
}

#[tokio::test]
async fn test_unknown_handler_key_fails_init() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let core = build(
        &ctx,
        "broken",
        r#"
        [[plugins]]
        name = "/x"
        class = "no-such-handler"
        "#,
    );

    let err = core.on_inited().unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("broken/"), "{err}");
    assert_eq!(core.state(), LifecycleState::Created);
    assert!(ctx.monitors().keys().iter().all(|k| !k.starts_with("broken/")));
}

#[tokio::test]
async fn test_close_unregisters_monitors() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let core = inited(&ctx, "main", ROUTES);
    let other = inited(&ctx, "logs", ROUTES);

    let keys = ctx.monitors().keys();
    assert!(keys.contains(&"main/core".to_string()));
    assert!(keys.contains(&"main/ping".to_string()));

    let reader = core.clone();
    let arc = Arc::clone(core.arc());
    drop(core);
    assert_eq!(arc.state(), LifecycleState::Inited);
    drop(reader);
    assert_eq!(arc.state(), LifecycleState::Closed);
    assert!(arc.handler_names().is_empty());

    let keys = ctx.monitors().keys();
    assert!(keys.iter().all(|k| !k.starts_with("main/")), "{keys:?}");
    assert!(keys.contains(&"logs/core".to_string()));
    assert!(RefHandle::open(&arc).is_err());
    drop(other);
}

#[tokio::test]
async fn test_lazy_handler_instantiated_once() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    ctx.handler_factories().register("counted-echo", move |info| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(EchoHandler::new(info)) as Arc<dyn RequestHandler>)
    });

    let core = inited(
        &ctx,
        "main",
        r#"
        [[plugins]]
        name = "/echo"
        class = "counted-echo"
        startup = "lazy"
        "#,
    );
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert_eq!(core.handler_names(), vec!["/echo"]);

    for _ in 0..3 {
        core.handle(&CoreRequest::new("/echo")).unwrap();
    }
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_root_falls_back_to_first_declared() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let core = inited(
        &ctx,
        "main",
        r#"
        [[plugins]]
        name = "/echo"
        class = "echo"

        [[plugins]]
        name = "/stats"
        class = "stats"
        "#,
    );
    let response = core.handle(&CoreRequest::new("/")).unwrap();
    assert_eq!(response.get_str("path"), Some("/"));

    let stats = core.handle(&CoreRequest::new("/stats")).unwrap();
    assert_eq!(stats.get_str("state"), Some("INITED"));
    assert_eq!(stats.get_str("name"), Some("main"));
}

#[tokio::test]
async fn test_handler_named_core_is_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());
    let core = build(
        &ctx,
        "main",
        r#"
        [[plugins]]
        name = "/core"
        class = "ping"
        "#,
    );

    let err = core.on_inited().unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("main/plugins//core"), "{err}");
    assert_eq!(core.state(), LifecycleState::Created);
    assert!(ctx.monitors().get("main/core").is_none());
}
