//! Service-level tests for `CoreStore`.

use std::sync::Arc;

use shared_types::{ConfigNode, NamedList, Value};

use crate::*;

fn store_in(dir: &tempfile::TempDir) -> CoreStore {
    CoreStore::new(StoreConfig::new(dir.path().join("store")))
}

#[test]
fn test_get_store_fs_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    assert_eq!(store.get_store_fs("").unwrap().scheme(), StoreScheme::Local);
    assert_eq!(
        store.get_store_fs("file:///var/tmp/x").unwrap().scheme(),
        StoreScheme::Local
    );
    assert_eq!(
        store.get_store_fs("relative/dir").unwrap().scheme(),
        StoreScheme::Local
    );
    assert_eq!(
        store.get_store_fs("dfs://nn:9870/cores").unwrap().scheme(),
        StoreScheme::Distributed
    );

    let err: shared_types::CoreError = store.get_store_fs("ftp://host/x").err().unwrap().into();
    assert!(err.is_config());
}

#[test]
fn test_store_fs_handles_cached() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let a = store.get_store_fs("dfs://nn:9870/cores").unwrap();
    let b = store.get_store_fs("dfs://nn:9870/cores").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn test_no_uris_single_local_info_with_real_space() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let infos = store.get_store_infos().unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].scheme(), StoreScheme::Local);
    assert_eq!(
        infos[0].location(),
        dir.path().join("store").display().to_string()
    );

    let usable = infos[0].usable_space().await.unwrap();
    let real = fs2::available_space(dir.path()).unwrap();
    // Other processes may write between the two probes.
    let slack = real / 100 + 64 * 1024 * 1024;
    assert!(usable.abs_diff(real) <= slack);

    let again = store.get_store_infos().unwrap();
    assert!(Arc::ptr_eq(&infos[0], &again[0]));
}

#[tokio::test]
async fn test_user_document_empty_then_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let empty = store.load_user("alice", UserCategory::Preferences).await.unwrap();
    assert!(empty.is_empty());

    let doc = NamedList::new()
        .with("theme", "dark")
        .with("font_size", 14)
        .with("notify", true)
        .with("theme", "high-contrast");
    store
        .save_user("alice", UserCategory::Preferences, &doc)
        .await
        .unwrap();

    let loaded = store.load_user("alice", UserCategory::Preferences).await.unwrap();
    assert_eq!(loaded, doc);
    assert!(dir
        .path()
        .join("store/users/alice/preferences.xml")
        .is_file());

    assert!(store.delete_user("alice").await.unwrap());
    assert!(store
        .load_user("alice", UserCategory::Preferences)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_global_document_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    assert!(store.load_global("settings").await.unwrap().is_empty());

    let doc = NamedList::new().with("motd", Value::from("hello"));
    store.save_global("settings", &doc).await.unwrap();
    assert_eq!(store.load_global("settings").await.unwrap(), doc);
}

#[tokio::test]
async fn test_non_finite_float_saves_and_loads() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let doc = NamedList::new()
        .with("ratio", f64::NAN)
        .with("ceiling", f64::INFINITY)
        .with("floor", f64::NEG_INFINITY);
    store.save_global("limits", &doc).await.unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("store/limits.xml")).unwrap();
    assert!(on_disk.contains("<float name=\"ratio\">NaN</float>"));

    let loaded = store.load_global("limits").await.unwrap();
    assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["ratio", "ceiling", "floor"]);
    assert!(matches!(loaded.get("ratio"), Some(Value::Float(f)) if f.is_nan()));
    assert_eq!(loaded.get("ceiling"), Some(&Value::Float(f64::INFINITY)));
    assert_eq!(loaded.get("floor"), Some(&Value::Float(f64::NEG_INFINITY)));
}

#[tokio::test]
async fn test_corrupt_document_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    std::fs::create_dir_all(dir.path().join("store")).unwrap();
    std::fs::write(dir.path().join("store/settings.xml"), b"not xml").unwrap();
    assert!(matches!(
        store.load_global("settings").await,
        Err(StoreError::Document { .. })
    ));
}

#[test]
fn test_directory_accessors_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let data = store.data_dir().unwrap();
    assert_eq!(data, dir.path().join("store/data"));
    assert!(data.is_dir());
    assert_eq!(store.data_dir().unwrap(), data);

    assert!(store.cache_dir().unwrap().is_dir());
    assert!(store.temp_dir().unwrap().is_dir());
    assert_eq!(
        store.user_dir("bob").unwrap(),
        dir.path().join("store/users/bob")
    );
    assert!(store.user_dir("../bob").is_err());
}

#[test]
fn test_directory_creation_failure_is_io() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"file, not dir").unwrap();
    let store = CoreStore::new(StoreConfig::new(&blocker));
    assert!(matches!(store.data_dir(), Err(StoreError::Io { .. })));
}

#[test]
fn test_close_releases_and_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.get_store_fs("dfs://nn/x").unwrap();
    store.get_store_infos().unwrap();

    store.close();
    store.close();
    assert!(matches!(store.get_store_fs(""), Err(StoreError::Closed)));
    assert!(matches!(store.data_dir(), Err(StoreError::Closed)));
    assert_eq!(store.release_handles(), 1);
    assert_eq!(store.release_handles(), 0);
}

#[test]
fn test_config_rejects_bad_uri() {
    let root = ConfigNode::parse(
        "host.toml",
        "[store]\nlocal_dir = \"/srv\"\nuris = [\"file:/a\", \"gopher://b\"]\n",
    )
    .unwrap();
    let err = StoreConfig::from_config(&root).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_configured_uris_become_infos() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("second");
    let store = CoreStore::new(
        StoreConfig::new(dir.path().join("store")).with_uris(vec![
            format!("file://{}", local.display()),
            "dfs://nn:9870/cores".to_string(),
        ]),
    );
    let infos = store.get_store_infos().unwrap();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].name(), "file-0");
    assert_eq!(infos[1].name(), "dfs-1");
    assert_eq!(infos[1].location(), "dfs://nn:9870/cores");
}

#[test]
fn test_dfs_uri_without_host_uses_configured_namenode() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!(
        "[store]\nlocal_dir = \"{}\"\ndfs_namenode = \"nn.example:9000\"\nuris = [\"dfs:/cores\", \"file:\"]\n",
        dir.path().join("store").display()
    );
    let root = ConfigNode::parse("host.toml", &text).unwrap();
    let store = CoreStore::new(StoreConfig::from_config(&root).unwrap());

    let fs = store.get_store_fs("dfs:cores").unwrap();
    assert_eq!(fs.scheme(), StoreScheme::Distributed);
    assert_eq!(fs.location(), "dfs://nn.example:9000/cores");
    assert!(Arc::ptr_eq(&fs, &store.get_store_fs("dfs:/cores").unwrap()));

    let infos = store.get_store_infos().unwrap();
    assert_eq!(infos[0].location(), "dfs://nn.example:9000/cores");
    assert_eq!(infos[1].scheme(), StoreScheme::Local);
    assert_eq!(infos[1].location(), dir.path().join("store").display().to_string());

    // Without a configured namenode the short form cannot be resolved.
    let bare = ConfigNode::parse("host.toml", "[store]\nuris = [\"dfs:/cores\"]\n").unwrap();
    assert!(StoreConfig::from_config(&bare).unwrap_err().is_config());
    let bad = ConfigNode::parse("host.toml", "[store]\ndfs_namenode = \"nn:port\"\n").unwrap();
    assert!(StoreConfig::from_config(&bad).unwrap_err().is_config());
}
