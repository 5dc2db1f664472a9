//! End-to-end seed scenarios for the `RegistryService` facade (spec §8).

use std::sync::Arc;
use std::time::Duration;

use warden_core::config::EngineConfigBuilder;
use warden_core::error::Error;
use warden_core::model::{RegistryKind, SourceKind};
use warden_service::{CreateRegistryOpts, DeleteVersionOpts, GetVersionOpts, ListOpts, ListVersionsOpts, RegistryService};
use warden_store_redb::RedbStore;
use warden_validate::ServerCandidate;

async fn service() -> (RegistryService<RedbStore>, Arc<RedbStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RedbStore::open(dir.path().join("warden.redb")).unwrap());
    let config = Arc::new(
        EngineConfigBuilder::new()
            .max_meta_size(8192)
            .connection_string("redb:///tmp/warden.redb")
            .build()
            .unwrap(),
    );
    (RegistryService::new(store.clone(), config), store, dir)
}

fn server(name: &str, version: &str) -> ServerCandidate {
    ServerCandidate {
        name: name.to_string(),
        version: version.to_string(),
        description: "d".to_string(),
        title: "t".to_string(),
        tags: Vec::new(),
        website_url: None,
        repository: None,
        server_meta: None,
        packages: Vec::new(),
        remotes: Vec::new(),
        icons: Vec::new(),
    }
}

async fn create_managed(svc: &RegistryService<RedbStore>, name: &str) {
    svc.create_registry(CreateRegistryOpts {
        name: name.to_string(),
        kind: RegistryKind::Managed,
        source_kind: None,
        file_subtype: None,
        format: None,
        source_config: serde_json::json!({}),
        filter_config: None,
        sync_schedule: None,
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn basic_publish_then_get() {
    let (svc, _store, _dir) = service().await;
    create_managed(&svc, "r1").await;

    svc.publish_server_version("r1", server("s", "1.0.0")).await.unwrap();

    let got = svc
        .get_server_version(GetVersionOpts {
            name: "s".to_string(),
            version: "1.0.0".to_string(),
            registry_name: Some("r1".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(got.entry.name, "s");
    assert_eq!(got.entry.version, "1.0.0");
    assert_eq!(got.entry.description, "d");
    assert_eq!(got.entry.title, "t");
    assert!(got.packages.is_empty());
    assert!(got.remotes.is_empty());
}

#[tokio::test]
async fn latest_advancement() {
    let (svc, store, _dir) = service().await;
    create_managed(&svc, "r1").await;

    let registry_id = svc.list_registries().await.unwrap()[0].registry.id;

    for v in ["1.0.0", "2.0.0", "1.5.0"] {
        svc.publish_server_version("r1", server("s", v)).await.unwrap();
    }

    let versions = svc
        .list_server_versions(ListVersionsOpts {
            name: "s".to_string(),
            registry_name: Some("r1".to_string()),
            next: None,
            prev: None,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(versions.len(), 3);

    let latest = store
        .read(move |tx| tx.get_latest_version(registry_id, "s"))
        .await
        .unwrap()
        .unwrap();
    let latest_version = versions
        .iter()
        .find(|v| Some(v.entry.id) == latest.entry_id)
        .expect("latest pointer refers to one of the published versions");
    assert_eq!(latest_version.entry.version, "2.0.0");
}

#[tokio::test]
async fn cross_registry_name_collision_with_prefix_names() {
    let (svc, _store, _dir) = service().await;
    create_managed(&svc, "registry-alpha").await;
    create_managed(&svc, "registry-beta").await;

    svc.publish_server_version("registry-alpha", server("shared-server", "1.0.0"))
        .await
        .unwrap();
    svc.publish_server_version("registry-beta", server("shared-server", "1.0.0"))
        .await
        .unwrap();

    let listed = svc
        .list_servers(ListOpts {
            prefix_names: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let names: Vec<&str> = listed.items.iter().map(|v| v.entry.name.as_str()).collect();
    assert!(names.contains(&"registry-alpha.shared-server"));
    assert!(names.contains(&"registry-beta.shared-server"));

    let beta = svc
        .get_server_version(GetVersionOpts {
            name: "registry-beta.shared-server".to_string(),
            version: "1.0.0".to_string(),
            registry_name: None,
        })
        .await
        .unwrap();
    assert_eq!(beta.entry.name, "shared-server");
}

#[tokio::test]
async fn pagination_covers_all_rows_with_no_repeats() {
    let (svc, _store, _dir) = service().await;
    create_managed(&svc, "r1").await;

    for i in 0..7 {
        svc.publish_server_version("r1", server(&format!("s{i:02}"), "1.0.0")).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut pages = Vec::new();
    loop {
        let page = svc
            .list_servers(ListOpts {
                registry_name: Some("r1".to_string()),
                limit: Some(3),
                cursor: cursor.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        pages.push(page.items.len());
        seen.extend(page.items.iter().map(|v| v.entry.name.clone()));
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    assert_eq!(pages, vec![3, 3, 1]);
    assert_eq!(seen.len(), 7);
    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 7);
}

#[tokio::test]
async fn duplicate_publish_is_rejected() {
    let (svc, _store, _dir) = service().await;
    create_managed(&svc, "r1").await;

    svc.publish_server_version("r1", server("s", "1.0.0")).await.unwrap();
    let err = svc.publish_server_version("r1", server("s", "1.0.0")).await.unwrap_err();
    assert!(matches!(err, Error::VersionAlreadyExists(_)));

    let versions = svc
        .list_server_versions(ListVersionsOpts {
            name: "s".to_string(),
            registry_name: Some("r1".to_string()),
            next: None,
            prev: None,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(versions.len(), 1);
}

#[tokio::test]
async fn delete_nonexistent_version_is_not_found() {
    let (svc, _store, _dir) = service().await;
    create_managed(&svc, "r1").await;

    let err = svc
        .delete_server_version(DeleteVersionOpts {
            registry_name: "r1".to_string(),
            name: "missing".to_string(),
            version: "1.0.0".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn publish_against_non_managed_registry_is_rejected() {
    let (svc, _store, _dir) = service().await;
    svc.create_registry(CreateRegistryOpts {
        name: "remote-one".to_string(),
        kind: RegistryKind::Remote,
        source_kind: Some(SourceKind::Git),
        file_subtype: None,
        format: None,
        source_config: serde_json::json!({}),
        filter_config: None,
        sync_schedule: Some(Duration::from_secs(300)),
    })
    .await
    .unwrap();

    let err = svc.publish_server_version("remote-one", server("s", "1.0.0")).await.unwrap_err();
    assert!(matches!(err, Error::NotManagedRegistry(_)));
}

#[tokio::test]
async fn update_registry_cannot_change_source_type() {
    let (svc, _store, _dir) = service().await;
    svc.create_registry(CreateRegistryOpts {
        name: "remote-one".to_string(),
        kind: RegistryKind::Remote,
        source_kind: Some(SourceKind::Git),
        file_subtype: None,
        format: None,
        source_config: serde_json::json!({}),
        filter_config: None,
        sync_schedule: Some(Duration::from_secs(300)),
    })
    .await
    .unwrap();

    let ok = svc
        .update_registry(
            "remote-one",
            warden_service::UpdateRegistryOpts {
                source_config: Some(serde_json::json!({"url": "https://example.com"})),
                ..Default::default()
            },
        )
        .await;
    assert!(ok.is_ok());

    let err = svc
        .update_registry(
            "remote-one",
            warden_service::UpdateRegistryOpts {
                source_kind: Some(SourceKind::Api),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SourceTypeChangeNotAllowed(_)));

    let after = svc.get_registry_by_name("remote-one").await;
    assert!(matches!(after, Err(Error::NotImplemented(_))));

    let all = svc.list_registries().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].registry.source_config, serde_json::json!({"url": "https://example.com"}));
}

#[tokio::test]
async fn check_readiness_pings_store() {
    let (svc, _store, _dir) = service().await;
    svc.check_readiness().await.unwrap();
}
