//! Registry CRUD and the initial sync-status table (spec §4.6).

use chrono::Utc;
use uuid::Uuid;
use warden_core::error::{Error, Result};
use warden_core::model::{CreationKind, FileSubtype, Registry, RegistryKind, SourceKind, SyncPhase, SyncStatus};
use warden_core::source::SourceFetcher;
use warden_core::store::Store;
use warden_validate::{CompiledFilter, FilterConfig, InlineFetcher, Validator};

use crate::opts::{CreateRegistryOpts, RegistryInfo, UpdateRegistryOpts};

fn is_inline_data(source_kind: Option<SourceKind>, file_subtype: Option<FileSubtype>) -> bool {
    matches!(source_kind, Some(SourceKind::File)) && matches!(file_subtype, Some(FileSubtype::Data))
}

fn initial_sync_status(registry: &Registry) -> SyncStatus {
    let now = Utc::now();
    let non_synced = matches!(registry.kind, RegistryKind::Managed | RegistryKind::Kubernetes);
    let (phase, error_msg) = if non_synced {
        (SyncPhase::Completed, Some(format!("Non-synced registry (type: {:?})", registry.kind)))
    } else {
        (SyncPhase::Failed, Some("No previous sync status found".to_string()))
    };
    SyncStatus {
        registry_id: registry.id,
        phase,
        error_msg,
        started_at: None,
        ended_at: Some(now),
        attempt_count: 0,
        server_count: 0,
    }
}

pub async fn list_registries<S: Store>(store: &S) -> Result<Vec<RegistryInfo>> {
    let registries = store.read(|tx| tx.list_registries(usize::MAX)).await?;
    let mut out = Vec::with_capacity(registries.len());
    for registry in registries {
        let name = registry.name.clone();
        let sync_status = store.read(move |tx| tx.get_sync_status_by_name(&name)).await?;
        out.push(RegistryInfo { registry, sync_status });
    }
    Ok(out)
}

/// Spec §9: the aggregate `GetRegistry` call is intentionally unimplemented.
pub async fn get_registry_by_name<S: Store>(_store: &S, _name: &str) -> Result<RegistryInfo> {
    Err(Error::NotImplemented("GetRegistryByName aggregate".to_string()))
}

pub async fn create_registry<S: Store>(store: &S, opts: CreateRegistryOpts) -> Result<RegistryInfo> {
    if opts.name.is_empty() {
        return Err(Error::InvalidArgument("registry name is required".to_string()));
    }
    if opts.file_subtype.is_some() && opts.source_kind != Some(SourceKind::File) {
        return Err(Error::InvalidRegistryConfig(
            "fileSubtype is only meaningful when sourceType is file".to_string(),
        ));
    }

    let now = Utc::now();
    let registry = Registry {
        id: Uuid::new_v4(),
        name: opts.name.clone(),
        kind: opts.kind,
        creation: CreationKind::Api,
        source_kind: opts.source_kind,
        file_subtype: opts.file_subtype,
        format: opts.format.unwrap_or_else(Registry::default_format),
        source_config: opts.source_config,
        filter_config: opts.filter_config,
        sync_schedule: opts.sync_schedule,
        syncable: matches!(opts.kind, RegistryKind::Remote | RegistryKind::File),
        created_at: now,
        updated_at: now,
    };

    let status = initial_sync_status(&registry);
    let registry_name = registry.name.clone();
    let inline = is_inline_data(registry.source_kind, registry.file_subtype);

    {
        let registry = registry.clone();
        let status = status.clone();
        store
            .write(move |tx| {
                if tx.get_registry_by_name(&registry.name)?.is_some() {
                    return Err(Error::AlreadyExists(registry.name.clone()));
                }
                tx.insert_api_registry(registry)?;
                tx.bulk_initialize_sync_status(vec![status])?;
                Ok(())
            })
            .await?;
    }

    if inline {
        process_inline_registry_data(store, &registry_name, None, None).await?;
    }

    let sync_status = store
        .read({
            let registry_name = registry_name.clone();
            move |tx| tx.get_sync_status_by_name(&registry_name)
        })
        .await?;
    Ok(RegistryInfo { registry, sync_status })
}

pub async fn update_registry<S: Store>(store: &S, name: &str, opts: UpdateRegistryOpts) -> Result<RegistryInfo> {
    let name = name.to_string();

    let updated = store
        .write(move |tx| {
            let before = tx
                .get_registry_by_name(&name)?
                .ok_or_else(|| Error::RegistryNotFound(name.clone()))?;
            if before.creation != CreationKind::Api {
                return Err(Error::ConfigRegistryImmutable(name.clone()));
            }
            if let Some(source_kind) = opts.source_kind {
                if Some(source_kind) != before.source_kind {
                    return Err(Error::SourceTypeChangeNotAllowed(name.clone()));
                }
            }
            if let Some(file_subtype) = opts.file_subtype {
                if Some(file_subtype) != before.file_subtype {
                    return Err(Error::InvalidRegistryConfig(format!("registry {name}: file subtype is immutable")));
                }
            }

            let mut after = before.clone();
            if let Some(source_config) = opts.source_config {
                after.source_config = source_config;
            }
            if let Some(filter_config) = opts.filter_config {
                after.filter_config = Some(filter_config);
            }
            if let Some(sync_schedule) = opts.sync_schedule {
                after.sync_schedule = sync_schedule;
            }
            after.updated_at = Utc::now();

            warden_validate::registry_source_unchanged(&before, &after)?;

            tx.update_api_registry(after.clone())?;
            Ok(after)
        })
        .await?;

    let sync_status = store
        .read({
            let name = updated.name.clone();
            move |tx| tx.get_sync_status_by_name(&name)
        })
        .await?;
    Ok(RegistryInfo {
        registry: updated,
        sync_status,
    })
}

pub async fn delete_registry<S: Store>(store: &S, name: &str) -> Result<()> {
    let name = name.to_string();
    store
        .write(move |tx| {
            let registry = tx
                .get_registry_by_name(&name)?
                .ok_or_else(|| Error::RegistryNotFound(name.clone()))?;
            if registry.creation != CreationKind::Api {
                return Err(Error::ConfigRegistryImmutable(name.clone()));
            }
            tx.delete_api_registry(&name)
        })
        .await
}

/// Parses, validates, filters, and writes `data`/`format` for `name`'s
/// registry, then upserts its [`SyncStatus`] to COMPLETED or FAILED (spec
/// §4.6). Runs in its own transaction so a failure never corrupts what was
/// there before. When `data`/`format` are `None`, pulls both from the
/// registry's own `source_config` (the create-time inline path).
pub async fn process_inline_registry_data<S: Store>(
    store: &S,
    registry_name: &str,
    data: Option<Vec<u8>>,
    format: Option<String>,
) -> Result<()> {
    let registry_name = registry_name.to_string();
    let name_for_lookup = registry_name.clone();
    let registry = store
        .read(move |tx| tx.get_registry_by_name(&name_for_lookup))
        .await?
        .ok_or_else(|| Error::RegistryNotFound(registry_name.clone()))?;

    let started_at = Utc::now();
    let fetcher = InlineFetcher;

    let result: Result<u64> = async {
        let payload = match (data, format) {
            (Some(bytes), Some(format)) => Validator::validate(&bytes, &format)?,
            _ => {
                let fetched = fetcher
                    .fetch(registry.source_kind.unwrap_or(SourceKind::File), &registry.source_config)
                    .await?;
                Validator::validate(&fetched.bytes, &fetched.format)?
            }
        };

        let filter_config: FilterConfig = match &registry.filter_config {
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| Error::InvalidRegistryConfig(format!("filterConfig: {e}")))?,
            None => FilterConfig::default(),
        };
        let filter = CompiledFilter::compile(&filter_config)?;

        warden_validate::store(store, &registry.name, payload, &filter).await
    }
    .await;

    let ended_at = Utc::now();
    let registry_id = registry.id;
    let registry_name = registry.name.clone();

    match result {
        Ok(server_count) => {
            store
                .write(move |tx| {
                    let attempt_count = tx
                        .get_sync_status_by_name(&registry_name)?
                        .map(|s| s.attempt_count)
                        .unwrap_or(0);
                    tx.upsert_sync_status(SyncStatus {
                        registry_id,
                        phase: SyncPhase::Completed,
                        error_msg: None,
                        started_at: Some(started_at),
                        ended_at: Some(ended_at),
                        attempt_count,
                        server_count: server_count as u32,
                    })
                })
                .await?;
            Ok(())
        }
        Err(err) => {
            store
                .write(move |tx| {
                    let attempt_count = tx
                        .get_sync_status_by_name(&registry_name)?
                        .map(|s| s.attempt_count)
                        .unwrap_or(0)
                        + 1;
                    tx.upsert_sync_status(SyncStatus {
                        registry_id,
                        phase: SyncPhase::Failed,
                        error_msg: Some(err.to_string()),
                        started_at: Some(started_at),
                        ended_at: Some(ended_at),
                        attempt_count,
                        server_count: 0,
                    })
                })
                .await?;
            Err(err)
        }
    }
}

pub async fn check_readiness<S: Store>(store: &S) -> Result<()> {
    store.read(|tx| tx.list_registries(1).map(|_| ())).await
}
