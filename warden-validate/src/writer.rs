//! `Writer::store`: idempotent bulk load of a validated, filtered payload
//! into the store for one registry, inside a single serializable
//! transaction.

use chrono::Utc;
use uuid::Uuid;
use warden_core::error::{Error, Result};
use warden_core::model::{Entry, EntryKind, EntryOrigin, LatestPointer, Registry, ServerVersion, SkillVersion};
use warden_core::store::Store;
use warden_core::version::is_newer;

use crate::filter::CompiledFilter;
use crate::payload::{icon_from_candidate, package_from_candidate, remote_from_candidate, SyncPayload};

/// Inserts a validated, filtered [`SyncPayload`] for `registry_name`,
/// replacing every previously synced (non-MANAGED-published) entry in that
/// registry. Returns the number of entries written.
pub async fn store<S: Store>(store: &S, registry_name: &str, payload: SyncPayload, filter: &CompiledFilter) -> Result<u64> {
    let registry_name = registry_name.to_string();

    store
        .write(move |tx| {
            let registry = tx
                .get_registry_by_name(&registry_name)?
                .ok_or_else(|| Error::RegistryNotFound(registry_name.clone()))?;

            // Every name with a LatestPointer before this sync. A name the
            // new payload drops entirely still needs its pointer revisited
            // below, or it keeps referencing an entry this sync deletes.
            let mut touched_names: Vec<(EntryKind, String)> = tx
                .list_latest_pointers(registry.id)?
                .into_iter()
                .map(|p| (p.entry_type, p.name))
                .collect();

            // Replace-all policy for REMOTE/FILE/KUBERNETES syncs (spec §4.2):
            // MANAGED entries in the same registry are never touched.
            tx.delete_synced_entries(registry.id)?;

            let mut written = 0u64;

            for candidate in payload.servers {
                if !filter.admits(&candidate.name, &candidate.tags) {
                    continue;
                }
                let entry_id = Uuid::new_v4();
                let now = Utc::now();
                tx.insert_entry(Entry {
                    id: entry_id,
                    registry_id: registry.id,
                    name: candidate.name.clone(),
                    version: candidate.version.clone(),
                    entry_type: EntryKind::Mcp,
                    description: candidate.description,
                    title: candidate.title,
                    origin: EntryOrigin::Synced,
                    created_at: now,
                    updated_at: now,
                })?;
                tx.insert_server_version(ServerVersion {
                    entry_id,
                    website_url: candidate.website_url,
                    repository: candidate.repository,
                    server_meta: candidate.server_meta,
                    upstream_meta: None,
                })?;
                for pkg in candidate.packages {
                    tx.insert_package(package_from_candidate(entry_id, pkg))?;
                }
                for remote in candidate.remotes {
                    tx.insert_remote(remote_from_candidate(entry_id, remote))?;
                }
                for icon in candidate.icons {
                    tx.insert_icon(icon_from_candidate(entry_id, icon))?;
                }
                written += 1;
                touched_names.push((EntryKind::Mcp, candidate.name));
            }

            for candidate in payload.skills {
                if !filter.admits(&candidate.name, &candidate.tags) {
                    continue;
                }
                let entry_id = Uuid::new_v4();
                let now = Utc::now();
                tx.insert_entry(Entry {
                    id: entry_id,
                    registry_id: registry.id,
                    name: candidate.name.clone(),
                    version: candidate.version.clone(),
                    entry_type: EntryKind::Skill,
                    description: candidate.description,
                    title: candidate.title,
                    origin: EntryOrigin::Synced,
                    created_at: now,
                    updated_at: now,
                })?;
                tx.insert_skill_version(SkillVersion {
                    entry_id,
                    namespace: candidate.namespace,
                    status: candidate.status,
                    allowed_tools: candidate.allowed_tools,
                    repository: candidate.repository,
                    icons: candidate.icons_meta,
                    metadata: candidate.metadata,
                    extension_meta: candidate.extension_meta,
                    license: candidate.license,
                    compatibility: candidate.compatibility,
                })?;
                for icon in candidate.icons {
                    tx.insert_icon(icon_from_candidate(entry_id, icon))?;
                }
                written += 1;
                touched_names.push((EntryKind::Skill, candidate.name));
            }

            touched_names.sort();
            touched_names.dedup();

            for (entry_type, name) in touched_names {
                recompute_latest(tx, registry.id, entry_type, &name)?;
            }

            Ok(written)
        })
        .await
}

/// Scans every remaining version of `(registry_id, entry_type, name)` and
/// advances the [`LatestPointer`] to the maximum by [`is_newer`], per spec
/// §4.3. Used both by the writer and by delete (when the deleted version
/// was the current latest).
pub fn recompute_latest(
    tx: &mut dyn warden_core::store::WriteTx,
    registry_id: Uuid,
    entry_type: EntryKind,
    name: &str,
) -> Result<()> {
    let versions = tx.list_entry_versions(&warden_core::store::ListEntryVersionsParams {
        registry_id,
        name: name.to_string(),
        entry_type,
        cursor: None,
        limit: usize::MAX,
    })?;

    let best = versions.into_iter().reduce(|a, b| {
        if is_newer(&b.entry.version, &a.entry.version) {
            b
        } else {
            a
        }
    });

    tx.upsert_latest_pointer(LatestPointer {
        registry_id,
        name: name.to_string(),
        entry_type,
        entry_id: best.map(|v| v.entry.id),
    })
}

pub fn registry_source_unchanged(before: &Registry, after: &Registry) -> Result<()> {
    if before.source_kind != after.source_kind {
        return Err(Error::SourceTypeChangeNotAllowed(before.name.clone()));
    }
    if before.file_subtype != after.file_subtype {
        return Err(Error::InvalidRegistryConfig(format!(
            "registry {}: file subtype is immutable",
            before.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_core::model::{CreationKind, RegistryKind};
    use warden_core::store::WriteTx;
    use warden_store_redb::RedbStore;

    async fn temp_store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("warden.redb")).unwrap();
        (store, dir)
    }

    fn remote_registry(name: &str) -> Registry {
        let now = Utc::now();
        Registry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: RegistryKind::Remote,
            creation: CreationKind::Api,
            source_kind: Some(warden_core::model::SourceKind::Git),
            file_subtype: None,
            format: Registry::default_format(),
            source_config: serde_json::json!({}),
            filter_config: None,
            sync_schedule: Some(std::time::Duration::from_secs(300)),
            syncable: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn writes_servers_and_advances_latest() {
        let (db, _dir) = temp_store().await;
        let registry = remote_registry("alpha");
        let registry_id = registry.id;
        db.write(move |tx| tx.insert_api_registry(registry)).await.unwrap();

        let payload = crate::payload::Validator::validate(
            br#"{"servers":[
                {"name":"s","version":"1.0.0"},
                {"name":"s","version":"2.0.0"}
            ]}"#,
            "upstream",
        )
        .unwrap();

        let filter = CompiledFilter::pass_through();
        let written = store(&db, "alpha", payload, &filter).await.unwrap();
        assert_eq!(written, 2);

        let latest = db
            .read(move |tx| tx.get_latest_version(registry_id, "s"))
            .await
            .unwrap()
            .unwrap();
        assert!(latest.entry_id.is_some());
    }

    #[tokio::test]
    async fn second_sync_replaces_first() {
        let (db, _dir) = temp_store().await;
        let registry = remote_registry("beta");
        db.write(move |tx| tx.insert_api_registry(registry)).await.unwrap();

        let filter = CompiledFilter::pass_through();
        let first = crate::payload::Validator::validate(
            br#"{"servers":[{"name":"s","version":"1.0.0"}]}"#,
            "upstream",
        )
        .unwrap();
        store(&db, "beta", first, &filter).await.unwrap();

        let second = crate::payload::Validator::validate(
            br#"{"servers":[{"name":"other","version":"1.0.0"}]}"#,
            "upstream",
        )
        .unwrap();
        let written = store(&db, "beta", second, &filter).await.unwrap();
        assert_eq!(written, 1);

        let registry_id = db
            .read(|tx| tx.get_registry_by_name("beta"))
            .await
            .unwrap()
            .unwrap()
            .id;
        let dropped = db
            .read(move |tx| tx.get_latest_version(registry_id, "s"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dropped.entry_id, None);
    }
}
