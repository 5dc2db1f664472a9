//! `ListServers` / `GetServerVersion` / `ListServerVersions` /
//! `PublishServerVersion` / `DeleteServerVersion` (spec §4.4/§4.5).

use chrono::Utc;
use uuid::Uuid;
use warden_core::cursor::Cursor;
use warden_core::error::{Error, Result};
use warden_core::model::{Entry, EntryKind, EntryOrigin, EntryView, Icon, Package, Remote, RegistryKind, ServerVersion};
use warden_core::store::{EntryCursor, GetEntryVersionParams, ListEntriesParams, ListEntryVersionsParams, Store, VersionsDirection};
use warden_validate::{IconCandidate, PackageCandidate, RemoteCandidate, ServerCandidate};

use crate::name::validate_entry_name;
use crate::opts::{DeleteVersionOpts, GetVersionOpts, ListOpts, ListResult, ListVersionsOpts};
use crate::routing::{prefixed_name, resolve_registry_for_name};
use crate::{DEFAULT_LIMIT, MAX_LIMIT};

fn package_from(entry_id: Uuid, c: PackageCandidate) -> Package {
    Package {
        id: Uuid::new_v4(),
        entry_id,
        registry_type: c.registry_type,
        registry_base_url: c.registry_base_url,
        identifier: c.identifier,
        version: c.version,
        sha256: c.sha256,
        runtime_hint: c.runtime_hint,
        runtime_args: c.runtime_args,
        package_args: c.package_args,
        env_vars: c.env_vars,
        transport: c.transport,
    }
}

fn remote_from(entry_id: Uuid, c: RemoteCandidate) -> Remote {
    Remote {
        id: Uuid::new_v4(),
        entry_id,
        transport: c.transport,
    }
}

pub(crate) fn icon_from(entry_id: Uuid, c: IconCandidate) -> Icon {
    Icon {
        id: Uuid::new_v4(),
        entry_id,
        source_uri: c.source_uri,
        mime_type: c.mime_type,
        theme: c.theme,
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT).max(1)
}

pub async fn list_servers<S: Store>(store: &S, opts: ListOpts) -> Result<ListResult> {
    let registry = match &opts.registry_name {
        Some(name) => {
            let name = name.clone();
            Some(
                store
                    .read(move |tx| tx.get_registry_by_name(&name))
                    .await?
                    .ok_or_else(|| Error::RegistryNotFound(opts.registry_name.clone().unwrap()))?,
            )
        }
        None => None,
    };

    let after = opts
        .cursor
        .as_deref()
        .map(Cursor::decode)
        .transpose()?
        .map(|c| EntryCursor {
            name: c.name,
            version: c.version,
        });

    let limit = clamp_limit(opts.limit);
    let params = ListEntriesParams {
        registry_id: registry.as_ref().map(|r| r.id),
        entry_type: EntryKind::Mcp,
        search: opts.search.clone(),
        after,
        updated_since: opts.updated_since,
        version: opts.version.clone(),
        limit: limit + 1,
    };

    let mut rows = store.read(move |tx| tx.list_entries(&params)).await?;

    let next_cursor = if rows.len() > limit {
        rows.truncate(limit);
        rows.last().map(|v| Cursor::new(v.entry.name.clone(), v.entry.version.clone()).encode())
    } else {
        None
    };

    let use_prefix = opts.prefix_names || registry.is_none();
    if use_prefix {
        let registry_name = registry.as_ref().map(|r| r.name.clone());
        for row in &mut rows {
            let reg_name = match &registry_name {
                Some(n) => n.clone(),
                None => lookup_registry_name(store, row.entry.registry_id).await?,
            };
            row.entry.name = prefixed_name(&reg_name, &row.entry.name);
        }
    }

    Ok(ListResult {
        items: rows,
        next_cursor,
    })
}

async fn lookup_registry_name<S: Store>(store: &S, registry_id: Uuid) -> Result<String> {
    store
        .read(move |tx| {
            tx.list_registries(usize::MAX)?
                .into_iter()
                .find(|r| r.id == registry_id)
                .map(|r| r.name)
                .ok_or_else(|| Error::bug("entry referenced a registry id with no registry row"))
        })
        .await
}

pub async fn get_server_version<S: Store>(store: &S, opts: GetVersionOpts) -> Result<EntryView> {
    let (registry_id, bare_name) = resolve_registry_for_name(store, opts.registry_name.as_deref(), &opts.name).await?;
    let version = opts.version.clone();
    let params = GetEntryVersionParams {
        registry_id,
        name: bare_name.clone(),
        version: version.clone(),
        entry_type: EntryKind::Mcp,
    };
    store
        .read(move |tx| tx.get_entry_version(&params))
        .await?
        .ok_or_else(|| Error::NotFound(format!("{bare_name}@{version}")))
}

pub async fn list_server_versions<S: Store>(store: &S, opts: ListVersionsOpts) -> Result<Vec<EntryView>> {
    if opts.next.is_some() && opts.prev.is_some() {
        return Err(Error::InvalidArgument("exactly one of next/prev may be set".into()));
    }
    let (registry_id, bare_name) = resolve_registry_for_name(store, opts.registry_name.as_deref(), &opts.name).await?;
    let cursor = match (opts.next, opts.prev) {
        (Some(v), None) => Some((VersionsDirection::Next, v)),
        (None, Some(v)) => Some((VersionsDirection::Prev, v)),
        _ => None,
    };
    let params = ListEntryVersionsParams {
        registry_id,
        name: bare_name,
        entry_type: EntryKind::Mcp,
        cursor,
        limit: clamp_limit(opts.limit),
    };
    store.read(move |tx| tx.list_entry_versions(&params)).await
}

/// `publishServerVersion` (spec §4.4). `max_meta_size` comes from
/// `EngineConfig`.
pub async fn publish_server_version<S: Store>(
    store: &S,
    registry_name: &str,
    candidate: ServerCandidate,
    max_meta_size: usize,
) -> Result<EntryView> {
    validate_entry_name(&candidate.name)?;

    if let Some(meta) = &candidate.server_meta {
        let size = serde_json::to_vec(meta).map_err(|e| Error::bug(format!("server_meta not serializable: {e}")))?.len();
        if size > max_meta_size {
            return Err(Error::MetaTooLarge(size, max_meta_size));
        }
    }

    let registry_name_owned = registry_name.to_string();
    let name = candidate.name.clone();
    let version = candidate.version.clone();

    store
        .write(move |tx| {
            let registry = tx
                .get_registry_by_name(&registry_name_owned)?
                .ok_or_else(|| Error::RegistryNotFound(registry_name_owned.clone()))?;
            if registry.kind != RegistryKind::Managed {
                return Err(Error::NotManagedRegistry(registry_name_owned.clone()));
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
                origin: EntryOrigin::Published,
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
                tx.insert_package(package_from(entry_id, pkg))?;
            }
            for remote in candidate.remotes {
                tx.insert_remote(remote_from(entry_id, remote))?;
            }
            for icon in candidate.icons {
                tx.insert_icon(icon_from(entry_id, icon))?;
            }

            warden_validate::recompute_latest(tx, registry.id, EntryKind::Mcp, &candidate.name)?;
            Ok(())
        })
        .await?;

    // Step 9: re-read on a fresh snapshot after commit.
    get_server_version(
        store,
        GetVersionOpts {
            name,
            version,
            registry_name: Some(registry_name.to_string()),
        },
    )
    .await
}

pub async fn delete_server_version<S: Store>(store: &S, opts: DeleteVersionOpts) -> Result<()> {
    let registry_name = opts.registry_name.clone();
    let name = opts.name.clone();
    let version = opts.version.clone();

    store
        .write(move |tx| {
            let registry = tx
                .get_registry_by_name(&registry_name)?
                .ok_or_else(|| Error::RegistryNotFound(registry_name.clone()))?;
            if registry.kind != RegistryKind::Managed {
                return Err(Error::NotManagedRegistry(registry_name.clone()));
            }

            let rows = tx.delete_entry(registry.id, &name, &version)?;
            if rows == 0 {
                return Err(Error::NotFound(format!("{name}@{version}")));
            }

            // The deleted version may have been the current latest; recompute
            // by scanning whatever remains (spec §4.3/open question resolution).
            warden_validate::recompute_latest(tx, registry.id, EntryKind::Mcp, &name)?;
            Ok(())
        })
        .await?;
    Ok(())
}
