//! Skill analogs of `servers.rs` (spec §4.4: "Publish for skills follows the
//! same shape, additionally requiring `namespace`.").

use chrono::Utc;
use uuid::Uuid;
use warden_core::cursor::Cursor;
use warden_core::error::{Error, Result};
use warden_core::model::{Entry, EntryKind, EntryOrigin, EntryView, RegistryKind, SkillVersion};
use warden_core::store::{EntryCursor, GetEntryVersionParams, ListEntriesParams, ListEntryVersionsParams, Store, VersionsDirection};
use warden_validate::SkillCandidate;

use crate::name::validate_entry_name;
use crate::opts::{DeleteVersionOpts, GetVersionOpts, ListOpts, ListResult, ListVersionsOpts};
use crate::routing::{prefixed_name, resolve_registry_for_name};
use crate::servers::icon_from;
use crate::{DEFAULT_LIMIT, MAX_LIMIT};

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT).max(1)
}

pub async fn list_skills<S: Store>(store: &S, opts: ListOpts) -> Result<ListResult> {
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
        entry_type: EntryKind::Skill,
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

    if opts.prefix_names || registry.is_none() {
        if let Some(r) = &registry {
            for row in &mut rows {
                row.entry.name = prefixed_name(&r.name, &row.entry.name);
            }
        } else {
            for row in &mut rows {
                let reg_name = store
                    .read({
                        let registry_id = row.entry.registry_id;
                        move |tx| {
                            tx.list_registries(usize::MAX)?
                                .into_iter()
                                .find(|r| r.id == registry_id)
                                .map(|r| r.name)
                                .ok_or_else(|| Error::bug("entry referenced a registry id with no registry row"))
                        }
                    })
                    .await?;
                row.entry.name = prefixed_name(&reg_name, &row.entry.name);
            }
        }
    }

    Ok(ListResult {
        items: rows,
        next_cursor,
    })
}

pub async fn get_skill_version<S: Store>(store: &S, opts: GetVersionOpts) -> Result<EntryView> {
    let (registry_id, bare_name) = resolve_registry_for_name(store, opts.registry_name.as_deref(), &opts.name).await?;
    let version = opts.version.clone();
    let params = GetEntryVersionParams {
        registry_id,
        name: bare_name.clone(),
        version: version.clone(),
        entry_type: EntryKind::Skill,
    };
    store
        .read(move |tx| tx.get_entry_version(&params))
        .await?
        .ok_or_else(|| Error::NotFound(format!("{bare_name}@{version}")))
}

pub async fn list_skill_versions<S: Store>(store: &S, opts: ListVersionsOpts) -> Result<Vec<EntryView>> {
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
        entry_type: EntryKind::Skill,
        cursor,
        limit: clamp_limit(opts.limit),
    };
    store.read(move |tx| tx.list_entry_versions(&params)).await
}

pub async fn publish_skill<S: Store>(store: &S, registry_name: &str, candidate: SkillCandidate) -> Result<EntryView> {
    validate_entry_name(&candidate.name)?;
    if candidate.namespace.is_empty() {
        return Err(Error::InvalidArgument("skill namespace is required".into()));
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
                entry_type: EntryKind::Skill,
                description: candidate.description,
                title: candidate.title,
                origin: EntryOrigin::Published,
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
                tx.insert_icon(icon_from(entry_id, icon))?;
            }

            warden_validate::recompute_latest(tx, registry.id, EntryKind::Skill, &candidate.name)?;
            Ok(())
        })
        .await?;

    get_skill_version(
        store,
        GetVersionOpts {
            name,
            version,
            registry_name: Some(registry_name.to_string()),
        },
    )
    .await
}

pub async fn delete_skill_version<S: Store>(store: &S, opts: DeleteVersionOpts) -> Result<()> {
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

            warden_validate::recompute_latest(tx, registry.id, EntryKind::Skill, &name)?;
            Ok(())
        })
        .await
}
