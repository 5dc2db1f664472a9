//! `ReadTx`/`WriteTx` implementations backed by a single redb transaction.
//!
//! The usual `open_table`, then `.get()`/`.range()`/`.insert()` pattern,
//! spread across several tables instead of one.

use redb::{ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use uuid::Uuid;
use warden_core::error::{Error, Result};
use warden_core::model::{
    Entry, EntryKind, EntryView, Icon, LatestPointer, Package, Registry, Remote, ServerVersion,
    SkillVersion, SyncStatus,
};
use warden_core::store::{
    EntryCursor, GetEntryVersionParams, ListEntriesParams, ListEntryVersionsParams, ReadTx,
    VersionsDirection, WriteTx,
};

use crate::codec::{decode, encode};
use crate::keys;
use crate::tables::*;

fn redb_err(e: impl std::fmt::Display) -> Error {
    Error::Internal(format!("redb: {e}"))
}

/// Primitive byte-level access shared by the read-only and read-write
/// transaction wrappers. All higher-level `ReadTx` logic is implemented once
/// as a blanket impl over this trait.
pub(crate) trait RawAccess {
    fn get_raw(&self, table: TableDefinition<&[u8], &[u8]>, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn range_raw(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        start: &[u8],
        end_exclusive: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
    fn range_raw_rev(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        start: &[u8],
        end_exclusive: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

fn drain<T: ReadableTable<&'static [u8], &'static [u8]>>(
    table: &T,
    start: &[u8],
    end: &[u8],
    rev: bool,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let range = table.range(start..end).map_err(redb_err)?;
    let mut out = Vec::new();
    if rev {
        for item in range.rev() {
            let (k, v) = item.map_err(redb_err)?;
            out.push((k.value().to_vec(), v.value().to_vec()));
        }
    } else {
        for item in range {
            let (k, v) = item.map_err(redb_err)?;
            out.push((k.value().to_vec(), v.value().to_vec()));
        }
    }
    Ok(out)
}

/// Read-only transaction handle.
pub struct RedbReadTx<'a> {
    pub(crate) txn: &'a ReadTransaction,
}

impl RawAccess for RedbReadTx<'_> {
    fn get_raw(&self, table: TableDefinition<&[u8], &[u8]>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let t = self.txn.open_table(table).map_err(redb_err)?;
        Ok(t.get(key).map_err(redb_err)?.map(|g| g.value().to_vec()))
    }

    fn range_raw(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        start: &[u8],
        end_exclusive: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let t = self.txn.open_table(table).map_err(redb_err)?;
        drain(&t, start, end_exclusive, false)
    }

    fn range_raw_rev(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        start: &[u8],
        end_exclusive: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let t = self.txn.open_table(table).map_err(redb_err)?;
        drain(&t, start, end_exclusive, true)
    }
}

/// Read-write (serializable) transaction handle. Also answers `ReadTx`
/// queries, since a write transaction can always see its own writes.
pub struct RedbWriteTx<'a> {
    pub(crate) txn: &'a WriteTransaction,
}

impl RawAccess for RedbWriteTx<'_> {
    fn get_raw(&self, table: TableDefinition<&[u8], &[u8]>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let t = self.txn.open_table(table).map_err(redb_err)?;
        Ok(t.get(key).map_err(redb_err)?.map(|g| g.value().to_vec()))
    }

    fn range_raw(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        start: &[u8],
        end_exclusive: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let t = self.txn.open_table(table).map_err(redb_err)?;
        drain(&t, start, end_exclusive, false)
    }

    fn range_raw_rev(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        start: &[u8],
        end_exclusive: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let t = self.txn.open_table(table).map_err(redb_err)?;
        drain(&t, start, end_exclusive, true)
    }
}

/// Assembles an [`EntryView`] given a decoded `entry_id`, shared by every
/// `ReadTx` query method regardless of which index found the id.
fn load_entry_view<A: RawAccess>(access: &A, entry_id: Uuid) -> Result<Option<EntryView>> {
    let Some(entry_bytes) = access.get_raw(ENTRIES_BY_ID, &keys::uuid_key(entry_id))? else {
        return Ok(None);
    };
    let entry: Entry = decode(&entry_bytes)?;

    let server = access
        .get_raw(SERVER_VERSIONS, &keys::uuid_key(entry_id))?
        .map(|b| decode::<ServerVersion>(&b))
        .transpose()?;
    let skill = access
        .get_raw(SKILL_VERSIONS, &keys::uuid_key(entry_id))?
        .map(|b| decode::<SkillVersion>(&b))
        .transpose()?;

    let prefix = keys::child_prefix(entry_id);
    let upper = keys::prefix_upper_bound(&prefix);

    let packages = access
        .range_raw(PACKAGES, &prefix, &upper)?
        .into_iter()
        .map(|(_, v)| decode::<Package>(&v))
        .collect::<Result<Vec<_>>>()?;
    let remotes = access
        .range_raw(REMOTES, &prefix, &upper)?
        .into_iter()
        .map(|(_, v)| decode::<Remote>(&v))
        .collect::<Result<Vec<_>>>()?;
    let icons = access
        .range_raw(ICONS, &prefix, &upper)?
        .into_iter()
        .map(|(_, v)| decode::<Icon>(&v))
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(EntryView {
        entry,
        server,
        skill,
        packages,
        remotes,
        icons,
    }))
}

fn matches_filters(view: &EntryView, params: &ListEntriesParams) -> bool {
    if let Some(search) = &params.search {
        if !view.entry.name.contains(search.as_str()) {
            return false;
        }
    }
    if let Some(since) = params.updated_since {
        if view.entry.updated_at < since {
            return false;
        }
    }
    if let Some(version) = &params.version {
        if &view.entry.version != version {
            return false;
        }
    }
    true
}

fn after_cursor(name: &str, version: &str, after: &Option<EntryCursor>) -> bool {
    match after {
        None => true,
        Some(c) => (name, version) > (c.name.as_str(), c.version.as_str()),
    }
}

impl<A: RawAccess> ReadTx for A {
    fn get_registry_by_name(&self, name: &str) -> Result<Option<Registry>> {
        self.get_raw(REGISTRIES, name.as_bytes())?
            .map(|b| decode(&b))
            .transpose()
    }

    fn list_registries(&self, limit: usize) -> Result<Vec<Registry>> {
        let rows = self.range_raw(REGISTRIES, &[], &[0xff; 1])?;
        rows.into_iter()
            .take(limit)
            .map(|(_, v)| decode(&v))
            .collect()
    }

    fn list_entries(&self, params: &ListEntriesParams) -> Result<Vec<EntryView>> {
        let rows = match params.registry_id {
            Some(registry_id) => {
                let prefix = keys::registry_index_prefix(registry_id, params.entry_type);
                let upper = keys::prefix_upper_bound(&prefix);
                self.range_raw(ENTRY_INDEX_BY_REGISTRY, &prefix, &upper)?
            }
            None => {
                let prefix = keys::global_index_prefix(params.entry_type);
                let upper = keys::prefix_upper_bound(&prefix);
                self.range_raw(ENTRY_INDEX_GLOBAL, &prefix, &upper)?
            }
        };

        let mut out = Vec::new();
        for (_, entry_id_bytes) in rows {
            if entry_id_bytes.len() != 16 {
                return Err(Error::bug("entry index value was not a 16-byte id"));
            }
            let entry_id = Uuid::from_slice(&entry_id_bytes).map_err(|e| redb_err(e))?;
            let Some(view) = load_entry_view(self, entry_id)? else {
                continue;
            };
            if !after_cursor(&view.entry.name, &view.entry.version, &params.after) {
                continue;
            }
            if !matches_filters(&view, params) {
                continue;
            }
            out.push(view);
            if out.len() >= params.limit {
                break;
            }
        }
        Ok(out)
    }

    fn get_entry_version(&self, params: &GetEntryVersionParams) -> Result<Option<EntryView>> {
        let key = keys::registry_index_key(
            params.registry_id,
            params.entry_type,
            &params.name,
            &params.version,
        );
        let Some(entry_id_bytes) = self.get_raw(ENTRY_INDEX_BY_REGISTRY, &key)? else {
            return Ok(None);
        };
        let entry_id = Uuid::from_slice(&entry_id_bytes).map_err(|e| redb_err(e))?;
        load_entry_view(self, entry_id)
    }

    fn list_entry_versions(&self, params: &ListEntryVersionsParams) -> Result<Vec<EntryView>> {
        let prefix =
            keys::registry_index_name_prefix(params.registry_id, params.entry_type, &params.name);
        let upper = keys::prefix_upper_bound(&prefix);

        let rows = match &params.cursor {
            None => self.range_raw(ENTRY_INDEX_BY_REGISTRY, &prefix, &upper)?,
            Some((VersionsDirection::Next, version)) => {
                let start = keys::registry_index_key(
                    params.registry_id,
                    params.entry_type,
                    &params.name,
                    version,
                );
                let start = keys::prefix_upper_bound(&start);
                self.range_raw(ENTRY_INDEX_BY_REGISTRY, &start, &upper)?
            }
            Some((VersionsDirection::Prev, version)) => {
                let end = keys::registry_index_key(
                    params.registry_id,
                    params.entry_type,
                    &params.name,
                    version,
                );
                let mut rows = self.range_raw_rev(ENTRY_INDEX_BY_REGISTRY, &prefix, &end)?;
                rows.reverse();
                rows
            }
        };

        let mut out = Vec::new();
        for (_, entry_id_bytes) in rows.into_iter().take(params.limit) {
            let entry_id = Uuid::from_slice(&entry_id_bytes).map_err(|e| redb_err(e))?;
            if let Some(view) = load_entry_view(self, entry_id)? {
                out.push(view);
            }
        }
        Ok(out)
    }

    fn list_packages(&self, entry_ids: &[Uuid]) -> Result<Vec<Package>> {
        let mut out = Vec::new();
        for id in entry_ids {
            let prefix = keys::child_prefix(*id);
            let upper = keys::prefix_upper_bound(&prefix);
            for (_, v) in self.range_raw(PACKAGES, &prefix, &upper)? {
                out.push(decode(&v)?);
            }
        }
        Ok(out)
    }

    fn list_remotes(&self, entry_ids: &[Uuid]) -> Result<Vec<Remote>> {
        let mut out = Vec::new();
        for id in entry_ids {
            let prefix = keys::child_prefix(*id);
            let upper = keys::prefix_upper_bound(&prefix);
            for (_, v) in self.range_raw(REMOTES, &prefix, &upper)? {
                out.push(decode(&v)?);
            }
        }
        Ok(out)
    }

    fn list_icons(&self, entry_ids: &[Uuid]) -> Result<Vec<Icon>> {
        let mut out = Vec::new();
        for id in entry_ids {
            let prefix = keys::child_prefix(*id);
            let upper = keys::prefix_upper_bound(&prefix);
            for (_, v) in self.range_raw(ICONS, &prefix, &upper)? {
                out.push(decode(&v)?);
            }
        }
        Ok(out)
    }

    fn get_latest_version(&self, registry_id: Uuid, name: &str) -> Result<Option<LatestPointer>> {
        self.get_raw(LATEST_POINTERS, &keys::latest_pointer_key(registry_id, name))?
            .map(|b| decode(&b))
            .transpose()
    }

    fn list_latest_pointers(&self, registry_id: Uuid) -> Result<Vec<LatestPointer>> {
        let prefix = keys::latest_pointer_prefix(registry_id);
        let upper = keys::prefix_upper_bound(&prefix);
        self.range_raw(LATEST_POINTERS, &prefix, &upper)?
            .into_iter()
            .map(|(_, v)| decode(&v))
            .collect()
    }

    fn get_sync_status_by_name(&self, registry_name: &str) -> Result<Option<SyncStatus>> {
        let Some(registry) = self.get_registry_by_name(registry_name)? else {
            return Ok(None);
        };
        self.get_raw(SYNC_STATUS, &keys::uuid_key(registry.id))?
            .map(|b| decode(&b))
            .transpose()
    }
}

impl WriteTx for RedbWriteTx<'_> {
    fn insert_api_registry(&mut self, registry: Registry) -> Result<()> {
        let mut registries = self.txn.open_table(REGISTRIES).map_err(redb_err)?;
        let mut by_id = self.txn.open_table(REGISTRY_NAME_BY_ID).map_err(redb_err)?;
        let name_key = registry.name.as_bytes();
        if registries.get(name_key).map_err(redb_err)?.is_some() {
            return Err(Error::AlreadyExists(registry.name));
        }
        by_id
            .insert(&keys::uuid_key(registry.id)[..], name_key)
            .map_err(redb_err)?;
        registries
            .insert(name_key, encode(&registry)?.as_slice())
            .map_err(redb_err)?;
        Ok(())
    }

    fn update_api_registry(&mut self, registry: Registry) -> Result<()> {
        let mut registries = self.txn.open_table(REGISTRIES).map_err(redb_err)?;
        let name_key = registry.name.as_bytes();
        if registries.get(name_key).map_err(redb_err)?.is_none() {
            return Err(Error::NotFound(format!("registry {}", registry.name)));
        }
        registries
            .insert(name_key, encode(&registry)?.as_slice())
            .map_err(redb_err)?;
        Ok(())
    }

    fn delete_api_registry(&mut self, name: &str) -> Result<()> {
        let mut registries = self.txn.open_table(REGISTRIES).map_err(redb_err)?;
        let mut by_id = self.txn.open_table(REGISTRY_NAME_BY_ID).map_err(redb_err)?;
        let Some(existing) = registries.get(name.as_bytes()).map_err(redb_err)? else {
            return Err(Error::NotFound(format!("registry {name}")));
        };
        let registry: Registry = decode(existing.value())?;
        drop(existing);
        by_id.remove(&keys::uuid_key(registry.id)[..]).map_err(redb_err)?;
        registries.remove(name.as_bytes()).map_err(redb_err)?;
        Ok(())
    }

    fn insert_entry(&mut self, entry: Entry) -> Result<()> {
        let unique_key =
            keys::registry_name_version_key(entry.registry_id, &entry.name, &entry.version);
        {
            let unique = self.txn.open_table(ENTRY_UNIQUE_BY_REGISTRY).map_err(redb_err)?;
            if unique.get(unique_key.as_slice()).map_err(redb_err)?.is_some() {
                return Err(Error::VersionAlreadyExists(format!(
                    "{}@{}",
                    entry.name, entry.version
                )));
            }
        }

        let index_key = keys::registry_index_key(
            entry.registry_id,
            entry.entry_type,
            &entry.name,
            &entry.version,
        );
        let global_key = keys::global_index_key(
            entry.entry_type,
            &entry.name,
            &entry.version,
            entry.registry_id,
        );
        let id_bytes = keys::uuid_key(entry.id);

        let mut entries = self.txn.open_table(ENTRIES_BY_ID).map_err(redb_err)?;
        let mut by_registry = self.txn.open_table(ENTRY_INDEX_BY_REGISTRY).map_err(redb_err)?;
        let mut by_global = self.txn.open_table(ENTRY_INDEX_GLOBAL).map_err(redb_err)?;
        let mut unique = self.txn.open_table(ENTRY_UNIQUE_BY_REGISTRY).map_err(redb_err)?;

        entries
            .insert(&id_bytes[..], encode(&entry)?.as_slice())
            .map_err(redb_err)?;
        by_registry.insert(index_key.as_slice(), &id_bytes[..]).map_err(redb_err)?;
        by_global.insert(global_key.as_slice(), &id_bytes[..]).map_err(redb_err)?;
        unique.insert(unique_key.as_slice(), &id_bytes[..]).map_err(redb_err)?;
        Ok(())
    }

    fn insert_server_version(&mut self, version: ServerVersion) -> Result<()> {
        let mut table = self.txn.open_table(SERVER_VERSIONS).map_err(redb_err)?;
        table
            .insert(&keys::uuid_key(version.entry_id)[..], encode(&version)?.as_slice())
            .map_err(redb_err)?;
        Ok(())
    }

    fn insert_skill_version(&mut self, version: SkillVersion) -> Result<()> {
        let mut table = self.txn.open_table(SKILL_VERSIONS).map_err(redb_err)?;
        table
            .insert(&keys::uuid_key(version.entry_id)[..], encode(&version)?.as_slice())
            .map_err(redb_err)?;
        Ok(())
    }

    fn insert_package(&mut self, package: Package) -> Result<()> {
        let mut table = self.txn.open_table(PACKAGES).map_err(redb_err)?;
        let key = keys::child_key(package.entry_id, package.id);
        table.insert(key.as_slice(), encode(&package)?.as_slice()).map_err(redb_err)?;
        Ok(())
    }

    fn insert_remote(&mut self, remote: Remote) -> Result<()> {
        let mut table = self.txn.open_table(REMOTES).map_err(redb_err)?;
        let key = keys::child_key(remote.entry_id, remote.id);
        table.insert(key.as_slice(), encode(&remote)?.as_slice()).map_err(redb_err)?;
        Ok(())
    }

    fn insert_icon(&mut self, icon: Icon) -> Result<()> {
        let mut table = self.txn.open_table(ICONS).map_err(redb_err)?;
        let key = keys::child_key(icon.entry_id, icon.id);
        table.insert(key.as_slice(), encode(&icon)?.as_slice()).map_err(redb_err)?;
        Ok(())
    }

    fn delete_entry(&mut self, registry_id: Uuid, name: &str, version: &str) -> Result<u64> {
        let index_key = keys::registry_index_key(registry_id, EntryKind::Mcp, name, version);
        let skill_index_key = keys::registry_index_key(registry_id, EntryKind::Skill, name, version);

        let mut by_registry = self.txn.open_table(ENTRY_INDEX_BY_REGISTRY).map_err(redb_err)?;

        let (found_key, entry_id) = {
            if let Some(g) = by_registry.get(index_key.as_slice()).map_err(redb_err)? {
                let id = Uuid::from_slice(g.value()).map_err(|e| redb_err(e))?;
                (index_key.clone(), id)
            } else if let Some(g) = by_registry.get(skill_index_key.as_slice()).map_err(redb_err)? {
                let id = Uuid::from_slice(g.value()).map_err(|e| redb_err(e))?;
                (skill_index_key.clone(), id)
            } else {
                return Ok(0);
            }
        };

        by_registry.remove(found_key.as_slice()).map_err(redb_err)?;
        self.remove_entry_by_id(entry_id, name, version, registry_id)?;
        Ok(1)
    }

    fn delete_synced_entries(&mut self, registry_id: Uuid) -> Result<u64> {
        let prefix = keys::uuid_key(registry_id).to_vec();
        let upper = keys::prefix_upper_bound(&prefix);
        let rows = self.range_raw(ENTRY_INDEX_BY_REGISTRY, &prefix, &upper)?;

        let mut count = 0u64;
        for (index_key, entry_id_bytes) in rows {
            let entry_id = Uuid::from_slice(&entry_id_bytes).map_err(|e| redb_err(e))?;
            let Some(view) = load_entry_view(self, entry_id)? else {
                continue;
            };
            if view.entry.origin != warden_core::model::EntryOrigin::Synced {
                continue;
            }
            {
                let mut by_registry = self.txn.open_table(ENTRY_INDEX_BY_REGISTRY).map_err(redb_err)?;
                by_registry.remove(index_key.as_slice()).map_err(redb_err)?;
            }
            self.remove_entry_by_id(entry_id, &view.entry.name, &view.entry.version, registry_id)?;
            count += 1;
        }
        Ok(count)
    }

    fn upsert_latest_pointer(&mut self, pointer: LatestPointer) -> Result<()> {
        let mut table = self.txn.open_table(LATEST_POINTERS).map_err(redb_err)?;
        let key = keys::latest_pointer_key(pointer.registry_id, &pointer.name);
        table.insert(key.as_slice(), encode(&pointer)?.as_slice()).map_err(redb_err)?;
        Ok(())
    }

    fn upsert_sync_status(&mut self, status: SyncStatus) -> Result<()> {
        let mut table = self.txn.open_table(SYNC_STATUS).map_err(redb_err)?;
        table
            .insert(&keys::uuid_key(status.registry_id)[..], encode(&status)?.as_slice())
            .map_err(redb_err)?;
        Ok(())
    }

    fn bulk_initialize_sync_status(&mut self, statuses: Vec<SyncStatus>) -> Result<()> {
        let mut table = self.txn.open_table(SYNC_STATUS).map_err(redb_err)?;
        for status in statuses {
            table
                .insert(&keys::uuid_key(status.registry_id)[..], encode(&status)?.as_slice())
                .map_err(redb_err)?;
        }
        Ok(())
    }
}

impl RedbWriteTx<'_> {
    /// Removes every row for one entry id: the entry row itself, its
    /// server/skill version, children, and its global index entry. The
    /// per-registry index row is the caller's responsibility (it knows
    /// which of the two possible entry-type keys matched).
    fn remove_entry_by_id(
        &mut self,
        entry_id: Uuid,
        name: &str,
        version: &str,
        registry_id: Uuid,
    ) -> Result<()> {
        let id_bytes = keys::uuid_key(entry_id);

        let mut entries = self.txn.open_table(ENTRIES_BY_ID).map_err(redb_err)?;
        let entry_type = entries
            .get(&id_bytes[..])
            .map_err(redb_err)?
            .map(|g| decode::<Entry>(g.value()).map(|e| e.entry_type))
            .transpose()?
            .ok_or_else(|| Error::bug("entry index pointed at a missing entry row"))?;
        entries.remove(&id_bytes[..]).map_err(redb_err)?;
        drop(entries);

        let mut server_versions = self.txn.open_table(SERVER_VERSIONS).map_err(redb_err)?;
        server_versions.remove(&id_bytes[..]).map_err(redb_err)?;
        drop(server_versions);

        let mut skill_versions = self.txn.open_table(SKILL_VERSIONS).map_err(redb_err)?;
        skill_versions.remove(&id_bytes[..]).map_err(redb_err)?;
        drop(skill_versions);

        for table_def in [PACKAGES, REMOTES, ICONS] {
            let prefix = keys::child_prefix(entry_id);
            let upper = keys::prefix_upper_bound(&prefix);
            let keys_to_remove: Vec<Vec<u8>> = self
                .range_raw(table_def, &prefix, &upper)?
                .into_iter()
                .map(|(k, _)| k)
                .collect();
            let mut table = self.txn.open_table(table_def).map_err(redb_err)?;
            for k in keys_to_remove {
                table.remove(k.as_slice()).map_err(redb_err)?;
            }
        }

        let global_key = keys::global_index_key(entry_type, name, version, registry_id);
        let mut by_global = self.txn.open_table(ENTRY_INDEX_GLOBAL).map_err(redb_err)?;
        by_global.remove(global_key.as_slice()).map_err(redb_err)?;

        let unique_key = keys::registry_name_version_key(registry_id, name, version);
        let mut unique = self.txn.open_table(ENTRY_UNIQUE_BY_REGISTRY).map_err(redb_err)?;
        unique.remove(unique_key.as_slice()).map_err(redb_err)?;

        Ok(())
    }
}
