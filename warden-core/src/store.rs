//! The `Store` contract: durable, transactional keyed access to
//! registries, entries, versions, packages, remotes, icons, and sync state.
//!
//! A trait plus row/param types, with one production backend
//! (`warden-store-redb`). Multi-statement transactions are common here
//! (entry + version + children, all atomic), so `Store` exposes `read`/
//! `write` closures that receive a transaction handle, the same "run this
//! unit of work inside one transaction" shape a connection-pooled SQL store
//! would offer.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    Entry, EntryKind, EntryView, Icon, LatestPointer, Package, Registry, Remote, ServerVersion,
    SkillVersion, SyncStatus,
};

/// Filter/paging parameters shared by `list_entries` and `list_entry_versions`.
#[derive(Debug, Clone, Default)]
pub struct EntryCursor {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ListEntriesParams {
    pub registry_id: Option<Uuid>,
    pub entry_type: EntryKind,
    pub search: Option<String>,
    pub after: Option<EntryCursor>,
    pub updated_since: Option<DateTime<Utc>>,
    pub version: Option<String>,
    /// Rows requested; callers pass `limit + 1` to detect a next page (spec §4.5).
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct GetEntryVersionParams {
    pub registry_id: Uuid,
    pub name: String,
    pub version: String,
    pub entry_type: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionsDirection {
    Next,
    Prev,
}

#[derive(Debug, Clone)]
pub struct ListEntryVersionsParams {
    pub registry_id: Uuid,
    pub name: String,
    pub entry_type: EntryKind,
    pub cursor: Option<(VersionsDirection, String)>,
    pub limit: usize,
}

/// Read-only operations, valid inside either a read-only or a write
/// transaction (a write transaction can always read its own writes).
pub trait ReadTx {
    fn get_registry_by_name(&self, name: &str) -> Result<Option<Registry>>;
    fn list_registries(&self, limit: usize) -> Result<Vec<Registry>>;

    fn list_entries(&self, params: &ListEntriesParams) -> Result<Vec<EntryView>>;
    fn get_entry_version(&self, params: &GetEntryVersionParams) -> Result<Option<EntryView>>;
    fn list_entry_versions(&self, params: &ListEntryVersionsParams) -> Result<Vec<EntryView>>;

    fn list_packages(&self, entry_ids: &[Uuid]) -> Result<Vec<Package>>;
    fn list_remotes(&self, entry_ids: &[Uuid]) -> Result<Vec<Remote>>;
    fn list_icons(&self, entry_ids: &[Uuid]) -> Result<Vec<Icon>>;

    fn get_latest_version(&self, registry_id: Uuid, name: &str) -> Result<Option<LatestPointer>>;

    /// Every `LatestPointer` row currently recorded for `registry_id`,
    /// including ones whose `entry_id` is already `None`. Used to find
    /// names that must be revisited after a bulk replace even though they
    /// carry no entry in the new payload (spec invariant: a pointer must
    /// never dangle).
    fn list_latest_pointers(&self, registry_id: Uuid) -> Result<Vec<LatestPointer>>;

    fn get_sync_status_by_name(&self, registry_name: &str) -> Result<Option<SyncStatus>>;
}

/// Mutating operations, only available inside a write (serializable)
/// transaction.
pub trait WriteTx: ReadTx {
    fn insert_api_registry(&mut self, registry: Registry) -> Result<()>;
    fn update_api_registry(&mut self, registry: Registry) -> Result<()>;
    fn delete_api_registry(&mut self, name: &str) -> Result<()>;

    fn insert_entry(&mut self, entry: Entry) -> Result<()>;
    fn insert_server_version(&mut self, version: ServerVersion) -> Result<()>;
    fn insert_skill_version(&mut self, version: SkillVersion) -> Result<()>;
    fn insert_package(&mut self, package: Package) -> Result<()>;
    fn insert_remote(&mut self, remote: Remote) -> Result<()>;
    fn insert_icon(&mut self, icon: Icon) -> Result<()>;

    /// Deletes one entry (and cascades to its children). Returns rows affected.
    fn delete_entry(&mut self, registry_id: Uuid, name: &str, version: &str) -> Result<u64>;

    /// Deletes every REMOTE/FILE-created entry in `registry_id` (used by the
    /// sync replace-all policy, spec §4.2). MANAGED entries are untouched.
    fn delete_synced_entries(&mut self, registry_id: Uuid) -> Result<u64>;

    fn upsert_latest_pointer(&mut self, pointer: LatestPointer) -> Result<()>;
    fn upsert_sync_status(&mut self, status: SyncStatus) -> Result<()>;
    fn bulk_initialize_sync_status(&mut self, statuses: Vec<SyncStatus>) -> Result<()>;
}

/// The top-level store handle. `S` is generic rather than `dyn` because the
/// closures `read`/`write` take are not object-safe (they're generic over
/// their return type); `Arc<dyn _>` is reserved for genuinely dynamic
/// fan-out, such as the per-call telemetry span.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Runs `f` inside a read-only (snapshot / read-committed) transaction.
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadTx) -> Result<T> + Send + 'static,
        T: Send + 'static;

    /// Runs `f` inside a serializable read-write transaction. Rolls back and
    /// surfaces `f`'s error if it returns `Err`; never persists partial state.
    async fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn WriteTx) -> Result<T> + Send + 'static,
        T: Send + 'static;
}
