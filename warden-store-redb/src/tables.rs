//! Table definitions. All tables use raw byte keys/values; encoding lives in
//! [`crate::keys`] (key layout) and [`crate::codec`] (value encoding).

use redb::TableDefinition;

/// `name -> postcard(Registry)`
pub const REGISTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("registries");

/// `registry_id(16) -> name` — secondary index for id-keyed lookups.
pub const REGISTRY_NAME_BY_ID: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("registry_name_by_id");

/// `entry_id(16) -> postcard(Entry)`
pub const ENTRIES_BY_ID: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries_by_id");

/// `entry_id(16) -> postcard(ServerVersion)`
pub const SERVER_VERSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("server_versions");

/// `entry_id(16) -> postcard(SkillVersion)`
pub const SKILL_VERSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("skill_versions");

/// `entry_id(16) ++ package_id(16) -> postcard(Package)`
pub const PACKAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("packages");

/// `entry_id(16) ++ remote_id(16) -> postcard(Remote)`
pub const REMOTES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("remotes");

/// `entry_id(16) ++ icon_id(16) -> postcard(Icon)`
pub const ICONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("icons");

/// `registry_id(16) ++ entry_type(1) ++ name ++ 0x00 ++ version -> entry_id(16)`
///
/// Primary per-registry ordering index: a lexicographic byte range scan over
/// this table yields entries in `(name ASC, version ASC)` order (spec §4.5),
/// scoped to one entry type. Uniqueness is enforced separately by
/// `ENTRY_UNIQUE_BY_REGISTRY`, since `(registryId, name, version)` must be
/// unique across both entry types, not just within one.
pub const ENTRY_INDEX_BY_REGISTRY: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("entry_index_by_registry");

/// `entry_type(1) ++ name ++ 0x00 ++ version ++ 0x00 ++ registry_id(16) -> entry_id(16)`
///
/// Cross-registry ordering index, used when `listServers` has no
/// `registryName` filter.
pub const ENTRY_INDEX_GLOBAL: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("entry_index_global");

/// `registry_id(16) ++ name ++ 0x00 ++ version -> entry_id(16)`
///
/// Type-agnostic uniqueness index: the key carries no `entry_type` byte, so
/// an MCP entry and a skill entry sharing a `(name, version)` in the same
/// registry collide here even though they live in different
/// `ENTRY_INDEX_BY_REGISTRY` partitions.
pub const ENTRY_UNIQUE_BY_REGISTRY: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("entry_unique_by_registry");

/// `registry_id(16) ++ name ++ 0x00 -> postcard(LatestPointer)`
pub const LATEST_POINTERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("latest_pointers");

/// `registry_id(16) -> postcard(SyncStatus)`
pub const SYNC_STATUS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sync_status");
