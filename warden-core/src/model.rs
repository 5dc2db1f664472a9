//! Entities and value types from the registry data model.
//!
//! Every wire/storage-facing type derives `Serialize`/`Deserialize`, since
//! anything that crosses a storage or protocol boundary needs it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How a registry's entries are sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Managed,
    Remote,
    File,
    Kubernetes,
}

/// Who created the registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationKind {
    Config,
    Api,
}

/// The upstream source type a registry pulls from. Distinct from
/// [`RegistryKind`]: a `RegistryKind::Managed` registry has no source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Managed,
    Git,
    Api,
    File,
    Kubernetes,
}

/// Immutable once persisted, per invariant 4 (only meaningful when
/// `SourceKind::File`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSubtype {
    Path,
    Url,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Mcp,
    Skill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconTheme {
    Light,
    Dark,
}

impl Default for IconTheme {
    /// Unknown themes default to light per spec §3.
    fn default() -> Self {
        IconTheme::Light
    }
}

/// A namespace of entries, backed by a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub id: Uuid,
    pub name: String,
    pub kind: RegistryKind,
    pub creation: CreationKind,
    pub source_kind: Option<SourceKind>,
    pub file_subtype: Option<FileSubtype>,
    pub format: String,
    pub source_config: Value,
    pub filter_config: Option<Value>,
    #[serde(with = "duration_opt_secs")]
    pub sync_schedule: Option<Duration>,
    pub syncable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registry {
    pub fn default_format() -> String {
        "upstream".to_string()
    }
}

mod duration_opt_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

/// A named, versioned record within a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub registry_id: Uuid,
    pub name: String,
    pub version: String,
    pub entry_type: EntryKind,
    pub description: String,
    pub title: String,
    pub origin: EntryOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How an [`Entry`] came to exist: publish (MANAGED registries) or sync
/// (REMOTE/FILE/KUBERNETES registries). Distinct from a registry's
/// [`CreationKind`], which tracks who created the *registry* row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    Published,
    Synced,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Repository {
    pub url: String,
    pub id: Option<String>,
    pub subfolder: Option<String>,
    #[serde(rename = "type")]
    pub repo_type: Option<String>,
}

/// One-to-one with an [`Entry`] of [`EntryKind::Mcp`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerVersion {
    pub entry_id: Uuid,
    pub website_url: Option<String>,
    pub repository: Option<Repository>,
    /// Size-capped, publisher-provided extension metadata.
    pub server_meta: Option<Value>,
    /// Reserved for future upstream-sourced metadata; not yet populated.
    pub upstream_meta: Option<Value>,
}

/// One-to-one with an [`Entry`] of [`EntryKind::Skill`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillVersion {
    pub entry_id: Uuid,
    pub namespace: String,
    pub status: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub repository: Option<Value>,
    pub icons: Option<Value>,
    pub metadata: Option<Value>,
    pub extension_meta: Option<Value>,
    pub license: Option<String>,
    pub compatibility: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnvVar {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Transport {
    #[serde(rename = "type")]
    pub transport_type: String,
    pub url: Option<String>,
    #[serde(default)]
    pub headers: Value,
}

/// Child of an [`Entry`]: one installable package artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub registry_type: String,
    pub registry_base_url: Option<String>,
    pub identifier: String,
    pub version: Option<String>,
    pub sha256: Option<String>,
    pub runtime_hint: Option<String>,
    pub runtime_args: Vec<String>,
    pub package_args: Vec<String>,
    pub env_vars: Vec<EnvVar>,
    pub transport: Transport,
}

/// Child of an [`Entry`]: a remote (hosted) transport endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remote {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub transport: Transport,
}

/// Child of an [`Entry`]: a display icon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Icon {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub source_uri: String,
    pub mime_type: Option<String>,
    pub theme: IconTheme,
}

/// Per `(registryId, name)`, the entry version considered current.
///
/// `entry_type` is retained even when `entry_id` goes `None`: a name is
/// scoped to one entry type for as long as any version of it has ever
/// existed in the registry, so recomputing after the last version is
/// deleted still needs to know which type's versions to rescan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestPointer {
    pub registry_id: Uuid,
    pub name: String,
    pub entry_type: EntryKind,
    pub entry_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    InProgress,
    Completed,
    Failed,
}

/// Per-registry synchronization status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub registry_id: Uuid,
    pub phase: SyncPhase,
    pub error_msg: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub server_count: u32,
}

/// One internal composite view backing every query shape (`listServers`,
/// `listServerVersions`, `getServerVersion`), per spec §9's
/// "don't leak the shape of a particular query" design note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryView {
    pub entry: Entry,
    pub server: Option<ServerVersion>,
    pub skill: Option<SkillVersion>,
    pub packages: Vec<Package>,
    pub remotes: Vec<Remote>,
    pub icons: Vec<Icon>,
}

impl EntryView {
    pub fn name_version(&self) -> (&str, &str) {
        (&self.entry.name, &self.entry.version)
    }
}
