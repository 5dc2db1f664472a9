//! Request/response shapes for [`crate::RegistryService`]. These are the
//! semantic signatures from spec §6, given concrete Rust types.

use chrono::{DateTime, Utc};
use warden_core::model::EntryView;

#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub registry_name: Option<String>,
    pub search: Option<String>,
    pub cursor: Option<String>,
    pub updated_since: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub limit: Option<usize>,
    pub prefix_names: bool,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<EntryView>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetVersionOpts {
    pub name: String,
    pub version: String,
    pub registry_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListVersionsOpts {
    pub name: String,
    pub registry_name: Option<String>,
    pub next: Option<String>,
    pub prev: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DeleteVersionOpts {
    pub registry_name: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct RegistryInfo {
    pub registry: warden_core::model::Registry,
    pub sync_status: Option<warden_core::model::SyncStatus>,
}

#[derive(Debug, Clone)]
pub struct CreateRegistryOpts {
    pub name: String,
    pub kind: warden_core::model::RegistryKind,
    pub source_kind: Option<warden_core::model::SourceKind>,
    pub file_subtype: Option<warden_core::model::FileSubtype>,
    pub format: Option<String>,
    pub source_config: serde_json::Value,
    pub filter_config: Option<serde_json::Value>,
    pub sync_schedule: Option<std::time::Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRegistryOpts {
    /// Present only so a caller's attempt to change it can be rejected with
    /// `SourceTypeChangeNotAllowed` (spec §4.6) — `update_registry` never
    /// writes this field.
    pub source_kind: Option<warden_core::model::SourceKind>,
    pub file_subtype: Option<warden_core::model::FileSubtype>,
    pub source_config: Option<serde_json::Value>,
    pub filter_config: Option<serde_json::Value>,
    pub sync_schedule: Option<Option<std::time::Duration>>,
}
