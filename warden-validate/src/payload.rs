//! The `upstream` wire format: a small self-describing JSON envelope listing
//! server and skill candidates, using tagged enums and `#[serde(default)]`
//! throughout so older payloads without newer optional fields still parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::error::{Error, Result};
use warden_core::model::{EnvVar, Icon, IconTheme, Package, Remote, Repository, Transport};

/// Raw candidate for an MCP server entry, as it appears in an `upstream` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCandidate {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub server_meta: Option<Value>,
    #[serde(default)]
    pub packages: Vec<PackageCandidate>,
    #[serde(default)]
    pub remotes: Vec<RemoteCandidate>,
    #[serde(default)]
    pub icons: Vec<IconCandidate>,
}

/// Raw candidate for a skill entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillCandidate {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub namespace: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default)]
    pub repository: Option<Value>,
    #[serde(default)]
    pub icons_meta: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub extension_meta: Option<Value>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub compatibility: Option<String>,
    #[serde(default)]
    pub icons: Vec<IconCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackageCandidate {
    pub registry_type: String,
    #[serde(default)]
    pub registry_base_url: Option<String>,
    pub identifier: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub runtime_hint: Option<String>,
    #[serde(default)]
    pub runtime_args: Vec<String>,
    #[serde(default)]
    pub package_args: Vec<String>,
    #[serde(default)]
    pub env_vars: Vec<EnvVar>,
    #[serde(default)]
    pub transport: Transport,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteCandidate {
    #[serde(default)]
    pub transport: Transport,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IconCandidate {
    pub source_uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub theme: IconTheme,
}

/// The parsed, still-unfiltered contents of an upstream payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncPayload {
    #[serde(default)]
    pub servers: Vec<ServerCandidate>,
    #[serde(default)]
    pub skills: Vec<SkillCandidate>,
}

impl SyncPayload {
    pub fn len(&self) -> usize {
        self.servers.len() + self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses upstream payloads. `"upstream"` is the only recognized format
/// today; unknown formats fail with [`Error::ParseError`].
pub struct Validator;

impl Validator {
    pub fn validate(bytes: &[u8], format: &str) -> Result<SyncPayload> {
        if format != "upstream" {
            return Err(Error::ParseError(format!("unrecognized payload format {format:?}")));
        }
        serde_json::from_slice(bytes).map_err(|e| Error::ParseError(format!("invalid upstream payload: {e}")))
    }
}

pub(crate) fn package_from_candidate(entry_id: uuid::Uuid, c: PackageCandidate) -> Package {
    Package {
        id: uuid::Uuid::new_v4(),
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

pub(crate) fn remote_from_candidate(entry_id: uuid::Uuid, c: RemoteCandidate) -> Remote {
    Remote {
        id: uuid::Uuid::new_v4(),
        entry_id,
        transport: c.transport,
    }
}

pub(crate) fn icon_from_candidate(entry_id: uuid::Uuid, c: IconCandidate) -> Icon {
    Icon {
        id: uuid::Uuid::new_v4(),
        entry_id,
        source_uri: c.source_uri,
        mime_type: c.mime_type,
        theme: c.theme,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        let err = Validator::validate(b"{}", "yaml").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn parses_minimal_server() {
        let payload = Validator::validate(
            br#"{"servers":[{"name":"s","version":"1.0.0"}]}"#,
            "upstream",
        )
        .unwrap();
        assert_eq!(payload.servers.len(), 1);
        assert_eq!(payload.servers[0].description, "");
    }

    #[test]
    fn parses_skill_with_namespace() {
        let payload = Validator::validate(
            br#"{"skills":[{"name":"k","version":"1.0.0","namespace":"ns"}]}"#,
            "upstream",
        )
        .unwrap();
        assert_eq!(payload.skills[0].namespace, "ns");
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = Validator::validate(b"not json", "upstream").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
