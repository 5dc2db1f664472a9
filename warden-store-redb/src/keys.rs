//! Byte-key layout for the range-scannable index tables. See `tables.rs` for
//! the per-table layout documentation.

use uuid::Uuid;
use warden_core::model::EntryKind;

const SEP: u8 = 0x00;

pub fn uuid_key(id: Uuid) -> [u8; 16] {
    *id.as_bytes()
}

pub fn entry_type_byte(kind: EntryKind) -> u8 {
    match kind {
        EntryKind::Mcp => 0,
        EntryKind::Skill => 1,
    }
}

pub fn registry_index_key(registry_id: Uuid, entry_type: EntryKind, name: &str, version: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 1 + name.len() + 1 + version.len());
    key.extend_from_slice(&uuid_key(registry_id));
    key.push(entry_type_byte(entry_type));
    key.extend_from_slice(name.as_bytes());
    key.push(SEP);
    key.extend_from_slice(version.as_bytes());
    key
}

/// Lower bound for a range scan over every `(name, version)` pair in a
/// registry, for the given entry type.
pub fn registry_index_prefix(registry_id: Uuid, entry_type: EntryKind) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.extend_from_slice(&uuid_key(registry_id));
    key.push(entry_type_byte(entry_type));
    key
}

/// Lower bound for a range scan over every version of one `(registry, name)`.
pub fn registry_index_name_prefix(registry_id: Uuid, entry_type: EntryKind, name: &str) -> Vec<u8> {
    let mut key = registry_index_prefix(registry_id, entry_type);
    key.extend_from_slice(name.as_bytes());
    key.push(SEP);
    key
}

pub fn global_index_key(entry_type: EntryKind, name: &str, version: &str, registry_id: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len() + 1 + version.len() + 1 + 16);
    key.push(entry_type_byte(entry_type));
    key.extend_from_slice(name.as_bytes());
    key.push(SEP);
    key.extend_from_slice(version.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&uuid_key(registry_id));
    key
}

pub fn global_index_prefix(entry_type: EntryKind) -> Vec<u8> {
    vec![entry_type_byte(entry_type)]
}

/// `(registryId, name, version)` key with no entry-type byte, the scope the
/// uniqueness invariant is actually defined over (an MCP entry and a skill
/// entry may not share a name+version within one registry).
pub fn registry_name_version_key(registry_id: Uuid, name: &str, version: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + name.len() + 1 + version.len());
    key.extend_from_slice(&uuid_key(registry_id));
    key.extend_from_slice(name.as_bytes());
    key.push(SEP);
    key.extend_from_slice(version.as_bytes());
    key
}

pub fn child_key(entry_id: Uuid, child_id: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&uuid_key(entry_id));
    key.extend_from_slice(&uuid_key(child_id));
    key
}

pub fn child_prefix(entry_id: Uuid) -> Vec<u8> {
    uuid_key(entry_id).to_vec()
}

pub fn latest_pointer_key(registry_id: Uuid, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + name.len() + 1);
    key.extend_from_slice(&uuid_key(registry_id));
    key.extend_from_slice(name.as_bytes());
    key.push(SEP);
    key
}

/// Lower bound for a range scan over every `LatestPointer` row in a registry.
pub fn latest_pointer_prefix(registry_id: Uuid) -> Vec<u8> {
    uuid_key(registry_id).to_vec()
}

/// Byte-increments `prefix` to produce an exclusive upper bound for a
/// `start..end` range scan covering every key beginning with `prefix`.
pub fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut upper = prefix.to_vec();
    for i in (0..upper.len()).rev() {
        if upper[i] != 0xff {
            upper[i] += 1;
            upper.truncate(i + 1);
            return upper;
        }
    }
    // All bytes were 0xff; no finite upper bound shorter than `prefix` exists,
    // so scan to the end of the keyspace.
    vec![0xff; prefix.len() + 1]
}
