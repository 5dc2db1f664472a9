//! Cross-registry name prefixing and routing (spec §4.5).
//!
//! **Open question resolution** (documented in `DESIGN.md`): when
//! `registryName` is unset and `name` carries no `.`-prefix, we return
//! `InvalidArgument` rather than guessing a registry. The spec leaves this
//! implementation-defined but requires it be documented.

use uuid::Uuid;
use warden_core::error::{Error, Result};
use warden_core::store::Store;

pub fn prefixed_name(registry_name: &str, name: &str) -> String {
    format!("{registry_name}.{name}")
}

pub fn split_prefixed_name(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
}

/// Resolves `(registry_id, bare_name)` for a possibly-prefixed `name`.
pub async fn resolve_registry_for_name<S: Store>(store: &S, registry_name: Option<&str>, name: &str) -> Result<(Uuid, String)> {
    if let Some(registry_name) = registry_name {
        let registry_name = registry_name.to_string();
        let registry = store
            .read(move |tx| tx.get_registry_by_name(&registry_name))
            .await?
            .ok_or_else(|| Error::RegistryNotFound(registry_name.clone()))?;
        return Ok((registry.id, name.to_string()));
    }

    let (prefix, rest) = split_prefixed_name(name).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{name:?} has no registry prefix and no registryName was supplied"
        ))
    })?;
    let prefix = prefix.to_string();
    let registry = store
        .read(move |tx| tx.get_registry_by_name(&prefix))
        .await?
        .ok_or_else(|| Error::RegistryNotFound(prefix.clone()))?;
    Ok((registry.id, rest.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_dot_only() {
        assert_eq!(split_prefixed_name("alpha.my.server"), Some(("alpha", "my.server")));
    }

    #[test]
    fn prefixing_round_trips_through_split() {
        let prefixed = prefixed_name("alpha", "my-server");
        assert_eq!(split_prefixed_name(&prefixed), Some(("alpha", "my-server")));
    }
}
