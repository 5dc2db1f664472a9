//! The only concrete [`SourceFetcher`] shipped here: inline/file payloads
//! supplied directly by the caller (spec §4.6's `ProcessInlineRegistryData`).
//! Git/HTTP fetchers remain out of scope per spec §1.
//!
//! A registry with an unset `source_kind` is never syncable (only `Remote`
//! and `File` registries get a sync schedule), so this fetcher rejecting
//! anything but `SourceKind::File` never affects a real sync cycle.

use serde_json::Value;
use warden_core::error::{Error, Result};
use warden_core::model::SourceKind;
use warden_core::source::{FetchedPayload, SourceFetcher};

/// Returns `source_config.data` (a JSON-embedded upstream payload) or
/// `source_config.path`'s file contents, depending on which key is present
/// in `source_config`. Only `SourceKind::File` is handled; any other source
/// kind is a caller error, since real fetchers live outside this crate.
pub struct InlineFetcher;

#[async_trait::async_trait]
impl SourceFetcher for InlineFetcher {
    async fn fetch(&self, source_kind: SourceKind, source_config: &Value) -> Result<FetchedPayload> {
        match source_kind {
            SourceKind::File => fetch_file(source_config),
            other => Err(Error::InvalidArgument(format!(
                "InlineFetcher cannot handle source kind {other:?}; wire a real SourceFetcher"
            ))),
        }
    }
}

fn fetch_file(source_config: &Value) -> Result<FetchedPayload> {
    let format = source_config
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("upstream")
        .to_string();

    if let Some(data) = source_config.get("data") {
        let bytes = serde_json::to_vec(data).map_err(|e| Error::ParseError(format!("inline data not json: {e}")))?;
        return Ok(FetchedPayload { bytes, format });
    }

    if let Some(path) = source_config.get("path").and_then(Value::as_str) {
        let bytes = std::fs::read(path).map_err(|e| Error::ParseError(format!("reading inline path {path:?}: {e}")))?;
        return Ok(FetchedPayload { bytes, format });
    }

    Err(Error::InvalidRegistryConfig(
        "file registry source_config must set either `data` or `path`".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_inline_data() {
        let fetcher = InlineFetcher;
        let config = serde_json::json!({ "data": { "servers": [] } });
        let result = fetcher.fetch(SourceKind::File, &config).await.unwrap();
        assert_eq!(result.format, "upstream");
    }

    #[tokio::test]
    async fn rejects_non_file_source() {
        let fetcher = InlineFetcher;
        let err = fetcher.fetch(SourceKind::Git, &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
