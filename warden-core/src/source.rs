//! The `SourceFetcher` contract (C4): produces raw bytes and a format tag
//! for a given registry's source config. Concrete git/HTTP clients are
//! external collaborators per spec §1 — only the trait lives here.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::SourceKind;

/// Raw upstream payload plus the format tag the [`crate::Validator`] needs
/// to parse it.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub bytes: Vec<u8>,
    pub format: String,
}

/// Produces bytes for a registry's configured upstream source.
///
/// Implementations are plugged in by the host application (git clone +
/// read, HTTP GET, Kubernetes API list, ...); the engine depends only on
/// this trait.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source_kind: SourceKind, source_config: &Value) -> Result<FetchedPayload>;
}
