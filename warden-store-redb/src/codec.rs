//! Postcard encode/decode helpers, mapping failures into the engine's `Error`.

use serde::{Serialize, de::DeserializeOwned};
use warden_core::error::{Error, Result};

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| Error::Internal(format!("encode failed: {e}")))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| Error::Internal(format!("decode failed: {e}")))
}
