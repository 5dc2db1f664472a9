//! Opaque pagination cursors over `(name, version)`.
//!
//! Wire format per spec §6: base64 (URL-safe, unpadded) of `name\x00version`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::error::{Error, Result};

const SEPARATOR: u8 = 0u8;

/// A decoded pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub name: String,
    pub version: String,
}

impl Cursor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Encodes this cursor as an opaque, URL-safe base64 string.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(self.name.len() + self.version.len() + 1);
        raw.extend_from_slice(self.name.as_bytes());
        raw.push(SEPARATOR);
        raw.extend_from_slice(self.version.as_bytes());
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes an opaque cursor previously produced by [`Cursor::encode`].
    ///
    /// Returns [`Error::CursorError`] on malformed input.
    pub fn decode(s: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| Error::CursorError(format!("malformed base64: {e}")))?;

        let mut parts = raw.splitn(2, |&b| b == SEPARATOR);
        let name = parts
            .next()
            .ok_or_else(|| Error::CursorError("missing name segment".into()))?;
        let version = parts
            .next()
            .ok_or_else(|| Error::CursorError("missing version segment".into()))?;

        let name = String::from_utf8(name.to_vec())
            .map_err(|e| Error::CursorError(format!("invalid utf-8 in name: {e}")))?;
        let version = String::from_utf8(version.to_vec())
            .map_err(|e| Error::CursorError(format!("invalid utf-8 in version: {e}")))?;

        Ok(Cursor { name, version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let c = Cursor::new("my-server", "1.2.3");
        let encoded = c.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(c, decoded);
    }

    #[test]
    fn malformed_base64_is_cursor_error() {
        let err = Cursor::decode("not-valid-base64!!!").unwrap_err();
        assert!(matches!(err, Error::CursorError(_)));
    }

    #[test]
    fn missing_separator_is_cursor_error() {
        let encoded = URL_SAFE_NO_PAD.encode(b"just-a-name-no-separator");
        let err = Cursor::decode(&encoded).unwrap_err();
        assert!(matches!(err, Error::CursorError(_)));
    }

    proptest::proptest! {
        #[test]
        fn round_trip_prop(name in "[a-zA-Z0-9_.-]{0,40}", version in "[a-zA-Z0-9_.-]{0,40}") {
            let c = Cursor::new(name.clone(), version.clone());
            let decoded = Cursor::decode(&c.encode()).unwrap();
            proptest::prop_assert_eq!(decoded.name, name);
            proptest::prop_assert_eq!(decoded.version, version);
        }
    }
}
