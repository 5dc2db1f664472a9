//! Defensive name validation for publish paths (spec §4.4 step 1): the
//! HTTP boundary is expected to enforce this too, but the engine re-checks
//! since it may be called directly.

use std::sync::LazyLock;

use regex::Regex;
use warden_core::error::{Error, Result};

static ALLOWED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("static regex is valid"));

pub fn validate_entry_name(name: &str) -> Result<()> {
    if ALLOWED_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("{name:?} is not a valid entry name")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(validate_entry_name("my-server").is_ok());
        assert!(validate_entry_name("my_server.v2").is_ok());
    }

    #[test]
    fn rejects_empty_and_leading_punctuation() {
        assert!(validate_entry_name("").is_err());
        assert!(validate_entry_name(".leading-dot").is_err());
        assert!(validate_entry_name("has space").is_err());
    }
}
