//! Error kinds shared by every layer of the engine.
//!
//! A small `thiserror` enum with one variant per failure class callers
//! need to branch on, rather than a single opaque error type.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// A single failure class an engine caller may need to observe and branch on.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The backend does not support this operation (e.g. the `GetRegistry` aggregate).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A required row was absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A registry lookup missed (a distinguished `NotFound` subcase).
    #[error("registry not found: {0}")]
    RegistryNotFound(String),

    /// Duplicate registry name on create.
    #[error("registry already exists: {0}")]
    AlreadyExists(String),

    /// Duplicate `(registry, name, version)` on publish.
    #[error("version already exists: {0}")]
    VersionAlreadyExists(String),

    /// Malformed input, empty required fields, conflicting next/prev, bad name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Registry config failed validation (including a file-subtype change).
    #[error("invalid registry config: {0}")]
    InvalidRegistryConfig(String),

    /// Attempt to change an immutable `sourceType`.
    #[error("source type change not allowed: {0}")]
    SourceTypeChangeNotAllowed(String),

    /// Publish/delete attempted against a non-MANAGED registry.
    #[error("registry is not managed: {0}")]
    NotManagedRegistry(String),

    /// Attempt to mutate a CONFIG-created registry via the API.
    #[error("config-created registry is immutable: {0}")]
    ConfigRegistryImmutable(String),

    /// A malformed opaque pagination cursor.
    #[error("invalid cursor: {0}")]
    CursorError(String),

    /// Publisher-provided metadata exceeded the configured cap.
    #[error("metadata too large: {0} bytes (max {1})")]
    MetaTooLarge(usize, usize),

    /// An upstream payload could not be parsed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The calling context was canceled.
    #[error("canceled")]
    Canceled,

    /// A serialization conflict; the caller may retry.
    #[error("retryable conflict: {0}")]
    Retryable(String),

    /// An unclassified or impossible error. Carries [`ErrBug`] markers
    /// for assertion violations (e.g. a single-row query returning
    /// more or less than one row).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Construct an [`Error::Internal`] for an assertion violation, so tests
    /// can pin impossible states instead of letting them escape as generic
    /// internal errors.
    pub fn bug(msg: impl fmt::Display) -> Self {
        Error::Internal(format!("{ErrBug}: {msg}"))
    }
}

/// Sentinel printed inside [`Error::Internal`] messages produced by [`Error::bug`].
pub struct ErrBug;

impl fmt::Display for ErrBug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrBug")
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
