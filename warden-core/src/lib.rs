//! Shared types and traits for the warden registry data engine.
//!
//! This crate has no opinions about storage backend, source-fetching
//! mechanism, or HTTP framing — it only defines the contracts
//! (`Store`, `SourceFetcher`, `Tracer`) and the data model other `warden-*`
//! crates implement against. See `SPEC_FULL.md` at the workspace root for
//! the full requirements this engine implements.

pub mod config;
pub mod cursor;
pub mod error;
pub mod model;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod version;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use cursor::Cursor;
pub use error::{Error, ErrBug, Result};
pub use source::{FetchedPayload, SourceFetcher};
pub use store::{ReadTx, Store, WriteTx};
pub use telemetry::{NoopTracer, Span, Tracer, TracingTracer};
