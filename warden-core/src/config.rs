//! Engine configuration via a functional-options builder, validated at
//! `build()` time, per spec §9's design note. The connection target is a
//! tagged enum rather than two separate optional fields, constructed
//! programmatically rather than parsed off disk (file parsing is out of
//! scope here).

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::telemetry::{NoopTracer, Tracer};

/// Exactly one of these must be supplied to [`EngineConfigBuilder::build`].
pub enum ConnectionTarget {
    Pool(Arc<dyn std::any::Any + Send + Sync>),
    ConnectionString(String),
}

impl std::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionTarget::Pool(_) => write!(f, "ConnectionTarget::Pool(..)"),
            ConnectionTarget::ConnectionString(s) => {
                write!(f, "ConnectionTarget::ConnectionString({s:?})")
            }
        }
    }
}

/// Validated engine configuration.
pub struct EngineConfig {
    pub max_meta_size: usize,
    pub connection: ConnectionTarget,
    pub tracer: Arc<dyn Tracer>,
    pub sync_retry_attempts: u32,
    pub sync_retry_initial_backoff: Duration,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("max_meta_size", &self.max_meta_size)
            .field("connection", &self.connection)
            .field("sync_retry_attempts", &self.sync_retry_attempts)
            .field("sync_retry_initial_backoff", &self.sync_retry_initial_backoff)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EngineConfig`]. Every setter is a plain method rather than
/// a generic `Option<F>` options list.
#[derive(Default)]
pub struct EngineConfigBuilder {
    max_meta_size: Option<usize>,
    connection: Option<ConnectionTarget>,
    tracer: Option<Arc<dyn Tracer>>,
    sync_retry_attempts: Option<u32>,
    sync_retry_initial_backoff: Option<Duration>,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_meta_size(mut self, bytes: usize) -> Self {
        self.max_meta_size = Some(bytes);
        self
    }

    pub fn connection_pool(mut self, pool: Arc<dyn std::any::Any + Send + Sync>) -> Self {
        self.connection = Some(ConnectionTarget::Pool(pool));
        self
    }

    pub fn connection_string(mut self, conn: impl Into<String>) -> Self {
        self.connection = Some(ConnectionTarget::ConnectionString(conn.into()));
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn sync_retry(mut self, attempts: u32, initial_backoff: Duration) -> Self {
        self.sync_retry_attempts = Some(attempts);
        self.sync_retry_initial_backoff = Some(initial_backoff);
        self
    }

    /// Validates and produces an [`EngineConfig`].
    ///
    /// Fails with [`Error::InvalidArgument`] if `max_meta_size` is not
    /// positive, or if no connection target was supplied.
    pub fn build(self) -> Result<EngineConfig> {
        let max_meta_size = self
            .max_meta_size
            .ok_or_else(|| Error::InvalidArgument("max_meta_size is required".into()))?;
        if max_meta_size == 0 {
            return Err(Error::InvalidArgument(
                "max_meta_size must be greater than zero".into(),
            ));
        }

        let connection = self.connection.ok_or_else(|| {
            Error::InvalidArgument(
                "exactly one of connection_pool or connection_string is required".into(),
            )
        })?;

        Ok(EngineConfig {
            max_meta_size,
            connection,
            tracer: self.tracer.unwrap_or_else(|| Arc::new(NoopTracer)),
            sync_retry_attempts: self.sync_retry_attempts.unwrap_or(3),
            sync_retry_initial_backoff: self
                .sync_retry_initial_backoff
                .unwrap_or_else(|| Duration::from_millis(50)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_connection() {
        let err = EngineConfigBuilder::new().max_meta_size(1024).build().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn build_fails_on_zero_max_meta_size() {
        let err = EngineConfigBuilder::new()
            .max_meta_size(0)
            .connection_string("redb:///tmp/warden.redb")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn build_succeeds_with_defaults() {
        let cfg = EngineConfigBuilder::new()
            .max_meta_size(8192)
            .connection_string("redb:///tmp/warden.redb")
            .build()
            .unwrap();
        assert_eq!(cfg.max_meta_size, 8192);
        assert_eq!(cfg.sync_retry_attempts, 3);
    }
}
