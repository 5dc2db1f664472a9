//! `SyncCoordinator`: schedules and runs sync cycles per syncable
//! registry, enforcing single-flight and honoring cancellation.
//!
//! An `Arc<Semaphore>` bounds the shared worker pool, the same
//! rate-limiting shape used for per-request limiting but applied here
//! per sync cycle instead.

mod cycle;

pub use cycle::{run_cycle, CycleOutcome};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warden_core::error::Error;
use warden_core::model::Registry;
use warden_core::source::SourceFetcher;
use warden_core::store::Store;
use warden_core::telemetry::Tracer;

/// Default retry policy when a caller doesn't supply one via
/// [`SyncCoordinator::with_retry`]: no retries.
const DEFAULT_RETRY_ATTEMPTS: u32 = 0;
const DEFAULT_RETRY_INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Runs background sync cycles for every syncable registry on a bounded
/// worker pool. One `tokio::task` per registry; at most one in-flight cycle
/// per registry name (spec §4.7/§5).
pub struct SyncCoordinator<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    tracer: Arc<dyn Tracer>,
    pool: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    cancel: CancellationToken,
    retry_attempts: u32,
    retry_initial_backoff: Duration,
}

impl<S, F> Clone for SyncCoordinator<S, F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            tracer: self.tracer.clone(),
            pool: self.pool.clone(),
            in_flight: self.in_flight.clone(),
            cancel: self.cancel.clone(),
            retry_attempts: self.retry_attempts,
            retry_initial_backoff: self.retry_initial_backoff,
        }
    }
}

impl<S, F> SyncCoordinator<S, F>
where
    S: Store,
    F: SourceFetcher + 'static,
{
    pub fn new(store: Arc<S>, fetcher: Arc<F>, tracer: Arc<dyn Tracer>, max_concurrent_cycles: usize) -> Self {
        Self {
            store,
            fetcher,
            tracer,
            pool: Arc::new(Semaphore::new(max_concurrent_cycles.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            cancel: CancellationToken::new(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_initial_backoff: DEFAULT_RETRY_INITIAL_BACKOFF,
        }
    }

    /// Sets how many additional attempts a failed cycle gets before giving
    /// up, with exponential backoff starting at `initial_backoff`. Mirrors
    /// `EngineConfig::sync_retry_attempts`/`sync_retry_initial_backoff`;
    /// callers that build an `EngineConfig` should pass those straight
    /// through.
    pub fn with_retry(mut self, attempts: u32, initial_backoff: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_initial_backoff = initial_backoff;
        self
    }

    /// Signals every running cycle to abort promptly. Does not await
    /// completion; callers should await the [`JoinHandle`]s returned by
    /// [`Self::spawn_schedule`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Spawns one long-running task that drives `registry`'s sync cycles at
    /// its configured interval until shutdown. Returns immediately; the
    /// first cycle runs after one interval tick (not at spawn time), so
    /// callers that want an immediate first sync should call [`run_cycle`]
    /// directly before spawning.
    pub fn spawn_schedule(&self, registry: Registry) -> Option<JoinHandle<()>> {
        let interval = registry.sync_schedule?;
        let coordinator = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; consume it up front
            loop {
                tokio::select! {
                    _ = coordinator.cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let _ = coordinator.try_run_once(&registry.name).await;
            }
        }))
    }

    /// Runs one cycle for `registry_name` if it isn't already in flight,
    /// retrying a failed cycle up to `retry_attempts` times with exponential
    /// backoff. Attempts to start while an earlier cycle is still in flight
    /// are skipped, never queued (spec §4.7), and surfaced as
    /// [`Error::Retryable`] so a caller driving this outside the periodic
    /// scheduler knows to try again later rather than treating it as final.
    pub async fn try_run_once(&self, registry_name: &str) -> Result<CycleOutcome, Error> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(registry_name.to_string()) {
                let err = Error::Retryable(format!("sync already in flight for registry {registry_name}"));
                warn!(registry = registry_name, error = %err, "sync already in flight, skipping");
                return Err(err);
            }
        }

        let _permit = match self.pool.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                self.in_flight.lock().await.remove(registry_name);
                return Err(Error::Canceled);
            }
        };

        let mut backoff = self.retry_initial_backoff;
        let mut result = run_cycle(
            self.store.as_ref(),
            self.fetcher.as_ref(),
            self.tracer.as_ref(),
            registry_name,
            self.cancel.clone(),
        )
        .await;

        for attempt in 0..self.retry_attempts {
            let Ok(CycleOutcome::Failed { message }) = &result else {
                break;
            };
            warn!(registry = registry_name, attempt, error = %message, "sync cycle failed, retrying");
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff *= 2;
            result = run_cycle(
                self.store.as_ref(),
                self.fetcher.as_ref(),
                self.tracer.as_ref(),
                registry_name,
                self.cancel.clone(),
            )
            .await;
        }

        self.in_flight.lock().await.remove(registry_name);

        match &result {
            Ok(outcome) => info!(registry = registry_name, ?outcome, "sync cycle finished"),
            Err(e) => warn!(registry = registry_name, error = %e, "sync cycle failed to even start"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;
    use uuid::Uuid;
    use warden_core::error::{Error, Result};
    use warden_core::model::{CreationKind, RegistryKind, SourceKind};
    use warden_core::store::WriteTx;
    use warden_core::telemetry::NoopTracer;
    use warden_store_redb::RedbStore;

    struct StaticFetcher {
        body: &'static str,
    }

    #[async_trait]
    impl SourceFetcher for StaticFetcher {
        async fn fetch(&self, _source_kind: SourceKind, _source_config: &Value) -> Result<warden_core::source::FetchedPayload> {
            Ok(warden_core::source::FetchedPayload {
                bytes: self.body.as_bytes().to_vec(),
                format: "upstream".to_string(),
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl SourceFetcher for FailingFetcher {
        async fn fetch(&self, _source_kind: SourceKind, _source_config: &Value) -> Result<warden_core::source::FetchedPayload> {
            Err(Error::Internal("upstream unreachable".to_string()))
        }
    }

    async fn temp_store() -> (Arc<RedbStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("warden.redb")).unwrap();
        (Arc::new(store), dir)
    }

    fn remote_registry(name: &str) -> Registry {
        let now = Utc::now();
        Registry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: RegistryKind::Remote,
            creation: CreationKind::Api,
            source_kind: Some(SourceKind::Git),
            file_subtype: None,
            format: Registry::default_format(),
            source_config: serde_json::json!({}),
            filter_config: None,
            sync_schedule: Some(std::time::Duration::from_secs(300)),
            syncable: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn successful_cycle_marks_completed() {
        let (store, _dir) = temp_store().await;
        let registry = remote_registry("alpha");
        let registry_id = registry.id;
        store.write(move |tx| tx.insert_api_registry(registry)).await.unwrap();

        let fetcher = Arc::new(StaticFetcher {
            body: r#"{"servers":[{"name":"s","version":"1.0.0"}]}"#,
        });
        let coordinator = SyncCoordinator::new(store.clone(), fetcher, Arc::new(NoopTracer), 2);
        coordinator.try_run_once("alpha").await.unwrap();

        let status = store.read(move |tx| tx.get_sync_status_by_name("alpha")).await.unwrap().unwrap();
        assert_eq!(status.phase, warden_core::model::SyncPhase::Completed);
        assert_eq!(status.server_count, 1);
        let _ = registry_id;
    }

    #[tokio::test]
    async fn fetch_failure_marks_failed_and_increments_attempts() {
        let (store, _dir) = temp_store().await;
        let registry = remote_registry("beta");
        store.write(move |tx| tx.insert_api_registry(registry)).await.unwrap();

        let coordinator = SyncCoordinator::new(store.clone(), Arc::new(FailingFetcher), Arc::new(NoopTracer), 2);
        let outcome = coordinator.try_run_once("beta").await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Failed { .. }));
        let outcome = coordinator.try_run_once("beta").await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Failed { .. }));

        let status = store.read(move |tx| tx.get_sync_status_by_name("beta")).await.unwrap().unwrap();
        assert_eq!(status.phase, warden_core::model::SyncPhase::Failed);
        assert_eq!(status.attempt_count, 2);
    }

    #[tokio::test]
    async fn retries_a_failed_cycle_before_giving_up() {
        let (store, _dir) = temp_store().await;
        let registry = remote_registry("delta");
        store.write(move |tx| tx.insert_api_registry(registry)).await.unwrap();

        let coordinator = SyncCoordinator::new(store.clone(), Arc::new(FailingFetcher), Arc::new(NoopTracer), 2)
            .with_retry(2, Duration::from_millis(1));
        coordinator.try_run_once("delta").await.unwrap();

        // One initial attempt plus two retries.
        let status = store.read(move |tx| tx.get_sync_status_by_name("delta")).await.unwrap().unwrap();
        assert_eq!(status.attempt_count, 3);
    }

    #[tokio::test]
    async fn retry_policy_passes_through_from_engine_config() {
        use warden_core::config::EngineConfigBuilder;

        let (store, _dir) = temp_store().await;
        let registry = remote_registry("epsilon");
        store.write(move |tx| tx.insert_api_registry(registry)).await.unwrap();

        let config = EngineConfigBuilder::new()
            .max_meta_size(8192)
            .connection_string("redb:///tmp/unused.redb")
            .tracer(Arc::new(NoopTracer))
            .sync_retry(1, Duration::from_millis(1))
            .build()
            .unwrap();

        let coordinator = SyncCoordinator::new(store.clone(), Arc::new(FailingFetcher), config.tracer.clone(), 2)
            .with_retry(config.sync_retry_attempts, config.sync_retry_initial_backoff);
        coordinator.try_run_once("epsilon").await.unwrap();

        let status = store.read(move |tx| tx.get_sync_status_by_name("epsilon")).await.unwrap().unwrap();
        assert_eq!(status.attempt_count, 2);
    }

    #[tokio::test]
    async fn concurrent_run_is_skipped_while_in_flight() {
        let (store, _dir) = temp_store().await;
        let registry = remote_registry("gamma");
        store.write(move |tx| tx.insert_api_registry(registry)).await.unwrap();

        let fetcher = Arc::new(StaticFetcher {
            body: r#"{"servers":[]}"#,
        });
        let coordinator = SyncCoordinator::new(store.clone(), fetcher, Arc::new(NoopTracer), 2);

        let a = coordinator.try_run_once("gamma");
        let b = coordinator.try_run_once("gamma");
        let (a, b) = tokio::join!(a, b);
        assert!(matches!((a, b), (Ok(_), Err(Error::Retryable(_))) | (Err(Error::Retryable(_)), Ok(_))));

        let status = store.read(move |tx| tx.get_sync_status_by_name("gamma")).await.unwrap().unwrap();
        assert_eq!(status.phase, warden_core::model::SyncPhase::Completed);
    }
}
