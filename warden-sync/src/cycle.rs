//! One fetch/validate/filter/write iteration against an upstream source
//! (spec §4.7).

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use warden_core::error::{Error, Result};
use warden_core::model::{SyncPhase, SyncStatus};
use warden_core::source::SourceFetcher;
use warden_core::store::Store;
use warden_core::telemetry::Tracer;
use warden_validate::{CompiledFilter, FilterConfig, Validator};

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed { server_count: u32 },
    Failed { message: String },
    Canceled,
}

/// Runs exactly one sync cycle for `registry_name`. Never propagates a sync
/// *failure* to the caller as an `Err` — failures are recorded in
/// `SyncStatus` and returned as `Ok(CycleOutcome::Failed{..})`. `Err` is
/// reserved for cases where the cycle could not even be set up (registry
/// missing, store unreachable).
pub async fn run_cycle<S: Store, F: SourceFetcher>(
    store: &S,
    fetcher: &F,
    tracer: &dyn Tracer,
    registry_name: &str,
    cancel: CancellationToken,
) -> Result<CycleOutcome> {
    let mut attrs = std::collections::HashMap::new();
    attrs.insert("registry".to_string(), registry_name.to_string());
    let span = tracer.start_span("sync_cycle", &attrs);

    let name = registry_name.to_string();
    let registry = store
        .read(move |tx| {
            tx.get_registry_by_name(&name)?
                .ok_or_else(|| Error::RegistryNotFound(name.clone()))
        })
        .await?;

    let name = registry_name.to_string();
    let previous_attempts = store
        .read(move |tx| Ok(tx.get_sync_status_by_name(&name)?.map(|s| s.attempt_count).unwrap_or(0)))
        .await?;

    let started_at = Utc::now();
    let mark_in_progress = SyncStatus {
        registry_id: registry.id,
        phase: SyncPhase::InProgress,
        error_msg: None,
        started_at: Some(started_at),
        ended_at: None,
        attempt_count: previous_attempts + 1,
        server_count: 0,
    };
    let status_for_write = mark_in_progress.clone();
    store.write(move |tx| tx.upsert_sync_status(status_for_write)).await?;

    if cancel.is_cancelled() {
        return finish_canceled(store, &registry.id, started_at, previous_attempts + 1, span.as_ref()).await;
    }

    let fetch_result = tokio::select! {
        _ = cancel.cancelled() => None,
        result = fetcher.fetch(
            registry.source_kind.unwrap_or(warden_core::model::SourceKind::Managed),
            &registry.source_config,
        ) => Some(result),
    };

    let Some(fetch_result) = fetch_result else {
        return finish_canceled(store, &registry.id, started_at, previous_attempts + 1, span.as_ref()).await;
    };

    let payload = match fetch_result {
        Ok(fetched) => fetched,
        Err(e) => {
            let message = e.to_string();
            span.record_error(&message);
            error!(registry = registry_name, error = %message, "sync fetch failed");
            return finish_failed(store, &registry.id, started_at, previous_attempts + 1, message).await;
        }
    };

    let parsed = match Validator::validate(&payload.bytes, &payload.format) {
        Ok(p) => p,
        Err(e) => {
            let message = e.to_string();
            span.record_error(&message);
            return finish_failed(store, &registry.id, started_at, previous_attempts + 1, message).await;
        }
    };

    let filter_config: FilterConfig = match &registry.filter_config {
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(f) => f,
            Err(e) => {
                let message = format!("invalid filterConfig: {e}");
                return finish_failed(store, &registry.id, started_at, previous_attempts + 1, message).await;
            }
        },
        None => FilterConfig::default(),
    };
    let compiled = match CompiledFilter::compile(&filter_config) {
        Ok(f) => f,
        Err(e) => {
            let message = e.to_string();
            return finish_failed(store, &registry.id, started_at, previous_attempts + 1, message).await;
        }
    };

    let written = tokio::select! {
        _ = cancel.cancelled() => None,
        result = warden_validate::store(store, registry_name, parsed, &compiled) => Some(result),
    };

    let Some(written) = written else {
        return finish_canceled(store, &registry.id, started_at, previous_attempts + 1, span.as_ref()).await;
    };

    match written {
        Ok(server_count) => {
            debug!(registry = registry_name, server_count, "sync cycle completed");
            let status = SyncStatus {
                registry_id: registry.id,
                phase: SyncPhase::Completed,
                error_msg: None,
                started_at: Some(started_at),
                ended_at: Some(Utc::now()),
                attempt_count: previous_attempts + 1,
                server_count: server_count as u32,
            };
            store.write(move |tx| tx.upsert_sync_status(status)).await?;
            Ok(CycleOutcome::Completed {
                server_count: server_count as u32,
            })
        }
        Err(e) => {
            let message = e.to_string();
            span.record_error(&message);
            finish_failed(store, &registry.id, started_at, previous_attempts + 1, message).await
        }
    }
}

async fn finish_failed<S: Store>(
    store: &S,
    registry_id: &uuid::Uuid,
    started_at: chrono::DateTime<Utc>,
    attempt_count: u32,
    message: String,
) -> Result<CycleOutcome> {
    let registry_id = *registry_id;
    let status = SyncStatus {
        registry_id,
        phase: SyncPhase::Failed,
        error_msg: Some(message.clone()),
        started_at: Some(started_at),
        ended_at: Some(Utc::now()),
        attempt_count,
        server_count: 0,
    };
    store.write(move |tx| tx.upsert_sync_status(status)).await?;
    Ok(CycleOutcome::Failed { message })
}

async fn finish_canceled<S: Store>(
    store: &S,
    registry_id: &uuid::Uuid,
    started_at: chrono::DateTime<Utc>,
    attempt_count: u32,
    span: &dyn warden_core::telemetry::Span,
) -> Result<CycleOutcome> {
    span.record_error("canceled");
    finish_failed(store, registry_id, started_at, attempt_count, "canceled".to_string())
        .await
        .map(|_| CycleOutcome::Canceled)
}
