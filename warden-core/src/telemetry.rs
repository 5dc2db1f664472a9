//! Telemetry as a capability: a [`Tracer`] trait with a no-op default.
//!
//! `tracing` is used unconditionally through the call stack with no gate
//! for "is a subscriber installed" — this wraps that in an explicit
//! capability so callers that don't want span export can skip it entirely.

use std::collections::HashMap;
use std::fmt;

/// A single in-flight span handle. Implementations may carry a real
/// `tracing::Span`, an OpenTelemetry context, or nothing at all.
pub trait Span: fmt::Debug + Send + Sync {
    /// Records that the operation this span covers failed.
    fn record_error(&self, err: &dyn fmt::Display);
}

/// Capability for starting spans around engine operations. A `None` tracer
/// (or [`NoopTracer`]) is always valid; span operations become no-ops.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str, attrs: &HashMap<String, String>) -> Box<dyn Span>;
}

/// A span that does nothing. Returned by [`NoopTracer`].
#[derive(Debug, Default)]
pub struct NoopSpan;

impl Span for NoopSpan {
    fn record_error(&self, _err: &dyn fmt::Display) {}
}

/// The default tracer when no telemetry backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str, _attrs: &HashMap<String, String>) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

/// A tracer that forwards spans to `tracing`, recording errors via
/// `tracing::error!`. The span itself is entered for the lifetime of the
/// returned [`Span`] handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracer;

struct TracingSpan {
    span: tracing::Span,
    _entered: tracing::span::EnteredSpan,
}

impl fmt::Debug for TracingSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingSpan").finish_non_exhaustive()
    }
}

impl Span for TracingSpan {
    fn record_error(&self, err: &dyn fmt::Display) {
        let _guard = self.span.enter();
        tracing::error!(error = %err, "operation failed");
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str, attrs: &HashMap<String, String>) -> Box<dyn Span> {
        let span = tracing::info_span!("warden", op = %name);
        {
            let _guard = span.enter();
            tracing::debug!(?attrs, "span started");
        }
        let entered = span.clone().entered();
        Box::new(TracingSpan {
            span,
            _entered: entered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_tracer_never_panics() {
        let tracer = NoopTracer;
        let span = tracer.start_span("publish", &HashMap::new());
        span.record_error(&"boom");
    }
}
