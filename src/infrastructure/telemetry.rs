//! Telemetry Lifecycle
//!
//! 根据配置初始化 OTLP trace / metric 导出，并返回一个统一的关闭句柄。
//!
//! ## States
//! `init` moves the process from uninitialized to exactly one of
//! [`TelemetryState`]; [`TelemetryGuard::shutdown`] consumes the guard, so the
//! providers are shut down at most once.
//!
//! ## Usage
//! ```rust,ignore
//! let guard = telemetry::init(&config.otel)?;
//! // ... serve requests ...
//! if let Err(e) = guard.shutdown(Duration::from_secs(5)).await {
//!     eprintln!("Error shutting down telemetry: {}", e);
//! }
//! ```

use crate::infrastructure::config::{OtelConfig, OtlpConfig};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Subscriber};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

/// `service.name` reported by both signals.
pub const SERVICE_NAME: &str = "workctl";

/// Interval of the periodic metric reader.
pub const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(60);

/// 遥测信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Traces,
    Metrics,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Traces => f.write_str("traces"),
            Signal::Metrics => f.write_str("metrics"),
        }
    }
}

/// Which signals `init` set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryState {
    Disabled,
    TracingOnly,
    MetricsOnly,
    Both,
}

/// 遥测错误
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to create trace exporter: {0}")]
    TraceExporter(String),

    #[error("failed to create metric exporter: {0}")]
    MetricExporter(String),

    #[error("failed to shut down {signal} provider: {reason}")]
    Shutdown { signal: Signal, reason: String },

    #[error("{signal} provider did not shut down within {timeout:?}")]
    ShutdownTimeout { signal: Signal, timeout: Duration },
}

/// Flushes and stops one signal's pipeline. Blocking, should give up after `timeout`.
pub trait ProviderShutdown: Send + Sync {
    fn shutdown_provider(&self, timeout: Duration) -> Result<(), TelemetryError>;
}

impl ProviderShutdown for SdkTracerProvider {
    fn shutdown_provider(&self, timeout: Duration) -> Result<(), TelemetryError> {
        self.shutdown_with_timeout(timeout).map_err(|e| TelemetryError::Shutdown {
            signal: Signal::Traces,
            reason: e.to_string(),
        })
    }
}

impl ProviderShutdown for SdkMeterProvider {
    fn shutdown_provider(&self, timeout: Duration) -> Result<(), TelemetryError> {
        self.shutdown_with_timeout(timeout).map_err(|e| TelemetryError::Shutdown {
            signal: Signal::Metrics,
            reason: e.to_string(),
        })
    }
}

struct ShutdownHook {
    signal: Signal,
    provider: Arc<dyn ProviderShutdown>,
}

/// The providers installed by [`init`] and their shutdown hooks.
///
/// A hook exists for a signal if and only if its provider was built.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
    hooks: Vec<ShutdownHook>,
}

impl TelemetryGuard {
    /// Guard with nothing registered; shutting it down is a no-op.
    pub fn disabled() -> Self {
        Self {
            tracer_provider: None,
            meter_provider: None,
            hooks: Vec::new(),
        }
    }

    pub fn state(&self) -> TelemetryState {
        match (self.tracer_provider.is_some(), self.meter_provider.is_some()) {
            (false, false) => TelemetryState::Disabled,
            (true, false) => TelemetryState::TracingOnly,
            (false, true) => TelemetryState::MetricsOnly,
            (true, true) => TelemetryState::Both,
        }
    }

    /// Signals with a registered shutdown hook, in shutdown order.
    pub fn signals(&self) -> Vec<Signal> {
        self.hooks.iter().map(|hook| hook.signal).collect()
    }

    pub fn tracer_provider(&self) -> Option<&SdkTracerProvider> {
        self.tracer_provider.as_ref()
    }

    pub fn meter_provider(&self) -> Option<&SdkMeterProvider> {
        self.meter_provider.as_ref()
    }

    fn push_hook(&mut self, signal: Signal, provider: Arc<dyn ProviderShutdown>) {
        self.hooks.push(ShutdownHook { signal, provider });
    }

    /// Shut every registered provider down.
    ///
    /// Each hook runs on its own detached thread with its own `deadline`, so a
    /// hung flush never holds up the runtime or process exit. A failing or
    /// timed-out hook does not stop the remaining ones; the last error seen is
    /// returned.
    pub async fn shutdown(self, deadline: Duration) -> Result<(), TelemetryError> {
        let mut last_error = None;

        for hook in self.hooks {
            let signal = hook.signal;
            let result = run_hook(signal, Arc::clone(&hook.provider), deadline).await;

            match result {
                Ok(()) => debug!(%signal, "telemetry provider shut down"),
                Err(e) => {
                    warn!(%signal, error = %e, "telemetry provider shutdown failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Run one hook on a detached thread and wait at most `deadline` for it.
async fn run_hook(
    signal: Signal,
    provider: Arc<dyn ProviderShutdown>,
    deadline: Duration,
) -> Result<(), TelemetryError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    // 超时后线程被丢弃，不 join
    std::thread::Builder::new()
        .name(format!("{}-shutdown", signal))
        .spawn(move || {
            let _ = tx.send(provider.shutdown_provider(deadline));
        })
        .map_err(|e| TelemetryError::Shutdown {
            signal,
            reason: e.to_string(),
        })?;

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(TelemetryError::Shutdown {
            signal,
            reason: "shutdown thread exited without reporting".to_string(),
        }),
        Err(_) => Err(TelemetryError::ShutdownTimeout {
            signal,
            timeout: deadline,
        }),
    }
}

/// `tracing` layer that turns spans into OTel spans recorded by `provider`.
///
/// Trace context of the span is visible to every event logged inside it.
pub fn tracing_layer<S>(provider: &SdkTracerProvider) -> OpenTelemetryLayer<S, SdkTracer>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
}

/// Set up trace and metric export as configured.
///
/// With both endpoints empty nothing is built and a disabled guard is
/// returned. Otherwise every enabled signal gets an OTLP/HTTP exporter and is
/// installed as the process-wide provider. An exporter that cannot be built
/// aborts initialization.
pub fn init(config: &OtelConfig) -> Result<TelemetryGuard, TelemetryError> {
    let traces = &config.exporter.traces;
    let metrics = &config.exporter.metrics;

    if !traces.is_enabled() && !metrics.is_enabled() {
        debug!("no OTLP endpoint configured, telemetry disabled");
        return Ok(TelemetryGuard::disabled());
    }

    let resource = build_resource();
    let mut guard = TelemetryGuard::disabled();

    if traces.is_enabled() {
        let provider = build_tracer_provider(traces, resource.clone())?;
        global::set_tracer_provider(provider.clone());
        global::set_text_map_propagator(TraceContextPropagator::new());

        guard.push_hook(Signal::Traces, Arc::new(provider.clone()));
        guard.tracer_provider = Some(provider);
        info!(endpoint = %traces.endpoint, "trace exporter installed");
    }

    if metrics.is_enabled() {
        let provider = build_meter_provider(metrics, resource)?;
        global::set_meter_provider(provider.clone());

        guard.push_hook(Signal::Metrics, Arc::new(provider.clone()));
        guard.meter_provider = Some(provider);
        info!(endpoint = %metrics.endpoint, "metric exporter installed");
    }

    Ok(guard)
}

/// Service identity shared by both signals.
pub fn build_resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attributes([KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build()
}

/// Batching tracer provider exporting to `config.endpoint`.
pub fn build_tracer_provider(
    config: &OtlpConfig,
    resource: Resource,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(config.endpoint.trim())
        .with_headers(config.headers.clone())
        .build()
        .map_err(|e| TelemetryError::TraceExporter(e.to_string()))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Meter provider with a periodic reader exporting to `config.endpoint`.
pub fn build_meter_provider(
    config: &OtlpConfig,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = MetricExporter::builder()
        .with_http()
        .with_endpoint(config.endpoint.trim())
        .with_headers(config.headers.clone())
        .build()
        .map_err(|e| TelemetryError::MetricExporter(e.to_string()))?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build())
}
