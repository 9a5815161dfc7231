/// Infrastructure Layer - Technical Implementations
///
/// Everything that talks to the outside world on behalf of the service:
/// config files, the environment and the OTLP collector.
///
/// ## Modules
/// - `config`: layered configuration (defaults, YAML file, environment)
/// - `telemetry`: OTLP exporters and their shutdown

pub mod config;
pub mod telemetry;

// Re-export key types
pub use config::{Config, ConfigError, OtelConfig, OtlpConfig};
pub use telemetry::{TelemetryError, TelemetryGuard, TelemetryState};
