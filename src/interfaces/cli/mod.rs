/// CLI Interface Module
///
/// Entry point of the `workctl` binary.
///
/// ## Responsibilities
/// - Parse command-line arguments
/// - Initialize logging, configuration and telemetry
/// - Run the webhook server until Ctrl-C / SIGTERM
/// - Shut telemetry down before exiting
///
/// Startup logs go to a temporary subscriber; the process-wide one is
/// installed once the tracer provider is known, so it can carry the
/// OpenTelemetry layer.

use crate::infrastructure::config::{Config, ConfigError};
use crate::infrastructure::telemetry::{self, TelemetryError, TelemetryGuard};
use crate::interfaces::http::server::{shutdown_signal, HttpServer, ServerError};
use crate::interfaces::http::WebhookHandler;
use clap::{Args, Parser, Subcommand};
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Time each telemetry provider gets to flush on exit.
pub const TELEMETRY_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// workctl 命令行
#[derive(Parser, Debug, Clone)]
#[command(name = "workctl")]
#[command(version)]
#[command(about = "GitHub webhook 接收服务", long_about = None)]
pub struct Cli {
    /// 日志级别（RUST_LOG 优先）
    #[arg(short = 'l', long, global = true, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 启动 webhook 服务器
    Serve(ServeArgs),
    /// 打印版本号
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// 服务器监听地址
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// 服务器监听端口
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// 启动阶段的致命错误
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Runs the CLI application
///
/// Parses command-line arguments and maps the outcome to the exit code.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "workctl failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run one parsed command.
///
/// Telemetry shutdown errors are reported but never turn a successful
/// command into a failure.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let args = match cli.command {
        Command::Version => {
            println!("{}", version_string());
            return Ok(());
        }
        Command::Serve(args) => args,
    };

    let startup = || -> Result<TelemetryGuard, AppError> {
        let config = Config::load()?;
        Ok(telemetry::init(&config.otel)?)
    };
    let guard = tracing::subscriber::with_default(bootstrap_subscriber(&cli.log_level), startup)?;

    init_logging(&cli.log_level, guard.tracer_provider());
    tracing::info!(state = ?guard.state(), "telemetry initialized");

    let result = serve(&args).await;

    if let Err(e) = guard.shutdown(TELEMETRY_SHUTDOWN_DEADLINE).await {
        tracing::error!(error = %e, "error shutting down telemetry");
        eprintln!("Error shutting down telemetry: {}", e);
    }

    result
}

async fn serve(args: &ServeArgs) -> Result<(), AppError> {
    let server = HttpServer::new(args.addr(), WebhookHandler::new());
    tracing::info!("workctl {} 启动，监听 {}", env!("CARGO_PKG_VERSION"), server.addr());
    server.run(shutdown_signal()).await?;
    Ok(())
}

/// `workctl v<version>`
pub fn version_string() -> String {
    format!("workctl v{}", env!("CARGO_PKG_VERSION"))
}

/// RUST_LOG 优先，否则使用 `--log-level`
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// 启动阶段（加载配置、初始化遥测）使用的 subscriber
fn bootstrap_subscriber(level: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .finish()
}

/// 初始化日志系统
///
/// With a tracer provider, spans are also exported over OTLP and every log
/// line inside a span shares its trace context.
fn init_logging(level: &str, tracer_provider: Option<&SdkTracerProvider>) {
    let otel_layer = tracer_provider.map(|provider| telemetry::tracing_layer(provider));

    // 已初始化时忽略
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(otel_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        // PORT 未设置时的默认配置
        if std::env::var_os("PORT").is_some() {
            return;
        }
        let cli = Cli::parse_from(["workctl", "serve"]);
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.host.to_string(), "0.0.0.0");
                assert_eq!(args.port, 8080);
                assert_eq!(args.addr().to_string(), "0.0.0.0:8080");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_serve_custom() {
        let cli = Cli::parse_from([
            "workctl",
            "--log-level", "debug",
            "serve",
            "--host", "127.0.0.1",
            "--port", "9000",
        ]);

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.host.to_string(), "127.0.0.1");
                assert_eq!(args.port, 9000);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_short_flags() {
        // 全局参数可以出现在子命令之后
        let cli = Cli::parse_from(["workctl", "serve", "-H", "192.168.1.1", "-p", "7000", "-l", "warn"]);

        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.host.to_string(), "192.168.1.1");
                assert_eq!(args.port, 7000);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(Cli::try_parse_from(["workctl"]).is_err());
        assert!(Cli::try_parse_from(["workctl", "-l", "loud", "version"]).is_err());
        assert!(Cli::try_parse_from(["workctl", "serve", "--port", "70000"]).is_err());
        assert!(Cli::try_parse_from(["workctl", "serve", "--host", "localhost"]).is_err());
    }

    #[test]
    fn test_version() {
        let cli = Cli::parse_from(["workctl", "version"]);
        assert!(matches!(cli.command, Command::Version));
        assert_eq!(version_string(), format!("workctl v{}", env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn test_execute_version() {
        let cli = Cli::parse_from(["workctl", "version"]);
        assert!(execute(cli).await.is_ok());
    }
}
