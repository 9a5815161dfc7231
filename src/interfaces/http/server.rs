//! HTTP Server
//!
//! 持有监听 socket，把请求路由到 webhook 处理器和健康检查。
//!
//! ## 使用示例
//! ```rust,ignore
//! let server = HttpServer::new(addr, WebhookHandler::new());
//! server.run(shutdown_signal()).await?;
//! ```

use super::health::health_handler;
use super::webhook::{receive, WebhookHandler};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Webhook 路径
pub const WEBHOOK_PATH: &str = "/v1/github/webhooks";
/// 健康检查路径
pub const HEALTH_PATH: &str = "/healthz";

/// GitHub caps webhook payloads at 25 MiB.
pub const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

/// 服务器错误
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routes for the webhook and health endpoints.
pub fn router(webhook: Arc<WebhookHandler>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(receive))
        .route(HEALTH_PATH, get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .with_state(webhook)
}

/// Webhook HTTP 服务器
pub struct HttpServer {
    addr: SocketAddr,
    webhook: Arc<WebhookHandler>,
}

impl HttpServer {
    /// 创建新的服务器
    pub fn new(addr: SocketAddr, webhook: WebhookHandler) -> Self {
        Self {
            addr,
            webhook: Arc::new(webhook),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// In-flight requests are drained before this returns.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!("HTTP服务器启动于 {}", local_addr);
        info!("Webhook端点: http://{}{}", local_addr, WEBHOOK_PATH);
        info!("健康检查端点: http://{}{}", local_addr, HEALTH_PATH);

        axum::serve(listener, router(self.webhook))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP服务器已停止");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("收到关闭信号，开始优雅关闭");
}
