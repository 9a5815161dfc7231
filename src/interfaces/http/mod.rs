/// HTTP Interface
///
/// 提供 webhook 接收和健康检查端点
///
/// ## 端点
/// - `POST /v1/github/webhooks` - GitHub webhook 入口
/// - `GET /healthz` - 健康检查

pub mod health;
pub mod server;
pub mod webhook;

pub use server::{router, HttpServer, ServerError, HEALTH_PATH, WEBHOOK_PATH};
pub use webhook::{WebhookError, WebhookHandler};
