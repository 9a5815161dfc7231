//! Health Check Endpoint
//!
//! `GET /healthz` 始终返回 `200 OK`，与 webhook 处理和遥测状态无关，
//! 用于负载均衡器和存活探针。

use axum::http::StatusCode;

/// 健康检查端点
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler() {
        let (status, body) = health_handler().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
