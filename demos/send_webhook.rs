/// Webhook 客户端示例
///
/// 对一个 JSON 负载签名并投递到正在运行的 workctl 服务器。
///
/// ```text
/// GITHUB_WEBHOOK_SECRET=my-secret cargo run --example send_webhook -- push '{"ref":"refs/heads/main"}'
/// ```

use std::time::{SystemTime, UNIX_EPOCH};
use workctl::domain::webhook::signature::sign;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server_addr = std::env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let secret = std::env::var("GITHUB_WEBHOOK_SECRET").unwrap_or_else(|_| "my-secret".to_string());

    let mut args = std::env::args().skip(1);
    let event_type = args.next().unwrap_or_else(|| "ping".to_string());
    let body = args
        .next()
        .unwrap_or_else(|| r#"{"zen":"Keep it logically awesome."}"#.to_string());

    let signature = sign(secret.as_bytes(), body.as_bytes())?;
    let delivery_id = format!("demo-{}", SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis());

    let url = format!("http://{}/v1/github/webhooks", server_addr);
    println!("投递到: {}", url);

    let response = reqwest::Client::new()
        .post(&url)
        .header("content-type", "application/json")
        .header("x-github-event", &event_type)
        .header("x-github-delivery", &delivery_id)
        .header("x-hub-signature-256", signature)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    println!("{} {} -> {} {}", event_type, delivery_id, status, text);
    Ok(())
}
