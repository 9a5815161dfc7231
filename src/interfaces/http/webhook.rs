//! GitHub Webhook Handler
//!
//! `POST /v1/github/webhooks`
//!
//! 每个请求的处理顺序：
//! 1. 从请求头提取 trace context，创建 server span
//! 2. 校验 `X-Hub-Signature-256`，失败返回 401
//! 3. 按 `X-GitHub-Event` 解码事件，失败返回 400
//! 4. 把仓库、发送者和事件特有的字段写入 span
//! 5. 记录一条带 trace id 的日志，返回 200
//!
//! The span is a `tracing` span exported through `tracing-opentelemetry`, so
//! every log line written while handling the delivery carries its trace
//! context. It is closed exactly once on every path.

use crate::domain::webhook::{verify_signature, DecodeError, EventPayload, SignatureError, WebhookEvent};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, MeterProvider as _};
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{error, field, info, info_span, warn, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Instrumentation scope of the handler's meter.
pub const INSTRUMENTATION_NAME: &str = "workctl/interfaces/http/webhook";

/// Environment variable holding the shared webhook secret.
pub const SECRET_ENV: &str = "GITHUB_WEBHOOK_SECRET";

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Name of the per-request span.
pub const SPAN_NAME: &str = "github.process_webhook";

/// 请求级错误
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("failed to validate webhook signature: {0}")]
    Unauthorized(#[from] SignatureError),

    #[error("failed to parse webhook payload: {0}")]
    BadRequest(#[from] DecodeError),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WebhookError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Value of the `outcome` metric attribute.
    fn outcome(&self) -> &'static str {
        match self {
            WebhookError::Unauthorized(_) => "unauthorized",
            WebhookError::BadRequest(_) => "bad_request",
        }
    }

    /// Span status description.
    fn summary(&self) -> &'static str {
        match self {
            WebhookError::Unauthorized(_) => "failed to validate webhook signature",
            WebhookError::BadRequest(_) => "failed to parse webhook payload",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = match self {
            WebhookError::Unauthorized(_) => "Unauthorized",
            WebhookError::BadRequest(_) => "Bad Request",
        };
        (self.status_code(), body).into_response()
    }
}

/// Reads trace context out of request headers.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Authenticates, classifies and traces GitHub deliveries.
///
/// Holds no per-request state; share it behind an `Arc`. Spans go to
/// whatever OpenTelemetry layer the active `tracing` subscriber carries.
pub struct WebhookHandler {
    secret: SecretString,
    deliveries: Counter<u64>,
}

impl WebhookHandler {
    /// Handler using the secret from [`SECRET_ENV`] and the global meter provider.
    pub fn new() -> Self {
        let secret = std::env::var(SECRET_ENV).unwrap_or_default();
        if secret.is_empty() {
            warn!("{} is not set, every delivery will be rejected", SECRET_ENV);
        }
        Self::with_secret(secret)
    }

    /// Handler with an explicit secret and the global meter provider.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            deliveries: delivery_counter(&global::meter(INSTRUMENTATION_NAME)),
        }
    }

    /// Record metrics through `provider` instead of the global meter provider.
    pub fn with_meter_provider(mut self, provider: &SdkMeterProvider) -> Self {
        self.deliveries = delivery_counter(&provider.meter(INSTRUMENTATION_NAME));
        self
    }

    /// Process one delivery.
    pub fn handle(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, WebhookError> {
        let parent_cx =
            global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)));

        let event_type = header_str(headers, EVENT_HEADER);
        let delivery_id = header_str(headers, DELIVERY_HEADER);

        let span = info_span!(
            SPAN_NAME,
            otel.kind = "server",
            otel.status_code = field::Empty,
            otel.status_message = field::Empty,
            github.event_type = event_type,
            github.delivery_id = delivery_id,
            trace_id = field::Empty,
            span_id = field::Empty
        );
        let _ = span.set_parent(parent_cx);
        record_trace_ids(&span);

        let result = span.in_scope(|| self.process(&span, headers, event_type, delivery_id, body));

        let outcome = match &result {
            Ok(_) => {
                span.record("otel.status_code", "OK");
                "accepted"
            }
            Err(e) => {
                span.record("otel.status_code", "ERROR");
                span.record("otel.status_message", e.summary());
                e.outcome()
            }
        };
        self.deliveries.add(
            1,
            &[
                KeyValue::new("github.event_type", event_type.to_string()),
                KeyValue::new("outcome", outcome),
            ],
        );

        result
    }

    fn process(
        &self,
        span: &Span,
        headers: &HeaderMap,
        event_type: &str,
        delivery_id: &str,
        body: &[u8],
    ) -> Result<WebhookEvent, WebhookError> {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(body, self.secret.expose_secret().as_bytes(), signature) {
            error!(error = %e, "failed to validate webhook signature");
            return Err(e.into());
        }

        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let event = match WebhookEvent::decode(event_type, delivery_id, content_type, body) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "failed to parse webhook payload");
                return Err(e.into());
            }
        };

        annotate_span(span, &event);
        info!(event_type, delivery_id, kind = event.payload.kind(), "webhook received");

        Ok(event)
    }
}

impl Default for WebhookHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy the OTel trace and span ids into the span's log fields.
///
/// Left empty when no OpenTelemetry layer is installed.
fn record_trace_ids(span: &Span) {
    let cx = span.context();
    let otel_span = cx.span();
    let span_cx = otel_span.span_context();
    if span_cx.is_valid() {
        span.record("trace_id", field::display(span_cx.trace_id()));
        span.record("span_id", field::display(span_cx.span_id()));
    }
}

/// Attach envelope and event-specific attributes.
pub fn annotate_span(span: &Span, event: &WebhookEvent) {
    if let Some(repository) = &event.repository {
        span.set_attribute("github.repository", repository.clone());
    }
    if let Some(sender) = &event.sender {
        span.set_attribute("github.sender", sender.clone());
    }

    match &event.payload {
        EventPayload::Push { git_ref } => {
            span.set_attribute("github.ref", git_ref.clone());
        }
        EventPayload::PullRequest { number } => {
            span.set_attribute("github.pr.number", *number);
        }
        EventPayload::WorkflowJob { name, id } => {
            span.set_attribute("github.workflow_job.name", name.clone());
            span.set_attribute("github.workflow_job.id", *id);
        }
        EventPayload::Other => {}
    }
}

fn delivery_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("github.webhook.deliveries")
        .with_description("GitHub webhook deliveries by event type and outcome")
        .build()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// axum 入口
pub async fn receive(
    State(handler): State<Arc<WebhookHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    handler.handle(&headers, &body).map(|_| StatusCode::OK)
}
