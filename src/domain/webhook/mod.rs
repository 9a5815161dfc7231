/// Domain Layer - Webhook Module
///
/// Everything that can be said about a GitHub delivery without touching
/// HTTP or telemetry:
/// - `signature`: HMAC-SHA256 verification of the raw body
/// - `event`: decoding a verified body into a typed [`WebhookEvent`]

pub mod event;
pub mod signature;

pub use event::{DecodeError, EventPayload, WebhookEvent};
pub use signature::{verify_signature, SignatureError};
