/// Domain Layer - Webhook Semantics
///
/// Pure logic with no I/O: signature checks and event classification.
/// The HTTP handler in `interfaces::http` drives it, and it can be tested
/// without a server or a tracer.
///
/// ## Modules
/// - `webhook`: signature verification and the typed event model

pub mod webhook;

// Re-export key types
pub use webhook::{EventPayload, WebhookEvent};
