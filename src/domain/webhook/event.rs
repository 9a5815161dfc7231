//! Webhook Event Model
//!
//! A verified delivery is decoded into a [`WebhookEvent`]: the envelope every
//! GitHub event carries (type, delivery id, repository, sender) plus an
//! [`EventPayload`] for the handful of event types we annotate specially.
//!
//! ## Decoding rules
//! - The body must be a JSON object, otherwise decoding fails
//! - `repository` / `sender` and every field inside them may be absent
//! - Event types without a dedicated variant decode into [`EventPayload::Other`]
//! - Form-encoded deliveries carry the JSON in the `payload` field

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;

/// Content type GitHub uses for form-encoded deliveries.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Default content type for deliveries.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// 事件解码错误
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("missing event type header")]
    MissingEventType,

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("form-encoded delivery has no `payload` field")]
    MissingFormPayload,

    #[error("{event_type} payload is not a JSON object")]
    NotAnObject { event_type: String },

    #[error("invalid {event_type} payload: {source}")]
    InvalidPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Value of `X-GitHub-Event`
    pub event_type: String,
    /// Value of `X-GitHub-Delivery`
    pub delivery_id: String,
    /// `repository.full_name`, when the payload has a repository
    pub repository: Option<String>,
    /// `sender.login`, when the payload has a sender
    pub sender: Option<String>,
    pub payload: EventPayload,
}

/// Event-specific data for the event types that get dedicated span attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// `push`
    Push { git_ref: String },
    /// `pull_request`
    PullRequest { number: i64 },
    /// `workflow_job`
    WorkflowJob { name: String, id: i64 },
    /// Anything else, including event types GitHub adds in the future
    Other,
}

impl EventPayload {
    /// Short name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Push { .. } => "push",
            EventPayload::PullRequest { .. } => "pull_request",
            EventPayload::WorkflowJob { .. } => "workflow_job",
            EventPayload::Other => "other",
        }
    }
}

// 以下结构体只用于反序列化，字段全部可选

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    repository: Option<RepositoryRef>,
    #[serde(default)]
    sender: Option<UserRef>,
}

#[derive(Deserialize)]
struct RepositoryRef {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct UserRef {
    #[serde(default)]
    login: Option<String>,
}

#[derive(Deserialize)]
struct PushBody {
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Deserialize)]
struct PullRequestBody {
    #[serde(default)]
    number: Option<i64>,
}

#[derive(Deserialize)]
struct WorkflowJobBody {
    #[serde(default)]
    workflow_job: Option<WorkflowJob>,
}

#[derive(Deserialize)]
struct WorkflowJob {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
}

impl WebhookEvent {
    /// Decode a verified delivery body.
    ///
    /// `content_type` is the raw `Content-Type` header; `None` means JSON.
    pub fn decode(
        event_type: &str,
        delivery_id: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Self, DecodeError> {
        if event_type.trim().is_empty() {
            return Err(DecodeError::MissingEventType);
        }

        let json = extract_json(content_type, body)?;
        let invalid = |source: serde_json::Error| DecodeError::InvalidPayload {
            event_type: event_type.to_string(),
            source,
        };

        let value: Value = serde_json::from_slice(&json).map_err(invalid)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject {
                event_type: event_type.to_string(),
            });
        }
        let envelope = Envelope::deserialize(&value).map_err(invalid)?;

        let payload = match event_type {
            "push" => {
                let body = PushBody::deserialize(&value).map_err(invalid)?;
                EventPayload::Push {
                    git_ref: body.git_ref.unwrap_or_default(),
                }
            }
            "pull_request" => {
                let body = PullRequestBody::deserialize(&value).map_err(invalid)?;
                EventPayload::PullRequest {
                    number: body.number.unwrap_or_default(),
                }
            }
            "workflow_job" => {
                let job = WorkflowJobBody::deserialize(&value)
                    .map_err(invalid)?
                    .workflow_job;
                let (id, name) = job.map(|j| (j.id, j.name)).unwrap_or_default();
                EventPayload::WorkflowJob {
                    name: name.unwrap_or_default(),
                    id: id.unwrap_or_default(),
                }
            }
            _ => EventPayload::Other,
        };

        Ok(Self {
            event_type: event_type.to_string(),
            delivery_id: delivery_id.to_string(),
            repository: envelope
                .repository
                .map(|r| r.full_name.unwrap_or_default()),
            sender: envelope.sender.map(|s| s.login.unwrap_or_default()),
            payload,
        })
    }
}

/// Pull the JSON document out of the body according to its content type.
fn extract_json<'a>(
    content_type: Option<&str>,
    body: &'a [u8],
) -> Result<Cow<'a, [u8]>, DecodeError> {
    // 忽略 `; charset=utf-8` 之类的参数
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match media_type.as_str() {
        "" | JSON_CONTENT_TYPE => Ok(Cow::Borrowed(body)),
        FORM_CONTENT_TYPE => url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| Cow::Owned(value.into_owned().into_bytes()))
            .ok_or(DecodeError::MissingFormPayload),
        other => Err(DecodeError::UnsupportedContentType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(event_type: &str, body: &str) -> Result<WebhookEvent, DecodeError> {
        WebhookEvent::decode(event_type, "delivery-1", Some("application/json"), body.as_bytes())
    }

    #[test]
    fn test_push_without_fields() {
        let event = decode("push", r#"{"foo":"bar"}"#).unwrap();
        assert_eq!(event.event_type, "push");
        assert_eq!(event.delivery_id, "delivery-1");
        assert_eq!(event.repository, None);
        assert_eq!(event.sender, None);
        assert_eq!(event.payload, EventPayload::Push { git_ref: String::new() });
    }

    #[test]
    fn test_push_with_envelope() {
        let body = r#"{
            "ref": "refs/heads/main",
            "repository": {"full_name": "octo/hello"},
            "sender": {"login": "octocat"}
        }"#;
        let event = decode("push", body).unwrap();
        assert_eq!(event.repository.as_deref(), Some("octo/hello"));
        assert_eq!(event.sender.as_deref(), Some("octocat"));
        assert_eq!(
            event.payload,
            EventPayload::Push { git_ref: "refs/heads/main".to_string() }
        );
    }

    #[test]
    fn test_pull_request() {
        let event = decode("pull_request", r#"{"action":"opened","number":42}"#).unwrap();
        assert_eq!(event.payload, EventPayload::PullRequest { number: 42 });
        assert_eq!(event.payload.kind(), "pull_request");
    }

    #[test]
    fn test_workflow_job() {
        let body = r#"{"workflow_job":{"id":9001,"name":"build"},"sender":{}}"#;
        let event = decode("workflow_job", body).unwrap();
        assert_eq!(
            event.payload,
            EventPayload::WorkflowJob { name: "build".to_string(), id: 9001 }
        );
        // sender 存在但没有 login
        assert_eq!(event.sender.as_deref(), Some(""));

        let event = decode("workflow_job", "{}").unwrap();
        assert_eq!(
            event.payload,
            EventPayload::WorkflowJob { name: String::new(), id: 0 }
        );
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let event = decode("merge_group", r#"{"repository":{"full_name":"a/b"}}"#).unwrap();
        assert_eq!(event.payload, EventPayload::Other);
        assert_eq!(event.repository.as_deref(), Some("a/b"));

        let event = decode("ping", r#"{"zen":"Keep it logically awesome."}"#).unwrap();
        assert_eq!(event.payload.kind(), "other");
    }

    #[test]
    fn test_null_envelope_fields() {
        let event = decode("push", r#"{"repository":null,"sender":null}"#).unwrap();
        assert_eq!(event.repository, None);
        assert_eq!(event.sender, None);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            decode("push", r#"{"foo":"#),
            Err(DecodeError::InvalidPayload { .. })
        ));
        // 合法 JSON 但不是对象
        assert!(matches!(decode("push", "[]"), Err(DecodeError::NotAnObject { .. })));
        assert!(matches!(decode("ping", "null"), Err(DecodeError::NotAnObject { .. })));
    }

    #[test]
    fn test_wrong_field_type() {
        assert!(matches!(
            decode("pull_request", r#"{"number":"forty-two"}"#),
            Err(DecodeError::InvalidPayload { .. })
        ));
        assert!(matches!(
            decode("push", r#"{"ref":5}"#),
            Err(DecodeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_missing_event_type() {
        assert!(matches!(decode("", "{}"), Err(DecodeError::MissingEventType)));
    }

    #[test]
    fn test_content_types() {
        let body = br#"{"ref":"refs/tags/v1"}"#;

        let event = WebhookEvent::decode("push", "d", None, body).unwrap();
        assert_eq!(event.payload, EventPayload::Push { git_ref: "refs/tags/v1".to_string() });

        let event =
            WebhookEvent::decode("push", "d", Some("application/json; charset=utf-8"), body).unwrap();
        assert_eq!(event.payload.kind(), "push");

        let err = WebhookEvent::decode("push", "d", Some("text/plain"), body).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedContentType(ref ct) if ct == "text/plain"));
    }

    #[test]
    fn test_json_body_is_borrowed() {
        let body = br#"{"number":1}"#;
        assert!(matches!(extract_json(None, body), Ok(Cow::Borrowed(b)) if b == body));
        assert!(matches!(
            extract_json(Some(FORM_CONTENT_TYPE), b"payload=%7B%7D"),
            Ok(Cow::Owned(ref b)) if b == b"{}"
        ));
    }

    #[test]
    fn test_form_encoded_payload() {
        let form = b"payload=%7B%22number%22%3A7%7D";
        let event =
            WebhookEvent::decode("pull_request", "d", Some(FORM_CONTENT_TYPE), form).unwrap();
        assert_eq!(event.payload, EventPayload::PullRequest { number: 7 });

        let err = WebhookEvent::decode("pull_request", "d", Some(FORM_CONTENT_TYPE), b"other=1")
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingFormPayload));
    }
}
