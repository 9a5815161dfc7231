//! Webhook Signature Verification
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw request body,
//! keyed by the webhook secret, and sends the result in `X-Hub-Signature-256`
//! as `sha256=<hex digest>`.
//!
//! The comparison is delegated to [`hmac::Mac::verify_slice`], which is
//! constant-time. Every failure mode (missing header, malformed header,
//! mismatch, unconfigured secret) is reported as a [`SignatureError`] and the
//! caller treats them all the same way.
//!
//! ## Usage
//! ```rust
//! use workctl::domain::webhook::signature::{sign, verify_signature};
//!
//! let header = sign(b"my-secret", br#"{"foo":"bar"}"#).unwrap();
//! assert!(verify_signature(br#"{"foo":"bar"}"#, b"my-secret", Some(&header)).is_ok());
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix GitHub puts in front of the hex digest.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// 签名校验错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("payload signature check failed")]
    Mismatch,

    #[error("webhook secret is not configured")]
    EmptySecret,
}

/// Verify `header` (the raw `X-Hub-Signature-256` value) against `payload`.
///
/// An empty secret never verifies: unsigned deliveries are not accepted just
/// because the operator forgot to configure one.
pub fn verify_signature(
    payload: &[u8],
    secret: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty());
    let header = header.ok_or(SignatureError::Missing)?;

    let hex_digest = header.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
        SignatureError::Malformed(format!("expected `{}` prefix", SIGNATURE_PREFIX))
    })?;
    let expected = hex::decode(hex_digest)
        .map_err(|e| SignatureError::Malformed(format!("invalid hex digest: {}", e)))?;

    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }

    let mut mac = keyed_mac(secret)?;
    mac.update(payload);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Compute the `X-Hub-Signature-256` header value for `payload`.
///
/// Used by tests and the demo client; the server only ever verifies.
pub fn sign(secret: &[u8], payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = keyed_mac(secret)?;
    mac.update(payload);
    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes())))
}

fn keyed_mac(secret: &[u8]) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(secret)
        .map_err(|_| SignatureError::Malformed("unusable HMAC key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"my-secret";
    const BODY: &[u8] = br#"{"foo":"bar"}"#;

    #[test]
    fn test_valid_signature() {
        let header = sign(SECRET, BODY).unwrap();
        assert!(header.starts_with("sha256="));
        assert_eq!(header.len(), "sha256=".len() + 64);
        assert_eq!(verify_signature(BODY, SECRET, Some(&header)), Ok(()));
    }

    #[test]
    fn test_missing_signature() {
        assert_eq!(verify_signature(BODY, SECRET, None), Err(SignatureError::Missing));
        assert_eq!(verify_signature(BODY, SECRET, Some("  ")), Err(SignatureError::Missing));
    }

    #[test]
    fn test_malformed_signature() {
        // 非十六进制
        assert!(matches!(
            verify_signature(BODY, SECRET, Some("sha256=invalid")),
            Err(SignatureError::Malformed(_))
        ));

        // 缺少前缀
        let header = sign(SECRET, BODY).unwrap();
        let bare = header.trim_start_matches("sha256=");
        assert!(matches!(
            verify_signature(BODY, SECRET, Some(bare)),
            Err(SignatureError::Malformed(_))
        ));

        // sha1 签名不被接受
        assert!(matches!(
            verify_signature(BODY, SECRET, Some("sha1=0123abcd")),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_mismatch() {
        let header = sign(b"other-secret", BODY).unwrap();
        assert_eq!(verify_signature(BODY, SECRET, Some(&header)), Err(SignatureError::Mismatch));

        let header = sign(SECRET, BODY).unwrap();
        assert_eq!(
            verify_signature(br#"{"foo":"baz"}"#, SECRET, Some(&header)),
            Err(SignatureError::Mismatch)
        );

        // 截断的摘要
        let truncated = &header[..header.len() - 2];
        assert_eq!(
            verify_signature(BODY, SECRET, Some(truncated)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_empty_secret_fails_closed() {
        // 即使签名是用空密钥算出来的，也必须拒绝
        let header = sign(b"", BODY).unwrap();
        assert_eq!(verify_signature(BODY, b"", Some(&header)), Err(SignatureError::EmptySecret));
        assert_eq!(verify_signature(BODY, b"", None), Err(SignatureError::Missing));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let header = format!(" {} ", sign(SECRET, BODY).unwrap());
        assert_eq!(verify_signature(BODY, SECRET, Some(&header)), Ok(()));
    }
}
