//! Webhook payload signatures.
//!
//! The forge signs every delivery with an HMAC of the raw body, keyed by the
//! shared webhook secret, and sends it as `sha256=<hex>` (or the legacy
//! `sha1=<hex>`). Comparison is constant-time.

use ring::hmac;

use crate::error::SignatureError;

/// Header carrying the HMAC-SHA256 signature.
pub const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";
/// Legacy header carrying the HMAC-SHA1 signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Verify `body` against whichever signature header is present. The SHA-256
/// header is preferred when both are sent.
pub fn verify_signature(
    secret: &[u8],
    sha256_header: Option<&str>,
    sha1_header: Option<&str>,
    body: &[u8],
) -> Result<(), SignatureError> {
    let header = sha256_header
        .or(sha1_header)
        .ok_or(SignatureError::Missing)?;
    let (algorithm, digest) = header.split_once('=').ok_or(SignatureError::Malformed)?;
    let algorithm = match algorithm {
        "sha256" => hmac::HMAC_SHA256,
        "sha1" => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        other => return Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
    };
    let tag = hex::decode(digest.trim()).map_err(|_| SignatureError::Malformed)?;
    let key = hmac::Key::new(algorithm, secret);
    hmac::verify(&key, body, &tag).map_err(|_| SignatureError::Mismatch)
}

/// The `sha256=<hex>` header value for `body`.
pub fn sign_sha256(secret: &[u8], body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    format!("sha256={}", hex::encode(hmac::sign(&key, body).as_ref()))
}
