//! JWT utilities shared across the authorizer crates.
//!
//! This module provides the low-level pieces of JWT handling that do not
//! depend on any trust configuration:
//! - Size limits for DoS prevention
//! - Clock skew constants for `exp`/`nbf` leeway
//! - Untrusted decoding of the header and payload segments
//! - Public key decoding helpers for JWKs and PEM text
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing decoded here is authenticated. Callers may use the output for
//!   routing and key lookup only; the token MUST still be verified.
//! - Error messages are generic and never echo token content

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// JSON parsing.
///
/// - Typical JWTs are 200-1200 bytes (header + claims + RSA signature)
/// - 8KB leaves room for large scope claims while bounding allocation
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance applied to `exp` and `nbf`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens usable for an
/// unreasonable amount of time.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while decoding a JWT without verification.
///
/// Note: Error messages are intentionally generic. Detailed information is
/// logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the header and payload of a JWT WITHOUT verifying the signature.
///
/// Both segments are base64url-decoded and deserialized into the caller's
/// types. The signature segment must be present but is not inspected.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - The returned values are attacker-controlled. They are fit for choosing
///   which key or trust configuration to verify with, never for granting
///   access.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three segments, bad base64url, or JSON that does
///   not match the requested types
pub fn decode_unverified<H, P>(token: &str) -> Result<(H, P), JwtValidationError>
where
    H: DeserializeOwned,
    P: DeserializeOwned,
{
    let (header_part, payload_part) = split_segments(token)?;
    let header = decode_segment(header_part, "header")?;
    let payload = decode_segment(payload_part, "payload")?;
    Ok((header, payload))
}

/// Split a compact JWT into its header and payload segments.
fn split_segments(token: &str) -> Result<(&str, &str), JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(_signature), None)
            if !header.is_empty() && !payload.is_empty() =>
        {
            Ok((header, payload))
        }
        _ => {
            tracing::debug!(
                target: "common.jwt",
                parts = token.split('.').count(),
                "Token rejected: invalid JWT format"
            );
            Err(JwtValidationError::MalformedToken)
        }
    }
}

fn decode_segment<T: DeserializeOwned>(
    segment: &str,
    name: &'static str,
) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })
}

/// Replace escaped line breaks (`\n` as two characters) with real ones.
///
/// PEM keys supplied through environment variables or secret stores are
/// commonly flattened onto a single line with literal `\n` sequences.
#[must_use]
pub fn normalize_pem_newlines(pem: &str) -> String {
    pem.replace("\\n", "\n")
}

/// Decode an Ed25519 public key from JWK `x` field (base64url format).
///
/// The `x` field in an OKP (Octet Key Pair) JWK contains the public key
/// in base64url encoding without padding.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the base64url content cannot be decoded.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
