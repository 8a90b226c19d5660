//! Inbound request envelope and bearer credential extraction.

use crate::errors::FormatError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope type marker for bearer token authorization requests.
pub const TOKEN_ENVELOPE_TYPE: &str = "TOKEN";

const BEARER_PREFIX: &str = "Bearer ";

/// Authorization request as delivered by the invoking transport.
///
/// All fields are optional on the wire so that a malformed envelope surfaces
/// as a [`FormatError`] from [`extract_bearer_token`] rather than as a
/// deserialization failure in the transport.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Must equal [`TOKEN_ENVELOPE_TYPE`].
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Expected to be `Bearer <token>`. Redacted in Debug output.
    #[serde(rename = "authorizationToken", default)]
    pub authorization_token: Option<String>,

    /// Identifier of the protected action, copied verbatim into the policy.
    #[serde(rename = "methodArn", alias = "resource", default)]
    pub resource: String,
}

impl fmt::Debug for RequestEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnvelope")
            .field("kind", &self.kind)
            .field(
                "authorization_token",
                &self.authorization_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("resource", &self.resource)
            .finish()
    }
}

impl RequestEnvelope {
    /// Build a token envelope.
    pub fn bearer(authorization_token: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            kind: Some(TOKEN_ENVELOPE_TYPE.to_string()),
            authorization_token: Some(authorization_token.into()),
            resource: resource.into(),
        }
    }
}

/// Extract the bare token from a request envelope.
///
/// No network or cryptographic work is done here.
///
/// # Errors
///
/// - `FormatError::MissingType` / `UnexpectedType` - envelope is not a token request
/// - `FormatError::MissingAuthorizationToken` - no credential header
/// - `FormatError::BearerMismatch` - header is not `Bearer <token>`. The
///   header value is never included in the error.
pub fn extract_bearer_token(envelope: &RequestEnvelope) -> Result<&str, FormatError> {
    match envelope.kind.as_deref() {
        None => return Err(FormatError::MissingType),
        Some(TOKEN_ENVELOPE_TYPE) => {}
        Some(_) => return Err(FormatError::UnexpectedType),
    }

    let header = envelope
        .authorization_token
        .as_deref()
        .filter(|header| !header.is_empty())
        .ok_or(FormatError::MissingAuthorizationToken)?;

    match header.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.is_empty() && !token.contains(char::is_whitespace) => Ok(token),
        _ => {
            tracing::debug!(
                target: "authorizer.extract",
                header_len = header.len(),
                "Authorization header does not match Bearer scheme"
            );
            Err(FormatError::BearerMismatch)
        }
    }
}
