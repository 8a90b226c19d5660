//! Authorizer error types.
//!
//! Each pipeline stage has its own error type. They are carried unchanged up
//! to the [`Authenticator`](crate::auth::Authenticator) boundary, which is the
//! single place that turns any of them into the opaque [`Unauthorized`]
//! rejection returned to callers. Detail survives only in logs and metrics.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::JwtValidationError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Malformed request envelope or token structure.
///
/// Always detected before any network access. Messages never include the
/// offending header or token value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Expected envelope type to be present")]
    MissingType,

    #[error("Expected envelope type to have value \"TOKEN\"")]
    UnexpectedType,

    #[error("Expected authorization token to be set")]
    MissingAuthorizationToken,

    #[error("Authorization token does not match \"Bearer <token>\"")]
    BearerMismatch,

    #[error("Token exceeds the maximum allowed size")]
    TokenTooLarge,

    #[error("Token is not a decodable JWT")]
    MalformedToken,
}

impl From<JwtValidationError> for FormatError {
    fn from(err: JwtValidationError) -> Self {
        match err {
            JwtValidationError::TokenTooLarge => FormatError::TokenTooLarge,
            JwtValidationError::MalformedToken => FormatError::MalformedToken,
        }
    }
}

/// No usable verification key could be obtained.
///
/// Variants are split into transient failures (network, timeout, upstream
/// errors, rate limiting) and permanent ones (bad data, unknown key id,
/// missing configuration). Both collapse to the same external rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyResolutionError {
    #[error("Key set request failed: {0}")]
    Network(String),

    #[error("Key set request timed out")]
    Timeout,

    #[error("Key set endpoint returned status {0}")]
    UpstreamStatus(u16),

    #[error("Key set fetch rate limit exceeded")]
    RateLimited,

    #[error("Key set fetch task did not complete")]
    FetchAborted,

    #[error("Key set document is malformed: {0}")]
    MalformedKeySet(String),

    #[error("Key id not present in key set")]
    UnknownKeyId,

    #[error("Key is not usable for signature verification: {0}")]
    UnsupportedKey(String),

    #[error("Token carries a key id but no key set URI is configured")]
    NoKeySetUri,

    #[error("Token carries no key id and no static key is configured")]
    NoStaticKey,
}

impl KeyResolutionError {
    /// Whether the failure may succeed if attempted again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KeyResolutionError::Network(_)
                | KeyResolutionError::Timeout
                | KeyResolutionError::UpstreamStatus(_)
                | KeyResolutionError::RateLimited
                | KeyResolutionError::FetchAborted
        )
    }

    /// Whether a single retry at the fetch boundary is allowed.
    ///
    /// Client errors (4xx) and rate limiting are not retried.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            KeyResolutionError::Network(_) | KeyResolutionError::Timeout => true,
            KeyResolutionError::UpstreamStatus(status) => *status >= 500,
            _ => false,
        }
    }

    /// Bounded label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            KeyResolutionError::Network(_) => "network",
            KeyResolutionError::Timeout => "timeout",
            KeyResolutionError::UpstreamStatus(_) => "upstream_status",
            KeyResolutionError::RateLimited => "rate_limited",
            KeyResolutionError::FetchAborted => "aborted",
            KeyResolutionError::MalformedKeySet(_) => "malformed_key_set",
            KeyResolutionError::UnknownKeyId => "unknown_kid",
            KeyResolutionError::UnsupportedKey(_) => "unsupported_key",
            KeyResolutionError::NoKeySetUri => "no_key_set_uri",
            KeyResolutionError::NoStaticKey => "no_static_key",
        }
    }
}

/// Signature or claim verification failed.
///
/// Deliberately carries no detail: a bad signature, a wrong audience and an
/// expired token are indistinguishable to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("The access token is invalid or expired")]
pub struct InvalidTokenError;

/// Any failure of the authorization pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Key resolution error: {0}")]
    KeyResolution(#[from] KeyResolutionError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] InvalidTokenError),
}

impl AuthError {
    /// Internal classification of the failure.
    pub fn reason(&self) -> RejectionReason {
        match self {
            AuthError::Format(_) => RejectionReason::Format,
            AuthError::KeyResolution(_) => RejectionReason::KeyResolution,
            AuthError::InvalidToken(_) => RejectionReason::InvalidToken,
        }
    }

    /// Collapse into the external rejection, discarding all detail.
    pub fn into_rejection(self) -> Unauthorized {
        Unauthorized
    }
}

/// Why a request was rejected. Internal only; never sent to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    Format,
    KeyResolution,
    InvalidToken,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Format => "format",
            RejectionReason::KeyResolution => "key_resolution",
            RejectionReason::InvalidToken => "invalid_token",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single opaque rejection signal surfaced to the invoking transport.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Unauthorized")]
pub struct Unauthorized;

/// Wire body for a rejection.
#[derive(Debug, Serialize)]
pub struct UnauthorizedBody {
    pub message: &'static str,
}

impl From<Unauthorized> for UnauthorizedBody {
    fn from(_: Unauthorized) -> Self {
        UnauthorizedBody {
            message: "Unauthorized",
        }
    }
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(UnauthorizedBody::from(self))).into_response()
    }
}
