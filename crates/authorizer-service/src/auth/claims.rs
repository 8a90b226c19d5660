//! JWT claims structures.
//!
//! Two views of a token live here:
//!
//! - [`UnverifiedClaims`] - header and payload read WITHOUT checking the
//!   signature. Used only to pick a trust configuration and a key.
//! - [`Claims`] - the payload returned by the verifier after the signature,
//!   issuer, audience and validity window have been checked.
//!
//! The `sub` field of [`Claims`] is redacted in Debug output.

use crate::errors::FormatError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The `aud` claim, which may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Check whether `audience` is one of the token's audiences.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Token header fields read without verification.
#[derive(Debug, Clone, Deserialize)]
pub struct UnverifiedHeader {
    /// Declared signing algorithm.
    pub alg: String,

    /// Key ID selecting a key from the tenant's key set.
    #[serde(default, deserialize_with = "lenient_string")]
    pub kid: Option<String>,
}

/// Token payload fields read without verification.
///
/// Only the routing input is read. Every other claim is left to the verifier,
/// so an unusual claim type cannot turn a decodable token into a format error.
#[derive(Debug, Clone, Deserialize)]
pub struct UnverifiedPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub iss: Option<String>,
}

/// Read a string field, treating any other JSON type as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Some(value),
        _ => None,
    })
}

/// Header and payload of a token decoded without trust.
///
/// Nothing in here may influence the authorization outcome except the choice
/// of which trust configuration and key perform the actual verification.
#[derive(Debug, Clone)]
pub struct UnverifiedClaims {
    pub header: UnverifiedHeader,
    pub payload: UnverifiedPayload,
}

impl UnverifiedClaims {
    /// Decode a token's header and payload without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns `FormatError::TokenTooLarge` or `FormatError::MalformedToken`
    /// when the token is not a structurally valid JWT.
    pub fn decode_unverified(token: &str) -> Result<Self, FormatError> {
        let (header, payload) = common::jwt::decode_unverified(token)?;
        Ok(Self { header, payload })
    }

    /// The issuer the token claims, if any.
    pub fn issuer(&self) -> Option<&str> {
        self.payload.iss.as_deref()
    }

    /// The key ID the token claims, with empty strings treated as absent.
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref().filter(|kid| !kid.is_empty())
    }
}

/// Claims of a verified token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user_id or client_id) - redacted in Debug output.
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Audience(s).
    pub aud: Audience,

    /// Expiration timestamp (Unix epoch seconds, fractions allowed).
    pub exp: f64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<f64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,

    /// Scopes granted to this token, kept in whatever JSON shape the issuer
    /// used (usually a space-separated string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<serde_json::Value>,

    /// Remaining claims, available for surfacing into the decision context.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Custom Debug implementation that redacts the `sub` field.
///
/// `extra` is reduced to its keys since it can hold arbitrary identity data.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("scope", &self.scope)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Claims {
    /// Check if the token has a specific scope.
    ///
    /// Scopes are space-separated in the JWT claims.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }

    /// Get all scopes as a vector.
    ///
    /// Accepts a space-separated string or an array of strings.
    pub fn scopes(&self) -> Vec<&str> {
        match &self.scope {
            Some(serde_json::Value::String(scope)) => scope.split_whitespace().collect(),
            Some(serde_json::Value::Array(scopes)) => {
                scopes.iter().filter_map(serde_json::Value::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}
