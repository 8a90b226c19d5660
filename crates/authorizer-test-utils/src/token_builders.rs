//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating token claims.

use crate::{TEST_AUDIENCE, TEST_ISSUER};
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// Defaults produce claims that the default test tenant accepts.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_scope("read write")
///     .expires_in(3600)
///     .build();
/// let token = keypair.sign_token(&claims);
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    iss: Option<String>,
    aud: Option<Value>,
    scope: Option<String>,
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: i64,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Some("test-subject".to_string()),
            iss: Some(TEST_ISSUER.to_string()),
            aud: Some(Value::String(TEST_AUDIENCE.to_string())),
            scope: Some("read write".to_string()),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            nbf: None,
            iat: now.timestamp(),
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Remove the subject
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    /// Set the issuer
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Remove the issuer
    pub fn without_issuer(mut self) -> Self {
        self.iss = None;
        self
    }

    /// Set a single audience
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(Value::String(audience.to_string()));
        self
    }

    /// Set an audience array
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = Some(json!(audiences));
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Remove the scope claim
    pub fn without_scope(mut self) -> Self {
        self.scope = None;
        self
    }

    /// Set expiration in seconds from now. Negative values produce expired tokens.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Remove the expiration claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("iat".to_string(), json!(self.iat));

        let optional = [
            ("sub", self.sub.map(Value::String)),
            ("iss", self.iss.map(Value::String)),
            ("aud", self.aud),
            ("scope", self.scope.map(Value::String)),
            ("exp", self.exp.map(|exp| json!(exp))),
            ("nbf", self.nbf.map(|nbf| json!(nbf))),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                claims.insert(name.to_string(), value);
            }
        }

        Value::Object(claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
