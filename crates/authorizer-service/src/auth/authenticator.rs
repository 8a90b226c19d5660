//! The authorization pipeline.
//!
//! ```text
//! Start -> Extracted -> ConfigResolved -> KeyResolved -> Verified -> Decided
//!   \__________\______________\_______________\___________\_____-> Rejected
//! ```
//!
//! Each stage runs once per request; nothing is retried here. Stage errors
//! travel as [`AuthError`] and [`Authenticator::authenticate`] is the only
//! place they become the opaque [`Unauthorized`].

use crate::auth::claims::UnverifiedClaims;
use crate::auth::decision::{build_decision, AuthDecision};
use crate::auth::envelope::{extract_bearer_token, RequestEnvelope};
use crate::auth::jwt::TokenVerifier;
use crate::auth::registry::TrustRegistry;
use crate::config::{Config, ConfigError};
use crate::errors::{AuthError, FormatError, Unauthorized};
use crate::observability::metrics;
use std::fmt;
use tracing::instrument;

/// Pipeline stage reached by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Extracted,
    ConfigResolved,
    KeyResolved,
    Verified,
    Decided,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Extracted => "extracted",
            Stage::ConfigResolved => "config_resolved",
            Stage::KeyResolved => "key_resolved",
            Stage::Verified => "verified",
            Stage::Decided => "decided",
        }
    }

    /// Last stage completed before `err` rejected the request.
    pub fn reached_before(err: &AuthError) -> Stage {
        match err {
            AuthError::Format(FormatError::TokenTooLarge | FormatError::MalformedToken) => {
                Stage::Extracted
            }
            AuthError::Format(_) => Stage::Start,
            AuthError::KeyResolution(_) => Stage::ConfigResolved,
            AuthError::InvalidToken(_) => Stage::KeyResolved,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composes extraction, routing, key resolution, verification and decision.
///
/// Built once at startup and shared by all requests.
#[derive(Clone)]
pub struct Authenticator {
    registry: TrustRegistry,
    verifier: TokenVerifier,
    context_claims: Vec<String>,
}

impl Authenticator {
    pub fn new(registry: TrustRegistry, verifier: TokenVerifier, context_claims: Vec<String>) -> Self {
        Self {
            registry,
            verifier,
            context_claims,
        }
    }

    /// Build tenants and resolvers from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any tenant's static key is invalid.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let registry =
            TrustRegistry::from_configs(&config.default_tenant, &config.tenants, &config.jwks)?;

        Ok(Self::new(
            registry,
            TokenVerifier::new(config.clock_skew),
            config.context_claims.clone(),
        ))
    }

    pub fn registry(&self) -> &TrustRegistry {
        &self.registry
    }

    /// Authorize a request, returning the decision or the opaque rejection.
    ///
    /// The failure kind is recorded in logs and metrics only.
    #[instrument(skip_all, name = "authorizer.authenticate")]
    pub async fn authenticate(&self, envelope: &RequestEnvelope) -> Result<AuthDecision, Unauthorized> {
        match self.evaluate(envelope).await {
            Ok(decision) => {
                metrics::record_decision(None);
                Ok(decision)
            }
            Err(err) => {
                let stage = Stage::reached_before(&err);
                match &err {
                    AuthError::KeyResolution(e) if e.is_transient() => {
                        tracing::warn!(
                            target: "authorizer.authenticate",
                            stage = %stage,
                            reason = %err.reason(),
                            error = %err,
                            "Request rejected"
                        );
                    }
                    _ => {
                        tracing::info!(
                            target: "authorizer.authenticate",
                            stage = %stage,
                            reason = %err.reason(),
                            error = %err,
                            "Request rejected"
                        );
                    }
                }
                metrics::record_decision(Some(err.reason()));
                Err(err.into_rejection())
            }
        }
    }

    /// Run the pipeline, keeping the typed failure.
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` of the stage that rejected the request.
    pub async fn evaluate(&self, envelope: &RequestEnvelope) -> Result<AuthDecision, AuthError> {
        let token = extract_bearer_token(envelope)?;
        trace_stage(Stage::Extracted);

        let unverified = UnverifiedClaims::decode_unverified(token)?;
        let tenant = self.registry.select(&unverified);
        tracing::debug!(
            target: "authorizer.authenticate",
            stage = %Stage::ConfigResolved,
            tenant = %tenant.config().name(),
            "Stage reached"
        );

        let key = tenant.resolver().resolve(unverified.key_id()).await?;
        trace_stage(Stage::KeyResolved);

        let claims = self.verifier.verify(token, &key, tenant.config())?;
        trace_stage(Stage::Verified);

        let decision = build_decision(&claims, &envelope.resource, &self.context_claims);
        tracing::info!(
            target: "authorizer.authenticate",
            stage = %Stage::Decided,
            tenant = %tenant.config().name(),
            "Request authorized"
        );

        Ok(decision)
    }
}

fn trace_stage(stage: Stage) {
    tracing::debug!(target: "authorizer.authenticate", stage = %stage, "Stage reached");
}
