//! Token Authorizer Library
//!
//! Decides, per incoming call, whether a bearer token grants access to the
//! requested resource:
//!
//! - Extracts the bearer credential from the request envelope
//! - Routes the token to a tenant by its (unverified) issuer
//! - Resolves the verification key from the tenant's key set or static key
//! - Verifies signature, audience, issuer and validity window
//! - Emits an Allow policy for the resource, or an opaque rejection
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> auth::Authenticator -> auth::{registry, jwks, jwt, decision}
//! ```
//!
//! # Modules
//!
//! - `auth` - The authorization pipeline
//! - `config` - Service configuration from environment
//! - `errors` - Error types and the external rejection
//! - `handlers` - HTTP request handlers
//! - `observability` - Metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;
