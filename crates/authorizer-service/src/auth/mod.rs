//! Bearer token authorization.
//!
//! # Components
//!
//! - `envelope` - request envelope and bearer credential extraction
//! - `claims` - unverified and verified token claims
//! - `registry` - trust configurations and issuer routing
//! - `keys` - key-set entries and verification key material
//! - `rate_limit` - per-tenant key-set fetch budget
//! - `jwks` - per-tenant key resolution with caching
//! - `jwt` - signature and claim verification
//! - `decision` - policy documents and authorization decisions
//! - `authenticator` - the composed pipeline

pub mod authenticator;
pub mod claims;
pub mod decision;
pub mod envelope;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod rate_limit;
pub mod registry;

pub use authenticator::{Authenticator, Stage};
pub use claims::{Claims, UnverifiedClaims};
pub use decision::{build_decision, policy_document, AuthDecision, Effect, PolicyDocument};
pub use envelope::{extract_bearer_token, RequestEnvelope};
pub use jwks::KeyResolver;
pub use jwt::TokenVerifier;
pub use keys::SigningKey;
pub use registry::{Tenant, TrustConfig, TrustRegistry};
