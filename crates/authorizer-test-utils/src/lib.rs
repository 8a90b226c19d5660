//! # Authorizer Test Utilities
//!
//! Shared test utilities for the token authorizer.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keys for reproducible tests)
//! - Claim builders (TestTokenBuilder)
//! - A mock key-set endpoint (MockJwksServer)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authorizer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, "test-key-01");
//!     let jwks = MockJwksServer::with_keys(&[&keypair]).await;
//!
//!     let token = keypair.sign_token(
//!         &TestTokenBuilder::new().for_user("alice").with_scope("read").build(),
//!     );
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;

/// Issuer used by default test tenants and tokens.
pub const TEST_ISSUER: &str = "https://tenant.example.com/";

/// Audience used by default test tenants and tokens.
pub const TEST_AUDIENCE: &str = "https://api.example.com";

/// Resource identifier used in test request envelopes.
pub const TEST_RESOURCE: &str = "arn:aws:execute-api:us-east-1:123456789012:abcdef123/prod/GET/items";
