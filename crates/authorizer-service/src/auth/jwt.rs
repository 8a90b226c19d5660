//! Token verification.
//!
//! Checks a token against one signing key and one trust configuration.
//!
//! # Security
//!
//! - The algorithm must belong to the key's family (no HS* ever, no
//!   RSA/EC/Ed confusion) and match the key's pinned `alg` if it has one
//! - `exp`, `iss`, `aud` and `sub` are required
//! - `exp` and `nbf` are checked with the configured clock skew
//! - Every failure is reported as the same [`InvalidTokenError`]

use crate::auth::claims::Claims;
use crate::auth::keys::SigningKey;
use crate::auth::registry::TrustConfig;
use crate::errors::InvalidTokenError;
use jsonwebtoken::{decode, decode_header, Validation};
use std::time::Duration;
use tracing::instrument;

/// Claims every accepted token must carry.
const REQUIRED_CLAIMS: [&str; 4] = ["exp", "iss", "aud", "sub"];

/// Verifies token signatures and standard claims.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    /// Leeway applied to `exp` and `nbf`.
    clock_skew: Duration,
}

impl TokenVerifier {
    pub fn new(clock_skew: Duration) -> Self {
        Self { clock_skew }
    }

    /// Verify `token` with `key` against `trust`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTokenError` for any verification failure.
    #[instrument(skip_all, fields(tenant = %trust.name()))]
    pub fn verify(
        &self,
        token: &str,
        key: &SigningKey,
        trust: &TrustConfig,
    ) -> Result<Claims, InvalidTokenError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "authorizer.jwt", error = %e, "Token header rejected");
            InvalidTokenError
        })?;

        if !key.accepts(header.alg) {
            tracing::warn!(
                target: "authorizer.jwt",
                alg = ?header.alg,
                family = ?key.family(),
                "Token algorithm not accepted by key"
            );
            return Err(InvalidTokenError);
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[trust.audience()]);
        validation.set_issuer(&[trust.issuer()]);
        validation.set_required_spec_claims(REQUIRED_CLAIMS.as_slice());

        let token_data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| {
            tracing::debug!(target: "authorizer.jwt", error = %e, "Token verification failed");
            InvalidTokenError
        })?;

        tracing::debug!(target: "authorizer.jwt", "Token verified successfully");
        Ok(token_data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use authorizer_test_utils::{
        tamper_signature, TestKeypair, TestTokenBuilder, TEST_AUDIENCE, TEST_ISSUER,
    };
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn trust() -> TrustConfig {
        TrustConfig::new(
            "default",
            TEST_AUDIENCE,
            TEST_ISSUER,
            Some("http://localhost/jwks".to_string()),
            None,
        )
        .unwrap()
    }

    fn key_for(keypair: &TestKeypair) -> SigningKey {
        SigningKey::from_pem(&keypair.public_key_pem()).unwrap()
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(Duration::from_secs(60))
    }

    #[test]
    fn test_verify_valid_token() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(&TestTokenBuilder::new().for_user("alice").build());

        let claims = verifier().verify(&token, &key_for(&keypair), &trust()).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, TEST_ISSUER);
        assert!(claims.has_scope("read"));
    }

    #[test]
    fn test_verify_audience_array() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(
            &TestTokenBuilder::new()
                .with_audiences(&["https://other.example.com", TEST_AUDIENCE])
                .build(),
        );

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let signer = TestKeypair::new(1, "key-1");
        let other = TestKeypair::new(2, "key-1");
        let token = signer.sign_token(&TestTokenBuilder::new().build());

        let result = verifier().verify(&token, &key_for(&other), &trust());
        assert_eq!(result.unwrap_err(), InvalidTokenError);
    }

    #[test]
    fn test_verify_rejects_tampered_signature() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = tamper_signature(&keypair.sign_token(&TestTokenBuilder::new().build()));

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(&TestTokenBuilder::new().with_scope("read").build());

        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&TestTokenBuilder::new().with_scope("admin").build()).unwrap(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(verifier().verify(&forged, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_audience() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(
            &TestTokenBuilder::new()
                .with_audience("https://elsewhere.example.com")
                .build(),
        );

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_issuer() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(
            &TestTokenBuilder::new()
                .with_issuer("https://evil.example.com/")
                .build(),
        );

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(&TestTokenBuilder::new().expires_in(-3600).build());

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_expiry_within_clock_skew() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(&TestTokenBuilder::new().expires_in(-10).build());

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_ok());

        let strict = TokenVerifier::new(Duration::ZERO);
        assert!(strict.verify(&token, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_rejects_not_yet_valid_token() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = keypair.sign_token(&TestTokenBuilder::new().not_before_in(3600).build());

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_requires_standard_claims() {
        let keypair = TestKeypair::new(1, "key-1");
        let key = key_for(&keypair);

        for claims in [
            TestTokenBuilder::new().without_expiry().build(),
            TestTokenBuilder::new().without_issuer().build(),
            TestTokenBuilder::new().without_subject().build(),
        ] {
            let token = keypair.sign_token(&claims);
            assert!(verifier().verify(&token, &key, &trust()).is_err());
        }
    }

    #[test]
    fn test_verify_rejects_symmetric_algorithm() {
        let keypair = TestKeypair::new(1, "key-1");
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&TestTokenBuilder::new().build()).unwrap(),
        );
        let token = format!("{header}.{payload}.c2lnbmF0dXJl");

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_err());
    }

    #[test]
    fn test_verify_rejects_none_algorithm() {
        let keypair = TestKeypair::new(1, "key-1");
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&TestTokenBuilder::new().build()).unwrap(),
        );
        let token = format!("{header}.{payload}.");

        assert!(verifier().verify(&token, &key_for(&keypair), &trust()).is_err());
    }
}
