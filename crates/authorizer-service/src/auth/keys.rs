//! Key set documents and verification key material.
//!
//! A [`SigningKey`] is built either from a JWK entry of a tenant's key set or
//! from a statically configured PEM public key. Once built it is immutable
//! and shared behind an `Arc`.

use crate::errors::KeyResolutionError;
use common::jwt::decode_ed25519_public_key_jwk;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// JSON Web Key from a key-set endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Curve name for EC and OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// EC x coordinate, or the OKP public key (base64url encoded).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(default)]
    pub y: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// Key set document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

impl JwksResponse {
    /// Find the signing key with the given key ID.
    ///
    /// Keys marked for a use other than `sig` are ignored.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| {
            jwk.kid.as_deref() == Some(kid) && jwk.key_use.as_deref().map_or(true, |u| u == "sig")
        })
    }
}

/// Asymmetric key family. Decides which token algorithms a key can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    /// Whether tokens signed with `alg` can be verified by keys of this family.
    ///
    /// Symmetric (HMAC) algorithms are never accepted.
    pub fn supports(self, alg: Algorithm) -> bool {
        matches!(
            (self, alg),
            (
                KeyFamily::Rsa,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ) | (KeyFamily::Ec, Algorithm::ES256 | Algorithm::ES384)
                | (KeyFamily::Ed, Algorithm::EdDSA)
        )
    }
}

/// Public key material able to verify token signatures.
#[derive(Clone)]
pub struct SigningKey {
    kid: Option<String>,
    family: KeyFamily,
    /// Algorithm pinned by the key set entry, if it declared one.
    algorithm: Option<Algorithm>,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a key from a key set entry.
    ///
    /// # Errors
    ///
    /// Returns `KeyResolutionError::UnsupportedKey` for unknown key types,
    /// missing parameters, undecodable values or an unknown `alg`.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyResolutionError> {
        let algorithm = jwk
            .alg
            .as_deref()
            .map(|alg| {
                Algorithm::from_str(alg)
                    .map_err(|_| KeyResolutionError::UnsupportedKey(format!("alg {alg}")))
            })
            .transpose()?;

        let (family, decoding_key) = match jwk.kty.as_str() {
            "RSA" => {
                let n = required_param(jwk.n.as_deref(), "n")?;
                let e = required_param(jwk.e.as_deref(), "e")?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| KeyResolutionError::UnsupportedKey(format!("rsa: {err}")))?;
                (KeyFamily::Rsa, key)
            }
            "EC" => {
                let x = required_param(jwk.x.as_deref(), "x")?;
                let y = required_param(jwk.y.as_deref(), "y")?;
                let key = DecodingKey::from_ec_components(x, y)
                    .map_err(|err| KeyResolutionError::UnsupportedKey(format!("ec: {err}")))?;
                (KeyFamily::Ec, key)
            }
            "OKP" => {
                if let Some(crv) = jwk.crv.as_deref() {
                    if crv != "Ed25519" {
                        return Err(KeyResolutionError::UnsupportedKey(format!("crv {crv}")));
                    }
                }
                let x = required_param(jwk.x.as_deref(), "x")?;
                let bytes = decode_ed25519_public_key_jwk(x)
                    .map_err(|err| KeyResolutionError::UnsupportedKey(format!("okp: {err}")))?;
                (KeyFamily::Ed, DecodingKey::from_ed_der(&bytes))
            }
            other => {
                return Err(KeyResolutionError::UnsupportedKey(format!("kty {other}")));
            }
        };

        if let Some(alg) = algorithm {
            if !family.supports(alg) {
                return Err(KeyResolutionError::UnsupportedKey(format!(
                    "alg {alg:?} does not match kty {}",
                    jwk.kty
                )));
            }
        }

        Ok(Self {
            kid: jwk.kid.clone(),
            family,
            algorithm,
            decoding_key,
        })
    }

    /// Build a key from PEM text (SPKI public key or PKCS#1 RSA public key).
    ///
    /// Escaped `\n` sequences are normalized to real line breaks first. The
    /// key family is detected from the PEM contents.
    ///
    /// # Errors
    ///
    /// Returns the parse error of the last attempted family if the text is
    /// not a supported public key.
    pub fn from_pem(pem: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let normalized = common::jwt::normalize_pem_newlines(pem);
        let bytes = normalized.as_bytes();

        let (family, decoding_key) = DecodingKey::from_rsa_pem(bytes)
            .map(|key| (KeyFamily::Rsa, key))
            .or_else(|_| DecodingKey::from_ec_pem(bytes).map(|key| (KeyFamily::Ec, key)))
            .or_else(|_| DecodingKey::from_ed_pem(bytes).map(|key| (KeyFamily::Ed, key)))?;

        Ok(Self {
            kid: None,
            family,
            algorithm: None,
            decoding_key,
        })
    }

    /// Whether this key may verify a token declaring `alg`.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        self.family.supports(alg) && self.algorithm.map_or(true, |pinned| pinned == alg)
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

fn required_param<'a>(
    value: Option<&'a str>,
    name: &'static str,
) -> Result<&'a str, KeyResolutionError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KeyResolutionError::UnsupportedKey(format!("missing {name}")))
}
