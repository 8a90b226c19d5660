//! Authorizer configuration.
//!
//! Configuration is loaded once from environment variables at startup and is
//! read-only afterwards. Only public material (issuers, audiences, key-set
//! URIs, public keys) is configured, so Debug output is not redacted.

use crate::auth::TrustConfig;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Name of the tenant used when no configured issuer matches.
pub const DEFAULT_TENANT: &str = "default";

/// Name of the optional secondary tenant for external API tokens.
pub const EXTERNAL_API_TENANT: &str = "external_api_token";

/// Default key-set fetches allowed per tenant per rolling minute.
pub const DEFAULT_JWKS_REQUESTS_PER_MINUTE: u32 = 10;

/// Default signing-key cache TTL in seconds (10 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 600;

/// Default signing-key cache capacity per tenant.
pub const DEFAULT_JWKS_CACHE_MAX_ENTRIES: usize = 5;

/// Default key-set HTTP timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default HTTP bind address for the transport adapter.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Key-set fetching and caching policy, shared by every tenant's resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwksSettings {
    /// Maximum key-set fetches per tenant per rolling minute.
    pub requests_per_minute: u32,

    /// How long a resolved key is served from cache before it is refetched.
    pub cache_ttl: Duration,

    /// Maximum number of keys cached per tenant.
    pub cache_max_entries: usize,

    /// Timeout for a single key-set HTTP request.
    pub fetch_timeout: Duration,
}

impl Default for JwksSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_JWKS_REQUESTS_PER_MINUTE,
            cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
            cache_max_entries: DEFAULT_JWKS_CACHE_MAX_ENTRIES,
            fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
        }
    }
}

/// Authorizer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default tenant. Selected when a token's issuer matches no other tenant.
    pub default_tenant: TrustConfig,

    /// Additional tenants, matched by exact issuer in order.
    pub tenants: Vec<TrustConfig>,

    /// Key-set fetch and cache policy.
    pub jwks: JwksSettings,

    /// Leeway applied to `exp` and `nbf`.
    pub clock_skew: Duration,

    /// Extra verified claims copied into the decision context, besides `scope`.
    pub context_claims: Vec<String>,

    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid trust configuration: {0}")]
    InvalidTrustConfig(String),

    #[error("Invalid static key for tenant {0}")]
    InvalidStaticKey(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwksSetting(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let audience = required(vars, "AUDIENCE")?;

        let default_tenant = TrustConfig::new(
            DEFAULT_TENANT,
            audience.clone(),
            required(vars, "TOKEN_ISSUER")?,
            optional(vars, "JWKS_URI"),
            optional(vars, "PUBLIC_KEY"),
        )?;

        // The external API tenant is enabled by configuring its issuer
        let mut tenants = Vec::new();
        let external_issuer = optional(vars, "EXTERNAL_API_TOKEN_ISSUER")
            .or_else(|| optional(vars, "AUTH0_EXTERNAL_API_TOKEN_ISSUER"));
        if let Some(issuer) = external_issuer {
            tenants.push(TrustConfig::new(
                EXTERNAL_API_TENANT,
                optional(vars, "EXTERNAL_API_AUDIENCE").unwrap_or(audience),
                issuer,
                optional(vars, "EXTERNAL_API_JWKS_URI"),
                optional(vars, "EXTERNAL_API_JWT_PUBLIC_KEY"),
            )?);
        }

        let requests_per_minute = parse_positive(
            vars,
            "JWKS_REQUESTS_PER_MINUTE",
            DEFAULT_JWKS_REQUESTS_PER_MINUTE,
        )?;
        let cache_ttl_seconds =
            parse_positive(vars, "JWKS_CACHE_TTL_SECONDS", DEFAULT_JWKS_CACHE_TTL_SECONDS)?;
        let cache_max_entries =
            parse_positive(vars, "JWKS_CACHE_MAX_ENTRIES", DEFAULT_JWKS_CACHE_MAX_ENTRIES)?;
        let fetch_timeout_seconds = parse_positive(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;

        // Parse JWT clock skew tolerance with validation
        let clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let context_claims = optional(vars, "CONTEXT_CLAIMS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|claim| !claim.is_empty() && *claim != "scope")
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let bind_address =
            optional(vars, "BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Config {
            default_tenant,
            tenants,
            jwks: JwksSettings {
                requests_per_minute,
                cache_ttl: Duration::from_secs(cache_ttl_seconds),
                cache_max_entries,
                fetch_timeout: Duration::from_secs(fetch_timeout_seconds),
            },
            clock_skew,
            context_claims,
            bind_address,
        })
    }
}

/// Empty values are treated as unset, matching how unset secrets are
/// commonly rendered into the environment.
fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    optional(vars, name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_positive<T>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e| {
        ConfigError::InvalidJwksSetting(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == T::default() {
        return Err(ConfigError::InvalidJwksSetting(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("AUDIENCE".to_string(), "https://api.example.com".to_string()),
            (
                "TOKEN_ISSUER".to_string(),
                "https://tenant.example.com/".to_string(),
            ),
            (
                "JWKS_URI".to_string(),
                "https://tenant.example.com/.well-known/jwks.json".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.default_tenant.name(), DEFAULT_TENANT);
        assert_eq!(config.default_tenant.audience(), "https://api.example.com");
        assert_eq!(config.default_tenant.issuer(), "https://tenant.example.com/");
        assert!(config.tenants.is_empty());
        assert_eq!(config.jwks, JwksSettings::default());
        assert_eq!(config.clock_skew, DEFAULT_CLOCK_SKEW);
        assert!(config.context_claims.is_empty());
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn test_from_vars_missing_audience() {
        let mut vars = base_vars();
        vars.remove("AUDIENCE");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "AUDIENCE"));
    }

    #[test]
    fn test_from_vars_empty_issuer_is_missing() {
        let mut vars = base_vars();
        vars.insert("TOKEN_ISSUER".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "TOKEN_ISSUER"));
    }

    #[test]
    fn test_from_vars_requires_a_key_source() {
        let mut vars = base_vars();
        vars.remove("JWKS_URI");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidTrustConfig(_))));
    }

    #[test]
    fn test_from_vars_external_tenant() {
        let mut vars = base_vars();
        vars.insert(
            "EXTERNAL_API_TOKEN_ISSUER".to_string(),
            "https://external.example.com/".to_string(),
        );
        vars.insert(
            "EXTERNAL_API_JWKS_URI".to_string(),
            "https://external.example.com/.well-known/jwks.json".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.tenants.len(), 1);
        let external = config.tenants.first().unwrap();
        assert_eq!(external.name(), EXTERNAL_API_TENANT);
        assert_eq!(external.issuer(), "https://external.example.com/");
        // Audience falls back to the shared AUDIENCE
        assert_eq!(external.audience(), "https://api.example.com");
        assert_eq!(
            external.jwks_uri(),
            Some("https://external.example.com/.well-known/jwks.json")
        );
    }

    #[test]
    fn test_from_vars_external_tenant_legacy_issuer_name() {
        let mut vars = base_vars();
        vars.insert(
            "AUTH0_EXTERNAL_API_TOKEN_ISSUER".to_string(),
            "https://external.example.com/".to_string(),
        );
        vars.insert(
            "EXTERNAL_API_JWT_PUBLIC_KEY".to_string(),
            "-----BEGIN PUBLIC KEY-----\\nAAAA\\n-----END PUBLIC KEY-----".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        let external = config.tenants.first().unwrap();
        assert_eq!(external.issuer(), "https://external.example.com/");
        assert!(external.static_key().is_some());
        assert_eq!(external.jwks_uri(), None);
    }

    #[test]
    fn test_from_vars_external_tenant_own_audience() {
        let mut vars = base_vars();
        vars.insert(
            "EXTERNAL_API_TOKEN_ISSUER".to_string(),
            "https://external.example.com/".to_string(),
        );
        vars.insert(
            "EXTERNAL_API_AUDIENCE".to_string(),
            "https://external-api.example.com".to_string(),
        );
        vars.insert(
            "EXTERNAL_API_JWKS_URI".to_string(),
            "https://external.example.com/jwks".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        let external = config.tenants.first().unwrap();
        assert_eq!(external.audience(), "https://external-api.example.com");
    }

    #[test]
    fn test_from_vars_external_tenant_without_key_source() {
        let mut vars = base_vars();
        vars.insert(
            "EXTERNAL_API_TOKEN_ISSUER".to_string(),
            "https://external.example.com/".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidTrustConfig(_))));
    }

    #[test]
    fn test_from_vars_custom_jwks_settings() {
        let mut vars = base_vars();
        vars.insert("JWKS_REQUESTS_PER_MINUTE".to_string(), "3".to_string());
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "60".to_string());
        vars.insert("JWKS_CACHE_MAX_ENTRIES".to_string(), "20".to_string());
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.jwks.requests_per_minute, 3);
        assert_eq!(config.jwks.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.jwks.cache_max_entries, 20);
        assert_eq!(config.jwks.fetch_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_from_vars_rejects_zero_rate_limit() {
        let mut vars = base_vars();
        vars.insert("JWKS_REQUESTS_PER_MINUTE".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksSetting(msg)) if msg.contains("greater than 0"))
        );
    }

    #[test]
    fn test_from_vars_rejects_non_numeric_cache_size() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_MAX_ENTRIES".to_string(), "lots".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksSetting(msg)) if msg.contains("JWKS_CACHE_MAX_ENTRIES"))
        );
    }

    #[test]
    fn test_from_vars_clock_skew() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().clock_skew, Duration::ZERO);

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());
        assert_eq!(
            Config::from_vars(&vars).unwrap().clock_skew,
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_from_vars_clock_skew_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed"))
        );
    }

    #[test]
    fn test_from_vars_clock_skew_negative() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "-5".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidJwtClockSkew(_))));
    }

    #[test]
    fn test_from_vars_context_claims() {
        let mut vars = base_vars();
        vars.insert(
            "CONTEXT_CLAIMS".to_string(),
            " email, scope,org_id ,".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.context_claims, vec!["email", "org_id"]);
    }

    #[test]
    fn test_from_vars_custom_bind_address() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
    }
}
