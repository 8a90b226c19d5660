//! Trust configurations and issuer routing.
//!
//! Each tenant pairs a [`TrustConfig`] with the [`KeyResolver`] built for it.
//! The [`TrustRegistry`] picks the tenant for a token from its unverified
//! issuer claim. Routing only chooses which configuration the token is
//! verified against; a token routed to a tenant it was not issued for still
//! fails verification.

use crate::auth::claims::UnverifiedClaims;
use crate::auth::jwks::KeyResolver;
use crate::config::{ConfigError, JwksSettings};
use std::sync::Arc;

/// What a tenant accepts: one audience, one issuer, and at least one key source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustConfig {
    name: String,
    audience: String,
    issuer: String,
    jwks_uri: Option<String>,
    static_key: Option<String>,
}

impl TrustConfig {
    /// Create a trust configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTrustConfig` when the audience or issuer
    /// is empty, or when neither a key-set URI nor a static key is given.
    pub fn new(
        name: &str,
        audience: impl Into<String>,
        issuer: impl Into<String>,
        jwks_uri: Option<String>,
        static_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let audience = audience.into();
        let issuer = issuer.into();

        if audience.is_empty() || issuer.is_empty() {
            return Err(ConfigError::InvalidTrustConfig(format!(
                "tenant {} requires an audience and an issuer",
                name
            )));
        }

        let jwks_uri = jwks_uri.filter(|uri| !uri.is_empty());
        let static_key = static_key.filter(|key| !key.is_empty());

        if jwks_uri.is_none() && static_key.is_none() {
            return Err(ConfigError::InvalidTrustConfig(format!(
                "tenant {} requires a key set URI or a static public key",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            audience,
            issuer,
            jwks_uri,
            static_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn jwks_uri(&self) -> Option<&str> {
        self.jwks_uri.as_deref()
    }

    /// Static public key text as configured, before newline normalization.
    pub fn static_key(&self) -> Option<&str> {
        self.static_key.as_deref()
    }
}

/// A trust configuration with its key resolver.
#[derive(Clone)]
pub struct Tenant {
    config: Arc<TrustConfig>,
    resolver: KeyResolver,
}

impl Tenant {
    /// Build a tenant, constructing its resolver.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStaticKey` if the static key cannot be parsed.
    pub fn new(config: TrustConfig, settings: &JwksSettings) -> Result<Self, ConfigError> {
        let resolver = KeyResolver::new(&config, settings)?;
        Ok(Self {
            config: Arc::new(config),
            resolver,
        })
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }
}

/// Routes tokens to tenants by issuer.
///
/// Immutable after construction and shared across requests.
#[derive(Clone)]
pub struct TrustRegistry {
    default_tenant: Tenant,
    tenants: Vec<Tenant>,
}

impl TrustRegistry {
    pub fn new(default_tenant: Tenant, tenants: Vec<Tenant>) -> Self {
        Self {
            default_tenant,
            tenants,
        }
    }

    /// Build every tenant named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first tenant construction error.
    pub fn from_configs(
        default_tenant: &TrustConfig,
        tenants: &[TrustConfig],
        settings: &JwksSettings,
    ) -> Result<Self, ConfigError> {
        let default_tenant = Tenant::new(default_tenant.clone(), settings)?;
        let tenants = tenants
            .iter()
            .map(|config| Tenant::new(config.clone(), settings))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(default_tenant, tenants))
    }

    /// Select the tenant whose issuer exactly equals the token's `iss`.
    ///
    /// Tokens with no `iss`, or an `iss` no tenant claims, go to the default
    /// tenant. The default tenant's own issuer is matched before the others.
    pub fn select(&self, claims: &UnverifiedClaims) -> &Tenant {
        let Some(issuer) = claims.issuer() else {
            tracing::debug!(target: "authorizer.registry", "Token has no issuer, using default tenant");
            return &self.default_tenant;
        };

        if issuer == self.default_tenant.config.issuer() {
            return &self.default_tenant;
        }

        match self
            .tenants
            .iter()
            .find(|tenant| tenant.config.issuer() == issuer)
        {
            Some(tenant) => {
                tracing::debug!(target: "authorizer.registry", tenant = %tenant.config.name(), "Matched tenant by issuer");
                tenant
            }
            None => {
                tracing::debug!(target: "authorizer.registry", "Unknown issuer, using default tenant");
                &self.default_tenant
            }
        }
    }

    pub fn default_tenant(&self) -> &Tenant {
        &self.default_tenant
    }

    pub fn tenants(&self) -> impl Iterator<Item = &Tenant> {
        std::iter::once(&self.default_tenant).chain(self.tenants.iter())
    }
}
