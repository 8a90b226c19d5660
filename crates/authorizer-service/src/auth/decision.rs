//! Authorization decision documents.
//!
//! The wire shape is fixed by the invoking gateway, hence the PascalCase
//! field names inside the policy document.

use crate::auth::claims::Claims;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action granted by every statement.
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Action")]
    pub action: String,

    #[serde(rename = "Effect")]
    pub effect: Effect,

    #[serde(rename = "Resource")]
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

/// Result of a successful authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthDecision {
    /// The token subject.
    #[serde(rename = "principalId")]
    pub principal_id: String,

    #[serde(rename = "policyDocument")]
    pub policy_document: PolicyDocument,

    /// Always holds `scope`; other entries come from configured context claims.
    pub context: BTreeMap<String, serde_json::Value>,
}

/// Build a policy with one statement applying `effect` to `resource`.
pub fn policy_document(effect: Effect, resource: &str) -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statement: vec![Statement {
            action: INVOKE_ACTION.to_string(),
            effect,
            resource: resource.to_string(),
        }],
    }
}

/// Build the Allow decision for verified claims.
///
/// `context.scope` is the scope claim copied as-is, or an empty string when
/// the token has none. Each name in `context_claims` present in the token is
/// copied the same way.
pub fn build_decision(claims: &Claims, resource: &str, context_claims: &[String]) -> AuthDecision {
    let mut context = BTreeMap::new();
    context.insert(
        "scope".to_string(),
        claims
            .scope
            .clone()
            .unwrap_or_else(|| serde_json::Value::String(String::new())),
    );

    for name in context_claims {
        if let Some(value) = claims.extra.get(name) {
            context.insert(name.clone(), value.clone());
        }
    }

    AuthDecision {
        principal_id: claims.sub.clone(),
        policy_document: policy_document(Effect::Allow, resource),
        context,
    }
}
