//! Authorization decision handler.

use crate::auth::{AuthDecision, RequestEnvelope};
use crate::errors::Unauthorized;
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/authorize
///
/// Accepts the request envelope as JSON:
///
/// ```json
/// {
///   "type": "TOKEN",
///   "authorizationToken": "Bearer eyJ...",
///   "methodArn": "arn:aws:execute-api:us-east-1:123456789012:api/prod/GET/items"
/// }
/// ```
///
/// Returns 200 with the decision document, or 401 with
/// `{"message": "Unauthorized"}` for every kind of failure. A body that is
/// not an envelope is treated as an empty envelope so it is rejected through
/// the same path.
#[instrument(skip_all, name = "authorizer.http.authorize")]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AuthDecision>, Unauthorized> {
    let envelope: RequestEnvelope = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(target: "authorizer.extract", error = %e, "Request body is not an envelope");
        RequestEnvelope::default()
    });

    state.authenticator.authenticate(&envelope).await.map(Json)
}
