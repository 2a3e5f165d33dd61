use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{Identity, TokenVerifier};
use crate::error::ApiError;

/// Identity attached by `authenticate`, as a handler argument.
#[derive(Clone, Debug)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent only when a route skipped the gate; never fall through.
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthorized("Authentication required."))
    }
}

/// Bearer token authentication.
///
/// Verifies the `Authorization: Bearer <token>` header and inserts the
/// resulting `Identity` into the request extensions. Every failure is a 401
/// with the same message, whatever the verifier reported.
pub async fn authenticate(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).map_err(|reason| {
        tracing::debug!("Authentication rejected: {}", reason);
        ApiError::unauthorized("Authentication required.")
    })?;

    let identity = verifier.verify(token)?;
    tracing::debug!(user_id = identity.user_id, role = %identity.role, "authenticated");

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extract the token from the Authorization header
fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or("missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Authorization header is not valid ASCII")?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use Bearer token format")?
        .trim();

    if token.is_empty() {
        return Err("empty bearer token");
    }
    Ok(token)
}
