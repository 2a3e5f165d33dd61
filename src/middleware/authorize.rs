use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{Identity, Role};
use crate::error::ApiError;

/// Fixed allow-list of roles for a group of routes.
///
/// Must be layered inside `authenticate`, which supplies the identity.
#[derive(Debug, Clone, Copy)]
pub struct RoleGate(pub &'static [Role]);

impl RoleGate {
    pub const CUSTOMER: RoleGate = RoleGate(&[Role::Customer]);
    pub const FULFILMENT: RoleGate = RoleGate(&[Role::Admin, Role::Seller]);
    pub const SELLER: RoleGate = RoleGate(&[Role::Seller]);

    pub fn allows(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

pub async fn authorize(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // No identity means authentication never ran; reject rather than pass through.
    let identity = request.extensions().get::<Identity>().ok_or_else(|| {
        tracing::error!("authorize reached without an authenticated identity");
        ApiError::unauthorized("Authentication required.")
    })?;

    if !gate.allows(identity.role) {
        tracing::warn!(user_id = identity.user_id, role = %identity.role, "role not permitted");
        return Err(ApiError::forbidden("You do not have permission to perform this action."));
    }

    Ok(next.run(request).await)
}
