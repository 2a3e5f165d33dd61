pub mod auth;
pub mod authorize;

pub use auth::{authenticate, AuthUser};
pub use authorize::{authorize, RoleGate};
