pub mod auth;
pub mod tenant;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use tenant::{require_owner_middleware, tenant_context_middleware, CurrentTenant};
