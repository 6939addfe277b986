pub mod seed;
pub mod tenants;

pub use tenants::{TenantError, TenantService};
