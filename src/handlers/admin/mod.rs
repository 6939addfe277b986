pub mod rls;
pub mod tenants;
