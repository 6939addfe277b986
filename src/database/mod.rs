pub mod manager;
pub mod tenant_db;

pub use manager::{DatabaseError, DatabaseManager};
pub use tenant_db::TenantDb;
