pub mod chat;
pub mod delivery;
pub mod integration;
pub mod invoice;
pub mod lead;
pub mod payroll;
pub mod product;
pub mod tenant;
pub mod user;
