pub mod admin;
pub mod health;
pub mod protected;
pub mod public;
