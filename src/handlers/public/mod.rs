// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition, password reset, health, and read-only item browsing.

pub mod auth;
pub mod health;
pub mod items;
