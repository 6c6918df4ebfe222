// handlers/protected/mod.rs - Handlers that require a session token
//
// Every handler here takes `AuthUser` as its first extractor.

pub mod auth;
pub mod items;
pub mod users;
