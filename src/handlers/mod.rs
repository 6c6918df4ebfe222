// handlers/mod.rs - Route handlers in two tiers
//
// Public handlers need no credential. Protected handlers take an `AuthUser` extractor, which
// answers 401 when no token is sent and 403 when the token does not verify.

pub mod extract;
pub mod protected;
pub mod public;
