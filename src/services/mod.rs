pub mod auth_service;
pub mod item_service;
pub mod user_service;

pub use auth_service::{AuthError, AuthService};
pub use item_service::{ItemError, ItemService};
pub use user_service::{UserError, UserService};
