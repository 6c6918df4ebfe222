pub mod auth;
pub mod error_detail;
pub mod response;

pub use auth::{session_cookie, session_cookie_removal, AuthUser, TOKEN_COOKIE};
pub use error_detail::{error_detail_middleware, panic_response, route_not_found};
pub use response::ApiResponse;
