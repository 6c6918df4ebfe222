// handlers/protected/auth.rs - POST /api/auth/logout

use axum::extract::State;
use axum_extra::extract::CookieJar;
use serde_json::Value;

use crate::middleware::{session_cookie_removal, ApiResponse, AuthUser};
use crate::state::AppState;

/// Clears the session cookie. Tokens are stateless, so nothing is revoked server-side.
pub async fn logout(auth: AuthUser, State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<Value>) {
    tracing::debug!("User {} logged out", auth.user_id);
    let jar = jar.add(session_cookie_removal(state.config.security.secure_cookies));
    (jar, ApiResponse::message_only("Logged out successfully"))
}
