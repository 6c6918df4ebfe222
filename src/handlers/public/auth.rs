// handlers/public/auth.rs - POST /api/auth/{register,login,forgot-password,reset-password}

use axum::extract::State;
use axum_extra::extract::CookieJar;
use serde_json::{json, Value};

use crate::api::UserSummary;
use crate::error::ApiError;
use crate::handlers::extract::JsonBody;
use crate::middleware::{session_cookie, ApiResponse};
use crate::services::auth_service::{ForgotPasswordInput, LoginInput, RegisterInput, ResetPasswordInput};
use crate::state::AppState;

fn with_session(state: &AppState, jar: CookieJar, token: &str) -> CookieJar {
    let max_age = state.tokens.session_ttl().num_seconds();
    jar.add(session_cookie(token.to_string(), max_age, state.config.security.secure_cookies))
}

/**
 * POST /api/auth/register - Create an account and start a session
 *
 * Input: `{ "name": "Ada", "email": "ada@example.com", "password": "secret1" }`
 *
 * Output (201):
 * ```json
 * {
 *   "success": true,
 *   "message": "User registered successfully",
 *   "user": { "id": "...", "name": "Ada", "email": "ada@example.com" },
 *   "token": "eyJhbGciOiJIUzI1NiI..."
 * }
 * ```
 * The token is also set as the `token` cookie.
 */
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let (user, token) = state
        .auth
        .register(input)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while registering user"))?;

    let jar = with_session(&state, jar, &token);
    let body = json!({ "user": UserSummary::from(&user), "token": token });
    Ok((jar, ApiResponse::created("User registered successfully", body)))
}

/// POST /api/auth/login - Same body shape and cookie as registration, status 200.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let (user, token) = state
        .auth
        .login(input)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while logging in"))?;

    let jar = with_session(&state, jar, &token);
    let body = json!({ "user": UserSummary::from(&user), "token": token });
    Ok((jar, ApiResponse::with_message("Login successful", body)))
}

/// POST /api/auth/forgot-password - Returns a one-hour reset token in the body.
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ForgotPasswordInput>,
) -> Result<ApiResponse<Value>, ApiError> {
    let reset_token = state
        .auth
        .forgot_password(input)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while processing forgot password"))?;

    Ok(ApiResponse::with_message(
        "Password reset token generated",
        json!({ "resetToken": reset_token }),
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ResetPasswordInput>,
) -> Result<ApiResponse<Value>, ApiError> {
    state
        .auth
        .reset_password(input)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while resetting password"))?;

    Ok(ApiResponse::message_only(
        "Password reset successfully. Please login with your new password.",
    ))
}
