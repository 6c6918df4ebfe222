use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::auth::{Claims, TokenService};
use crate::error::ApiError;
use crate::state::AppState;

/// Name of the session cookie set at login and registration.
pub const TOKEN_COOKIE: &str = "token";

/// Session cookie carrying `token`, readable by the server only.
pub fn session_cookie(token: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(max_age_seconds))
        .secure(secure)
        .build()
}

/// Blank, already-expired session cookie. Added to the jar unconditionally so bearer-only
/// clients are told to drop the cookie too.
pub fn session_cookie_removal(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((TOKEN_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .secure(secure)
        .build();
    cookie.make_removal();
    cookie
}

/// Authenticated caller, taken from a verified session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_jwt_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

        let claims = validate_jwt(&state.tokens, &token)?;
        Ok(AuthUser::from(claims))
    }
}

/// Bearer header first, then the session cookie.
fn extract_jwt_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().nth(1))
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

fn validate_jwt(tokens: &TokenService, token: &str) -> Result<Claims, ApiError> {
    tokens.verify_session(token).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        ApiError::forbidden("Invalid or expired token")
    })
}
