pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod media;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::middleware::{error_detail_middleware, panic_response, route_not_found};

pub use state::AppState;

/// Builds the full HTTP application.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/api/health", get(handlers::public::health::health))
        .merge(auth_routes())
        .merge(item_routes())
        .merge(user_routes())
        .fallback(route_not_found)
        // Global middleware
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(state.clone(), error_detail_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use handlers::{protected, public};

    Router::new()
        .route("/api/auth/register", post(public::auth::register))
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/auth/logout", post(protected::auth::logout))
        .route("/api/auth/forgot-password", post(public::auth::forgot_password))
        .route("/api/auth/reset-password", post(public::auth::reset_password))
}

fn item_routes() -> Router<AppState> {
    use handlers::{protected::items as write, public::items as read};

    Router::new()
        .route("/api/items", get(read::list).post(write::create))
        .route("/api/items/search", get(read::search))
        .route("/api/items/user/:user_id", get(read::by_user))
        .route(
            "/api/items/:id",
            get(read::detail).put(write::update).delete(write::delete),
        )
        // Claim workflow
        .route("/api/items/:id/claim", post(write::claim))
        .route("/api/items/:id/unclaim", post(write::unclaim))
        .route("/api/items/:id/resolve", post(write::resolve))
        .route("/api/items/:id/verify", post(write::verify))
}

fn user_routes() -> Router<AppState> {
    use handlers::protected::users;

    Router::new()
        .route("/api/users", get(users::list))
        .route(
            "/api/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
}

/// CORS restricted to the configured origins, with credentials.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring malformed CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}
