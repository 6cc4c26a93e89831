pub mod batch;
pub mod config;
pub mod context;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod security;
pub mod services;
pub mod startup;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get},
    Router,
};
use service_core::middleware::{cors::cors_middleware, metrics::metrics_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::GreetingConfig;
use crate::middleware::{
    basic_auth_middleware, request_context_middleware, require_user_role, REQUEST_ID_HEADER,
};
use crate::security::AccountAuthenticationProvider;
use crate::services::{AccountService, GreetingHealthIndicator, GreetingService};

pub use startup::Application;

#[derive(Clone)]
pub struct AppState {
    pub config: GreetingConfig,
    pub greetings: GreetingService,
    pub accounts: AccountService,
    pub authenticator: Arc<AccountAuthenticationProvider>,
    pub health: Arc<GreetingHealthIndicator>,
}

pub fn build_router(state: AppState) -> Router {
    // Basic auth runs first, then the role check.
    let api_routes = Router::new()
        .route(
            "/api/greetings",
            get(handlers::greetings::list_greetings).post(handlers::greetings::create_greeting),
        )
        .route(
            "/api/greetings/:id",
            get(handlers::greetings::get_greeting)
                .put(handlers::greetings::update_greeting)
                .delete(handlers::greetings::delete_greeting),
        )
        .route(
            "/api/cache/greetings",
            delete(handlers::greetings::evict_greeting_cache),
        )
        .route("/api/accounts/me", get(handlers::accounts::get_me))
        .route_layer(from_fn(require_user_role))
        .route_layer(from_fn_with_state(state.clone(), basic_auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .merge(api_routes)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(cors_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_context_middleware))
        .with_state(state)
}
