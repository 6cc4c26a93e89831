use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

pub const ALLOWED_METHODS: &str = "DELETE, GET, OPTIONS, PATCH, POST, PUT";
pub const ALLOWED_HEADERS: &str = "x-requested-with, content-type";
pub const MAX_AGE_SECONDS: &str = "3600";

/// Announces that every endpoint accepts cross-origin calls from any origin.
///
/// Headers are written on every response, including errors, so browsers can read
/// failure bodies as well.
pub async fn cors_middleware(req: Request, next: Next) -> impl IntoResponse {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        header::HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header::HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        header::HeaderValue::from_static(MAX_AGE_SECONDS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        header::HeaderValue::from_static(ALLOWED_HEADERS),
    );

    response
}
