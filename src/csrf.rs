//! Anti-forgery token checks.
//!
//! Every page sets the `csrftoken` cookie; the page scripts echo it back in the
//! `X-CSRFToken` header. The sale form may carry it as a hidden field instead.

use crate::errors::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

pub const HEADER_NAME: &str = "X-CSRFToken";
pub const COOKIE_NAME: &str = "csrftoken";
pub const FORM_FIELD: &str = "csrfmiddlewaretoken";

pub fn token_matches(expected: &str, presented: Option<&str>) -> bool {
    presented.is_some_and(|token| !token.is_empty() && token.trim() == expected)
}

pub fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(HEADER_NAME).and_then(|value| value.to_str().ok())
}

pub fn rejection() -> AppError {
    AppError::forbidden("CSRF verification failed.")
}

/// Rejects a POST with 403 unless it carries the server's token in the header.
/// Other methods pass through.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if *request.method() == Method::POST && !token_matches(&state.csrf_token, header_token(request.headers())) {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "request without a valid csrf token"
        );
        return rejection().into_response();
    }
    next.run(request).await
}

pub fn cookie_header(token: &str) -> Option<(header::HeaderName, HeaderValue)> {
    HeaderValue::from_str(&format!("{COOKIE_NAME}={token}; Path=/; SameSite=Lax"))
        .ok()
        .map(|value| (header::SET_COOKIE, value))
}
