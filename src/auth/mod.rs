//! Sign-in sessions and role checks.
//!
//! A session is an HS256 token. API clients send it as `Authorization: Bearer`; the
//! browser pages carry it in the `sessionid` cookie set by the login form.

pub mod jwt;

use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;
use crate::users;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_PATH: &str = "/login";

/// Who is making the request, attached by [`require_auth`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(token: &str) -> Option<(header::HeaderName, HeaderValue)> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        jwt::expires_in_seconds()
    ))
    .ok()
    .map(|value| (header::SET_COOKIE, value))
}

pub fn clear_session_cookie() -> (header::HeaderName, HeaderValue) {
    (
        header::SET_COOKIE,
        HeaderValue::from_static("sessionid=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    )
}

/// Browser page loads get redirects; everything else gets a status code.
fn wants_page(request: &Request) -> bool {
    *request.method() == Method::GET && !request.uri().path().starts_with("/api/")
}

fn deny_unauthenticated(request: &Request, reason: &str) -> Response {
    warn!(path = %request.uri().path(), "unauthenticated request: {reason}");
    if wants_page(request) {
        return Redirect::to(LOGIN_PATH).into_response();
    }
    AppError::unauthorized("Inicie sesión para continuar.").into_response()
}

/// Checks the session token and that its user is still active, then attaches an
/// [`AuthContext`]. The role comes from the store, so a role change applies at once.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = bearer_token(request.headers())
        .or_else(|| session_token(request.headers()))
        .map(str::to_owned);
    let Some(token) = token else {
        return deny_unauthenticated(&request, "missing credentials");
    };
    let claims = match jwt::verify_token(&token, &state.jwt_secret) {
        Ok(claims) => claims,
        Err(err) => return deny_unauthenticated(&request, &err.to_string()),
    };
    let role = {
        let data = state.data.lock().await;
        users::find(&data, claims.sub)
            .filter(|user| user.is_active)
            .map(|user| user.role)
    };
    let Some(role) = role else {
        return deny_unauthenticated(&request, "user missing or inactive");
    };

    request.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        username: claims.username,
        role,
    });
    next.run(request).await
}

/// Lets the request through when its user holds one of `allowed` or is the owner.
/// Denied page loads go back to the dashboard.
pub async fn require_roles(allowed: &'static [Role], request: Request, next: Next) -> Response {
    let role = request.extensions().get::<AuthContext>().map(|auth| auth.role);
    if !role.is_some_and(|role| role.may_act_as(allowed)) {
        warn!(
            path = %request.uri().path(),
            role = role.map(Role::as_str).unwrap_or("none"),
            "role not allowed"
        );
        if wants_page(&request) {
            return Redirect::to("/").into_response();
        }
        return AppError::forbidden("No tiene permiso para esta acción.").into_response();
    }
    next.run(request).await
}

pub async fn workers_only(request: Request, next: Next) -> Response {
    require_roles(&[Role::Trabajador], request, next).await
}

pub async fn delivery_managers_only(request: Request, next: Next) -> Response {
    require_roles(&[Role::Encargada], request, next).await
}

pub async fn owners_only(request: Request, next: Next) -> Response {
    require_roles(&[], request, next).await
}
