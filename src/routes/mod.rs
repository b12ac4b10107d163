//! HTTP routes for the brain

pub mod boosts;
pub mod credentials;
pub mod health;
pub mod identity;
pub mod profiles;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::auth::{extract_token_from_header, Claims};
use crate::graph::Profile;
use crate::server::{AppState, RequestContext};
use crate::types::{BrainError, Result};

pub type HttpResponse = Response<Full<Bytes>>;

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_body(status, "application/json", Bytes::from(bytes)),
        Err(e) => error_response(BrainError::Internal(format!("Failed to encode response: {}", e))),
    }
}

pub fn ok<T: Serialize>(body: &T) -> Result<HttpResponse> {
    Ok(json_response(StatusCode::OK, body))
}

/// `{"error", "message"}` body with the error's status
pub fn error_response(err: BrainError) -> HttpResponse {
    let (status, body) = err.into_status_code_and_body();
    with_body(status, "application/json", Bytes::from(body))
}

/// CORS preflight response
pub fn preflight_response() -> HttpResponse {
    let mut response = with_body(StatusCode::OK, "text/plain", Bytes::new());
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    response
}

pub fn not_found_response(path: &str) -> HttpResponse {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "NOT_FOUND", "path": path }),
    )
}

// =============================================================================
// Authentication helpers
// =============================================================================

/// Verify the bearer token
pub fn authenticate(state: &AppState, ctx: &RequestContext) -> Result<Claims> {
    let token = extract_token_from_header(ctx.authorization.as_deref())
        .ok_or_else(|| BrainError::Unauthorized("Missing bearer token".into()))?;
    state.jwt.verify_token(token)
}

/// Verify a full-access token
pub fn authenticate_full(state: &AppState, ctx: &RequestContext) -> Result<Claims> {
    let claims = authenticate(state, ctx)?;
    claims.require_full()?;
    Ok(claims)
}

/// The profile of the authenticated caller. `full` requires a full-access token.
pub async fn caller_profile(state: &AppState, ctx: &RequestContext, full: bool) -> Result<Profile> {
    let claims = if full {
        authenticate_full(state, ctx)?
    } else {
        authenticate(state, ctx)?
    };
    state.profiles.get_by_did(&claims.did).await
}
