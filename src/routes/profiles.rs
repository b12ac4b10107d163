//! Profile endpoints

use hyper::StatusCode;
use serde_json::json;

use super::{authenticate, authenticate_full, caller_profile, json_response, ok, HttpResponse};
use crate::profiles::{NewProfile, ProfileUpdate};
use crate::server::{AppState, RequestContext};
use crate::types::Result;

/// POST /api/profile/create -> `{"did": <did:web>}`
pub async fn create(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let claims = authenticate_full(state, ctx)?;
    let new: NewProfile = ctx.json()?;

    let did = state.profiles.create(&claims.did, new, &ctx.domain).await?;
    Ok(json_response(StatusCode::CREATED, &json!({ "did": did })))
}

/// GET /api/profile
pub async fn get_own(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    ok(&caller_profile(state, ctx, false).await?)
}

/// GET /api/profile/{handle}
pub async fn get_by_handle(
    state: &AppState,
    _ctx: &RequestContext,
    handle: &str,
) -> Result<HttpResponse> {
    ok(&state.profiles.get_by_handle(handle).await?)
}

/// POST /api/profile/update
pub async fn update(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let claims = authenticate_full(state, ctx)?;
    let update: ProfileUpdate = ctx.json()?;

    ok(&state.profiles.update(&claims.did, update).await?)
}

/// DELETE /api/profile
pub async fn delete(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let claims = authenticate(state, ctx)?;
    claims.require_full()?;

    state.profiles.delete(&claims.did).await?;
    ok(&true)
}
