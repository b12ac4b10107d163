//! Boost and claim hook endpoints
//!
//! Boosts are addressed by URI on the wire; claim hooks by id.

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{caller_profile, json_response, ok, HttpResponse};
use crate::boosts::NewBoost;
use crate::claim_hooks::NewClaimHook;
use crate::graph::{BoostPermissions, ClaimHookType};
use crate::server::{AppState, RequestContext};
use crate::types::Result;
use crate::uri::{self, ResourceKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBoostRequest {
    /// Recipient handle
    profile_id: String,
    uri: String,
    #[serde(default)]
    template_data: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagerRequest {
    uri: String,
    did: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HookRequest {
    #[serde(rename = "type")]
    hook_type: ClaimHookType,
    claim_uri: String,
    target_uri: String,
    #[serde(default)]
    permissions: Option<BoostPermissions>,
}

fn boost_id(boost_uri: &str, domain: &str) -> Result<String> {
    let parsed = uri::parse(boost_uri, domain)?;
    parsed.expect_kind(ResourceKind::Boost)?;
    Ok(parsed.id)
}

/// POST /api/boost/create -> boost URI
pub async fn create(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    let new: NewBoost = ctx.json()?;

    let uri = state.boosts.create_boost(&profile, new, &ctx.domain).await?;
    Ok(json_response(StatusCode::CREATED, &uri))
}

/// GET /api/boost?uri=
pub async fn get(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    ok(&state.boosts.get_boost(ctx.param("uri")?, &ctx.domain).await?)
}

/// GET /api/boost/permissions?uri= -> the caller's permissions
pub async fn permissions(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, false).await?;
    ok(&state
        .boosts
        .permissions(&profile.profile_id, ctx.param("uri")?, &ctx.domain)
        .await?)
}

/// POST /api/boost/send -> credential URI
pub async fn send(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    let request: SendBoostRequest = ctx.json()?;

    let uri = state
        .boosts
        .send_boost(
            &profile,
            &request.profile_id.to_lowercase(),
            &request.uri,
            request.template_data,
            &ctx.domain,
        )
        .await?;
    Ok(json_response(StatusCode::CREATED, &uri))
}

/// POST /api/boost/manager -> `{"did": <did:web>}`
pub async fn create_manager(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    let request: ManagerRequest = ctx.json()?;

    let did = state
        .boosts
        .create_child_manager(&profile, &request.uri, &request.did, &ctx.domain)
        .await?;
    Ok(json_response(StatusCode::CREATED, &serde_json::json!({ "did": did })))
}

/// POST /api/claim-hook/create -> the hook
pub async fn create_hook(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    let request: HookRequest = ctx.json()?;

    let hook = state
        .hooks
        .create_hook(
            &profile.profile_id,
            NewClaimHook {
                hook_type: request.hook_type,
                claim_boost_id: boost_id(&request.claim_uri, &ctx.domain)?,
                target_boost_id: boost_id(&request.target_uri, &ctx.domain)?,
                permissions: request.permissions,
            },
        )
        .await?;
    Ok(json_response(StatusCode::CREATED, &hook))
}

/// GET /api/claim-hooks?uri=
pub async fn list_hooks(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let id = boost_id(ctx.param("uri")?, &ctx.domain)?;
    ok(&state.hooks.hooks_for_boost(&id).await?)
}

/// DELETE /api/claim-hook?id=
pub async fn delete_hook(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    state
        .hooks
        .delete_hook(&profile.profile_id, ctx.param("id")?)
        .await?;
    ok(&true)
}
