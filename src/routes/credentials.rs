//! Credential transfer endpoints

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::{caller_profile, json_response, ok, HttpResponse};
use crate::credentials::{proof, AcceptOptions, CredentialPayload};
use crate::server::{AppState, RequestContext};
use crate::types::Result;
use crate::uri::ResourceKind;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest {
    /// Recipient handle
    profile_id: String,
    credential: Value,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptRequest {
    uri: String,
    #[serde(default)]
    options: AcceptOptions,
}

#[derive(Debug, Deserialize)]
struct CredentialRequest {
    credential: Value,
}

#[derive(Debug, Deserialize)]
struct StoreRequest {
    #[serde(rename = "type")]
    kind: ResourceKind,
    item: Value,
}

/// POST /api/credential/send -> credential URI
pub async fn send(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    let request: SendRequest = ctx.json()?;
    let credential = CredentialPayload::from_value(request.credential)?;

    let uri = state
        .credentials
        .send(
            &profile,
            &request.profile_id.to_lowercase(),
            credential.into_value()?,
            None,
            &ctx.domain,
            request.metadata,
        )
        .await?;
    Ok(json_response(StatusCode::CREATED, &uri))
}

/// POST /api/credential/accept -> `true`
pub async fn accept(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    let request: AcceptRequest = ctx.json()?;

    ok(&state
        .credentials
        .accept(&profile, &request.uri, &ctx.domain, request.options)
        .await?)
}

/// GET /api/credential?uri=
pub async fn get(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    ok(&state.credentials.get(ctx.param("uri")?, &ctx.domain).await?)
}

/// DELETE /api/credential?uri=
pub async fn delete(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    state
        .credentials
        .delete(&profile.profile_id, ctx.param("uri")?, &ctx.domain)
        .await?;
    ok(&true)
}

/// GET /api/credentials/received?limit=&from=
pub async fn received(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, false).await?;
    ok(&state
        .credentials
        .received(&profile.profile_id, ctx.limit()?, ctx.list("from"), &ctx.domain)
        .await?)
}

/// GET /api/credentials/sent?limit=&to=
pub async fn sent(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, false).await?;
    ok(&state
        .credentials
        .sent(&profile.profile_id, ctx.limit()?, ctx.list("to"), &ctx.domain)
        .await?)
}

/// GET /api/credentials/incoming?limit=&from=
pub async fn incoming(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, false).await?;
    ok(&state
        .credentials
        .incoming(&profile.profile_id, ctx.limit()?, ctx.list("from"), &ctx.domain)
        .await?)
}

/// GET /api/storage/resolve?uri= -> the resource the URI addresses
pub async fn resolve(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let resource = state.resolver(&ctx.domain).resolve(ctx.param("uri")?).await?;
    ok(&resource.into_value())
}

/// POST /api/credential/issue -> the credential signed by the network identity
pub async fn issue(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    caller_profile(state, ctx, true).await?;
    let request: CredentialRequest = ctx.json()?;

    ok(&proof::issue(state.identity.as_ref(), request.credential)?)
}

/// POST /api/credential/verify -> `{checks, warnings, errors}`
pub async fn verify(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let request: CredentialRequest = ctx.json()?;
    ok(&proof::verify(state.identity.as_ref(), &request.credential))
}

/// POST /api/storage/store -> URI of the stored item
pub async fn store(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    let profile = caller_profile(state, ctx, true).await?;
    let request: StoreRequest = ctx.json()?;

    let uri = state
        .storage
        .store(&profile, request.kind, request.item, &ctx.domain)
        .await?;
    Ok(json_response(StatusCode::CREATED, &uri))
}
