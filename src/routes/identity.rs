//! did:web document endpoints

use super::{ok, HttpResponse};
use crate::server::{AppState, RequestContext};
use crate::types::Result;

/// GET /.well-known/did.json
pub async fn root_document(state: &AppState, ctx: &RequestContext) -> Result<HttpResponse> {
    ok(&state.did_docs.root_document(&ctx.domain).await?)
}

/// GET /users/{profileId}/did.json
pub async fn profile_document(
    state: &AppState,
    ctx: &RequestContext,
    profile_id: &str,
) -> Result<HttpResponse> {
    let profile_id = profile_id.to_lowercase();
    ok(&state.did_docs.profile_document(&profile_id, &ctx.domain).await?)
}

/// GET /manager/{id}/did.json
pub async fn manager_document(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
) -> Result<HttpResponse> {
    ok(&state.did_docs.manager_document(id, &ctx.domain).await?)
}
