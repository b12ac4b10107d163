//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each request body is
//! collected up front and routed through [`dispatch`], which never touches
//! the socket.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{AUTHORIZATION, HOST};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::boosts::BoostService;
use crate::claim_hooks::ClaimHookEngine;
use crate::config::Args;
use crate::credentials::CredentialEngine;
use crate::did::{DidDocCache, DidDocService, DistributedLock};
use crate::graph::{ensure_default_roles, GraphStore};
use crate::identity::DidCapability;
use crate::notifications::{NotificationQueue, NotificationSink};
use crate::profiles::ProfileService;
use crate::storage::StorageService;
use crate::routes::{self, HttpResponse};
use crate::types::{BrainError, Result};
use crate::uri::UriResolver;

const DEFAULT_LIMIT: usize = 25;
const MAX_LIMIT: usize = 100;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub graph: Arc<dyn GraphStore>,
    pub identity: Arc<dyn DidCapability>,
    pub did_docs: Arc<DidDocService>,
    pub hooks: Arc<ClaimHookEngine>,
    pub credentials: Arc<CredentialEngine>,
    pub profiles: ProfileService,
    pub boosts: BoostService,
    pub storage: StorageService,
    pub jwt: JwtValidator,
    /// Client for cloud URI resolution
    pub http_client: reqwest::Client,
    /// Name of the storage backend, reported by health checks
    pub backend: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the engines together and start the notification dispatcher
    pub async fn new(
        args: Args,
        graph: Arc<dyn GraphStore>,
        identity: Arc<dyn DidCapability>,
        cache: Arc<dyn DidDocCache>,
        lock: Arc<dyn DistributedLock>,
        sink: Arc<dyn NotificationSink>,
        backend: &'static str,
    ) -> Result<(Self, JoinHandle<()>)> {
        ensure_default_roles(graph.as_ref()).await?;

        let jwt = match &args.jwt_secret {
            Some(secret) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?,
            None if args.dev_mode => JwtValidator::new_dev(),
            None => {
                return Err(BrainError::Config(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        let did_docs = Arc::new(DidDocService::new(graph.clone(), identity.clone(), cache, lock));
        let hooks = Arc::new(ClaimHookEngine::new(graph.clone(), did_docs.clone()));
        let (notifications, dispatcher) =
            NotificationQueue::spawn(args.notification_queue_size, sink);
        let credentials = Arc::new(CredentialEngine::new(graph.clone(), hooks.clone(), notifications));

        let http_client = reqwest::Client::builder()
            .timeout(args.request_timeout())
            .build()?;

        let state = Self {
            profiles: ProfileService::new(graph.clone(), did_docs.clone()),
            boosts: BoostService::new(graph.clone(), credentials.clone()),
            storage: StorageService::new(graph.clone()),
            args,
            graph,
            identity,
            did_docs,
            hooks,
            credentials,
            jwt,
            http_client,
            backend,
            started_at: Instant::now(),
        };

        Ok((state, dispatcher))
    }

    /// Domain this request addresses: DOMAIN_NAME, else the Host header,
    /// else localhost on the listen port. Port colons are escaped.
    pub fn domain(&self, host: Option<&str>) -> String {
        if let Some(domain) = &self.args.domain_name {
            return domain.replace(':', "%3A");
        }
        match host.filter(|h| !h.is_empty()) {
            Some(host) => host.replace(':', "%3A"),
            None => format!("localhost%3A{}", self.args.listen.port()),
        }
    }

    /// Resolver bound to one domain
    pub fn resolver(&self, domain: &str) -> UriResolver {
        UriResolver::new(
            self.graph.clone(),
            self.identity.clone(),
            self.http_client.clone(),
            domain,
        )
    }
}

/// What a route handler sees of a request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub domain: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl RequestContext {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, raw: Option<&str>) -> Self {
        self.query = parse_query(raw);
        self
    }

    pub fn with_authorization(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {}", token));
        self
    }

    pub fn with_json(mut self, body: &serde_json::Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self
    }

    /// Decode the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(BrainError::BadRequest("Request body is required".into()));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// A required query parameter
    pub fn param(&self, name: &str) -> Result<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| BrainError::BadRequest(format!("Missing query parameter: {}", name)))
    }

    /// `limit` query parameter, clamped
    pub fn limit(&self) -> Result<usize> {
        match self.query.get("limit") {
            None => Ok(DEFAULT_LIMIT),
            Some(raw) => raw
                .parse::<usize>()
                .map(|n| n.clamp(1, MAX_LIMIT))
                .map_err(|_| BrainError::BadRequest(format!("Invalid limit: {}", raw))),
        }
    }

    /// Comma-separated list parameter
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        self.query.get(name).map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}

fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    raw.unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| {
            let value = value.replace('+', " ");
            let decoded = urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or(value);
            (key.to_string(), decoded)
        })
        .collect()
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Brain listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory fallbacks and dev JWT secret allowed");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Collect the request and route it
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let header = |name: hyper::header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(String::from)
    };

    let host = header(HOST);
    let authorization = header(AUTHORIZATION);
    let query = req.uri().query().map(String::from);

    info!("[{}] {} {} (host: {})", addr, method, path, host.as_deref().unwrap_or(""));

    let body = req.into_body().collect().await?.to_bytes();

    let ctx = RequestContext {
        domain: state.domain(host.as_deref()),
        query: parse_query(query.as_deref()),
        authorization,
        body,
    };

    let started = Instant::now();
    let response = match tokio::time::timeout(
        state.args.request_timeout(),
        dispatch(&state, &method, &path, ctx),
    )
    .await
    {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            if e.status_code().is_server_error() {
                error!(method = %method, path = %path, error = %e, "Request failed");
            } else {
                debug!(method = %method, path = %path, error = %e, "Request rejected");
            }
            routes::error_response(e)
        }
        Err(_) => routes::error_response(BrainError::Internal("Request timed out".into())),
    };

    debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request complete"
    );
    Ok(response)
}

/// Route a collected request
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    ctx: RequestContext,
) -> Result<HttpResponse> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        // CORS preflight
        (&Method::OPTIONS, _) => Ok(routes::preflight_response()),

        // ====================================================================
        // Health
        // ====================================================================
        (&Method::GET, ["health"]) | (&Method::GET, ["healthz"]) => {
            Ok(routes::health::health_check(state))
        }
        (&Method::GET, ["ready"]) | (&Method::GET, ["readyz"]) => {
            Ok(routes::health::readiness_check(state).await)
        }
        (&Method::GET, ["version"]) => Ok(routes::health::version_info()),

        // ====================================================================
        // DID documents
        // ====================================================================
        (&Method::GET, [".well-known", "did.json"]) => {
            routes::identity::root_document(state, &ctx).await
        }
        (&Method::GET, ["users", profile_id, "did.json"]) => {
            routes::identity::profile_document(state, &ctx, profile_id).await
        }
        (&Method::GET, ["manager", id, "did.json"]) => {
            routes::identity::manager_document(state, &ctx, id).await
        }

        // ====================================================================
        // Profiles
        // ====================================================================
        (&Method::POST, ["api", "profile", "create"]) => routes::profiles::create(state, &ctx).await,
        (&Method::GET, ["api", "profile"]) => routes::profiles::get_own(state, &ctx).await,
        (&Method::POST, ["api", "profile", "update"]) => routes::profiles::update(state, &ctx).await,
        (&Method::DELETE, ["api", "profile"]) => routes::profiles::delete(state, &ctx).await,
        (&Method::GET, ["api", "profile", handle]) => {
            routes::profiles::get_by_handle(state, &ctx, handle).await
        }

        // ====================================================================
        // Credentials
        // ====================================================================
        (&Method::POST, ["api", "credential", "send"]) => {
            routes::credentials::send(state, &ctx).await
        }
        (&Method::POST, ["api", "credential", "accept"]) => {
            routes::credentials::accept(state, &ctx).await
        }
        (&Method::GET, ["api", "credential"]) => routes::credentials::get(state, &ctx).await,
        (&Method::DELETE, ["api", "credential"]) => routes::credentials::delete(state, &ctx).await,
        (&Method::GET, ["api", "credentials", "received"]) => {
            routes::credentials::received(state, &ctx).await
        }
        (&Method::GET, ["api", "credentials", "sent"]) => {
            routes::credentials::sent(state, &ctx).await
        }
        (&Method::GET, ["api", "credentials", "incoming"]) => {
            routes::credentials::incoming(state, &ctx).await
        }
        (&Method::POST, ["api", "credential", "issue"]) => {
            routes::credentials::issue(state, &ctx).await
        }
        (&Method::POST, ["api", "credential", "verify"]) => {
            routes::credentials::verify(state, &ctx).await
        }
        (&Method::GET, ["api", "storage", "resolve"]) => {
            routes::credentials::resolve(state, &ctx).await
        }
        (&Method::POST, ["api", "storage", "store"]) => {
            routes::credentials::store(state, &ctx).await
        }

        // ====================================================================
        // Boosts and claim hooks
        // ====================================================================
        (&Method::POST, ["api", "boost", "create"]) => routes::boosts::create(state, &ctx).await,
        (&Method::GET, ["api", "boost"]) => routes::boosts::get(state, &ctx).await,
        (&Method::GET, ["api", "boost", "permissions"]) => {
            routes::boosts::permissions(state, &ctx).await
        }
        (&Method::POST, ["api", "boost", "send"]) => routes::boosts::send(state, &ctx).await,
        (&Method::POST, ["api", "boost", "manager"]) => {
            routes::boosts::create_manager(state, &ctx).await
        }
        (&Method::POST, ["api", "claim-hook", "create"]) => {
            routes::boosts::create_hook(state, &ctx).await
        }
        (&Method::GET, ["api", "claim-hooks"]) => routes::boosts::list_hooks(state, &ctx).await,
        (&Method::DELETE, ["api", "claim-hook"]) => routes::boosts::delete_hook(state, &ctx).await,

        _ => Ok(routes::not_found_response(path)),
    }
}
