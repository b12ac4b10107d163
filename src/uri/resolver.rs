//! URI resolution
//!
//! Network URIs are read from the graph; cloud URIs are fetched from the
//! LearnCloud storage endpoint of their domain.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{escape_localhost, parse_with, LcnUri, ResourceKind, UriMethod};
use crate::graph::GraphStore;
use crate::identity::resolver::scheme_for;
use crate::identity::{is_jwe, DidCapability};
use crate::template;
use crate::types::{BrainError, Result};

/// A resolved resource
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Credential(Value),
    Presentation(Value),
    Boost(Value),
    Contract(Value),
    Terms(Value),
    /// Fetched out of protocol; the kind is whatever the URI claimed
    Cloud(ResourceKind, Value),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Credential(_) => ResourceKind::Credential,
            Self::Presentation(_) => ResourceKind::Presentation,
            Self::Boost(_) => ResourceKind::Boost,
            Self::Contract(_) => ResourceKind::Contract,
            Self::Terms(_) => ResourceKind::Terms,
            Self::Cloud(kind, _) => *kind,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Credential(v)
            | Self::Presentation(v)
            | Self::Boost(v)
            | Self::Contract(v)
            | Self::Terms(v)
            | Self::Cloud(_, v) => v,
        }
    }
}

/// Resolves any `lc:` URI to the resource it addresses
pub struct UriResolver {
    graph: Arc<dyn GraphStore>,
    identity: Arc<dyn DidCapability>,
    http_client: reqwest::Client,
    domain: String,
}

impl UriResolver {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        identity: Arc<dyn DidCapability>,
        http_client: reqwest::Client,
        domain: &str,
    ) -> Self {
        Self {
            graph,
            identity,
            http_client,
            domain: escape_localhost(domain),
        }
    }

    pub async fn resolve(&self, uri: &str) -> Result<Resource> {
        let parsed = parse_with(uri, &self.domain, true)?;

        match parsed.method {
            UriMethod::Cloud => self.resolve_cloud(uri, &parsed).await,
            UriMethod::Network => {
                if parsed.domain != self.domain {
                    return Err(BrainError::BadRequest(format!(
                        "URI domain {} does not match this network ({})",
                        parsed.domain, self.domain
                    )));
                }
                self.resolve_network(&parsed).await
            }
        }
    }

    async fn resolve_network(&self, uri: &LcnUri) -> Result<Resource> {
        let missing = || BrainError::NotFound(format!("{} {}", uri.kind, uri.id));

        match uri.kind {
            ResourceKind::Credential => {
                let record = self.graph.get_credential(&uri.id).await?.ok_or_else(missing)?;
                Ok(Resource::Credential(record.payload))
            }
            ResourceKind::Boost => {
                let boost = self.graph.get_boost(&uri.id).await?.ok_or_else(missing)?;
                Ok(Resource::Boost(template::parse(&boost.template)?))
            }
            kind => {
                let document = self
                    .graph
                    .get_document(kind, &uri.id)
                    .await?
                    .ok_or_else(missing)?;

                Ok(match kind {
                    ResourceKind::Presentation => Resource::Presentation(document),
                    ResourceKind::Contract => Resource::Contract(document),
                    _ => Resource::Terms(document),
                })
            }
        }
    }

    async fn resolve_cloud(&self, uri: &str, parsed: &LcnUri) -> Result<Resource> {
        let domain = parsed.domain.replace("%3A", ":");
        let url = format!(
            "{}://{}/api/storage/resolve?uri={}",
            scheme_for(&domain),
            domain,
            urlencoding::encode(uri)
        );
        debug!(uri = %uri, url = %url, "Resolving cloud URI");

        let response = self.http_client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BrainError::NotFound(format!("{} {}", parsed.kind, parsed.id)));
        }
        if !response.status().is_success() {
            return Err(BrainError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body: Value = response.json().await?;
        let value = if is_jwe(&body) {
            self.identity.decrypt(&body).await?
        } else {
            body
        };

        Ok(Resource::Cloud(parsed.kind, value))
    }
}
