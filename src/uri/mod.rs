//! Canonical resource URIs
//!
//! Every resource on the network is addressed as
//! `lc:network:<domain>/trpc:<kind>:<id>`. Off-protocol resources stored in
//! LearnCloud use the `cloud` method instead of `network`.
//!
//! A raw `localhost:<port>` domain would add a sixth colon-separated
//! segment, so it is always carried as `localhost%3A<port>`.

pub mod resolver;

pub use resolver::{Resource, UriResolver};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{BrainError, Result};

/// Scheme prefix shared by every URI
const SCHEME: &str = "lc";

/// Suffix carried by the domain segment
const DOMAIN_SUFFIX: &str = "/trpc";

/// Kinds of resource addressable by a URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Credential,
    Presentation,
    Boost,
    Contract,
    Terms,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Presentation => "presentation",
            Self::Boost => "boost",
            Self::Contract => "contract",
            Self::Terms => "terms",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "credential" => Ok(Self::Credential),
            "presentation" => Ok(Self::Presentation),
            "boost" => Ok(Self::Boost),
            "contract" => Ok(Self::Contract),
            "terms" => Ok(Self::Terms),
            other => Err(BrainError::BadRequest(format!("Unknown URI type: {}", other))),
        }
    }
}

/// Resolution method of a URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UriMethod {
    /// Resolved by this network
    Network,
    /// Resolved out of protocol through LearnCloud storage
    Cloud,
}

impl UriMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Cloud => "cloud",
        }
    }
}

impl FromStr for UriMethod {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "network" => Ok(Self::Network),
            "cloud" => Ok(Self::Cloud),
            other => Err(BrainError::BadRequest(format!("Unknown URI method: {}", other))),
        }
    }
}

/// A parsed resource URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LcnUri {
    /// Domain, with any `localhost:` colon escaped
    pub domain: String,
    pub kind: ResourceKind,
    pub id: String,
    pub method: UriMethod,
}

impl LcnUri {
    /// Fail unless this URI addresses the given kind
    pub fn expect_kind(&self, kind: ResourceKind) -> Result<&Self> {
        if self.kind == kind {
            Ok(self)
        } else {
            Err(BrainError::BadRequest(format!(
                "URI is of type {}, expected {}",
                self.kind, kind
            )))
        }
    }
}

impl fmt::Display for LcnUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}{}:{}:{}",
            SCHEME,
            self.method.as_str(),
            self.domain,
            DOMAIN_SUFFIX,
            self.kind,
            self.id
        )
    }
}

/// Percent-escape `localhost:` so the port colon does not split the URI
pub fn escape_localhost(value: &str) -> String {
    value.replace("localhost:", "localhost%3A")
}

/// Parse a URI that must belong to the local network domain
pub fn parse(uri: &str, local_domain: &str) -> Result<LcnUri> {
    parse_with(uri, local_domain, false)
}

/// Parse a URI, optionally accepting other domains and the `cloud` method
pub fn parse_with(uri: &str, local_domain: &str, allow_outside: bool) -> Result<LcnUri> {
    let escaped = escape_localhost(uri);
    let parts: Vec<&str> = escaped.split(':').collect();

    if parts.len() != 5 {
        return Err(BrainError::BadRequest(format!(
            "Invalid URI: expected 5 segments, found {}",
            parts.len()
        )));
    }

    if parts[0] != SCHEME {
        return Err(BrainError::BadRequest(format!(
            "Invalid URI scheme: {}",
            parts[0]
        )));
    }

    let method: UriMethod = parts[1].parse()?;
    let domain = parts[2].strip_suffix(DOMAIN_SUFFIX).unwrap_or(parts[2]);
    let kind: ResourceKind = parts[3].parse()?;
    let id = parts[4];

    if domain.is_empty() || id.is_empty() {
        return Err(BrainError::BadRequest(
            "Invalid URI: empty domain or id".to_string(),
        ));
    }

    if !allow_outside {
        if method != UriMethod::Network {
            return Err(BrainError::BadRequest(format!(
                "URI method {} is not resolvable here",
                method.as_str()
            )));
        }
        if domain != escape_localhost(local_domain) {
            return Err(BrainError::BadRequest(format!(
                "URI domain {} does not match this network ({})",
                domain, local_domain
            )));
        }
    }

    Ok(LcnUri {
        domain: domain.to_string(),
        kind,
        id: id.to_string(),
        method,
    })
}

/// Build the canonical network URI of a resource
pub fn construct(kind: ResourceKind, id: &str, domain: &str) -> String {
    LcnUri {
        domain: escape_localhost(domain),
        kind,
        id: id.to_string(),
        method: UriMethod::Network,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "network.learncard.com";

    #[test]
    fn test_construct_and_parse_round_trip() {
        let kinds = [
            ResourceKind::Credential,
            ResourceKind::Presentation,
            ResourceKind::Boost,
            ResourceKind::Contract,
            ResourceKind::Terms,
        ];

        for kind in kinds {
            let uri = construct(kind, "abc-123", DOMAIN);
            let parsed = parse(&uri, DOMAIN).unwrap();
            assert_eq!(
                parsed,
                LcnUri {
                    domain: DOMAIN.to_string(),
                    kind,
                    id: "abc-123".to_string(),
                    method: UriMethod::Network,
                }
            );
        }
    }

    #[test]
    fn test_canonical_format() {
        assert_eq!(
            construct(ResourceKind::Boost, "8adff1c1", DOMAIN),
            "lc:network:network.learncard.com/trpc:boost:8adff1c1"
        );
    }

    #[test]
    fn test_localhost_is_escaped() {
        let uri = construct(ResourceKind::Credential, "c1", "localhost:3000");
        assert_eq!(uri, "lc:network:localhost%3A3000/trpc:credential:c1");

        // Raw colon in the input is escaped before splitting
        let parsed = parse("lc:network:localhost:3000/trpc:credential:c1", "localhost:3000").unwrap();
        assert_eq!(parsed.domain, "localhost%3A3000");
        assert_eq!(parsed.id, "c1");
    }

    #[test]
    fn test_wrong_segment_count_is_bad_request() {
        let err = parse("lc:network:example.com/trpc:credential", DOMAIN).unwrap_err();
        assert!(matches!(err, BrainError::BadRequest(_)));

        let err = parse("lc:network:a:b:c:d", DOMAIN).unwrap_err();
        assert!(matches!(err, BrainError::BadRequest(_)));
    }

    #[test]
    fn test_unknown_type_is_bad_request() {
        let err = parse("lc:network:network.learncard.com/trpc:widget:1", DOMAIN).unwrap_err();
        assert!(matches!(err, BrainError::BadRequest(_)));
    }

    #[test]
    fn test_outside_domain_requires_flag() {
        let uri = "lc:network:other.example.com/trpc:credential:1";
        assert!(matches!(parse(uri, DOMAIN), Err(BrainError::BadRequest(_))));

        let parsed = parse_with(uri, DOMAIN, true).unwrap();
        assert_eq!(parsed.domain, "other.example.com");
    }

    #[test]
    fn test_cloud_method_requires_flag() {
        let uri = "lc:cloud:cloud.learncard.com/trpc:credential:1";
        assert!(matches!(parse(uri, DOMAIN), Err(BrainError::BadRequest(_))));

        let parsed = parse_with(uri, DOMAIN, true).unwrap();
        assert_eq!(parsed.method, UriMethod::Cloud);
        assert_eq!(parsed.to_string(), uri);
    }

    #[test]
    fn test_expect_kind() {
        let parsed = parse(&construct(ResourceKind::Boost, "b", DOMAIN), DOMAIN).unwrap();
        assert!(parsed.expect_kind(ResourceKind::Boost).is_ok());
        assert!(matches!(
            parsed.expect_kind(ResourceKind::Credential),
            Err(BrainError::BadRequest(_))
        ));
    }
}
