//! Nodes and edges of the network graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::BrainError;

/// Role granted to boost admins
pub const ADMIN_ROLE_ID: &str = "admin";

/// Role granted to the profile that created a boost
pub const CREATOR_ROLE_ID: &str = "creator";

/// A network identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Unique handle
    pub profile_id: String,
    /// Controlling `did:key`
    pub did: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub short_bio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A managed identity that is a child of a boost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileManager {
    pub id: String,
    pub did: String,
    /// Boost this manager is `childOf`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_of: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A reusable credential template owned by an issuing profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boost {
    pub id: String,
    /// Profile id of the issuer
    pub owner: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Credential JSON, possibly containing `{{variable}}` placeholders
    pub template: String,
    /// Role granted to every profile that claims an instance of this boost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_role: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Permissions a role carries on a boost
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostPermissions {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_issue: bool,
    #[serde(default)]
    pub can_revoke: bool,
    #[serde(default)]
    pub can_manage_permissions: bool,
    #[serde(default)]
    pub can_view_analytics: bool,
}

impl BoostPermissions {
    /// Full permissions under the given role name
    pub fn all(role: &str) -> Self {
        Self {
            role: role.to_string(),
            can_edit: true,
            can_issue: true,
            can_revoke: true,
            can_manage_permissions: true,
            can_view_analytics: true,
        }
    }

    /// Combine two permission sets, granting whatever either grants
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            role: if self.role.is_empty() {
                other.role.clone()
            } else {
                self.role.clone()
            },
            can_edit: self.can_edit || other.can_edit,
            can_issue: self.can_issue || other.can_issue,
            can_revoke: self.can_revoke || other.can_revoke,
            can_manage_permissions: self.can_manage_permissions || other.can_manage_permissions,
            can_view_analytics: self.can_view_analytics || other.can_view_analytics,
        }
    }

    /// Whether every permission granted by `other` is also granted here
    pub fn covers(&self, other: &Self) -> bool {
        (!other.can_edit || self.can_edit)
            && (!other.can_issue || self.can_issue)
            && (!other.can_revoke || self.can_revoke)
            && (!other.can_manage_permissions || self.can_manage_permissions)
            && (!other.can_view_analytics || self.can_view_analytics)
    }
}

/// A named permission set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub permissions: BoostPermissions,
}

impl Role {
    pub fn admin() -> Self {
        Self {
            id: ADMIN_ROLE_ID.to_string(),
            permissions: BoostPermissions::all("Admin"),
        }
    }

    pub fn creator() -> Self {
        Self {
            id: CREATOR_ROLE_ID.to_string(),
            permissions: BoostPermissions::all("Creator"),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.id == ADMIN_ROLE_ID || self.id == CREATOR_ROLE_ID
    }
}

/// `hasRole` edge from a profile to a boost
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrant {
    pub profile_id: String,
    pub boost_id: String,
    pub role_id: String,
}

/// Effect a claim hook applies when its boost is claimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimHookType {
    GrantPermissions,
    AddAdmin,
    AutoConnect,
}

impl ClaimHookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GrantPermissions => "GRANT_PERMISSIONS",
            Self::AddAdmin => "ADD_ADMIN",
            Self::AutoConnect => "AUTO_CONNECT",
        }
    }
}

impl fmt::Display for ClaimHookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimHookType {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GRANT_PERMISSIONS" => Ok(Self::GrantPermissions),
            "ADD_ADMIN" => Ok(Self::AddAdmin),
            "AUTO_CONNECT" => Ok(Self::AutoConnect),
            other => Err(BrainError::BadRequest(format!("Unknown claim hook type: {}", other))),
        }
    }
}

/// Rule fired when an instance of `hook_for` is claimed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimHook {
    pub id: String,
    #[serde(rename = "type")]
    pub hook_type: ClaimHookType,
    /// Boost whose claim fires this hook
    pub hook_for: String,
    /// Boost whose role or connection graph is mutated
    pub target: String,
    /// Role granted by GRANT_PERMISSIONS hooks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_to_grant: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An issued credential instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    /// Signed or unsigned VC, or a JWE
    pub payload: serde_json::Value,
    /// Boost this credential is an `instanceOf`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost_id: Option<String>,
    /// Profile id of the sender
    pub issuer: String,
    pub created_at: DateTime<Utc>,
}

/// `sentTo` / `receivedBy` state of one credential for one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub credential_id: String,
    pub from: String,
    pub to: String,
    pub sent_at: DateTime<Utc>,
    /// Set once the recipient accepts; never cleared afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Transfer {
    pub fn is_received(&self) -> bool {
        self.received_at.is_some()
    }
}

/// Filter for listing transfers, newest first
#[derive(Debug, Clone, Default)]
pub struct TransferQuery {
    pub from: Option<Vec<String>>,
    pub to: Option<Vec<String>>,
    /// `Some(true)` for accepted only, `Some(false)` for pending only
    pub received: Option<bool>,
    pub limit: usize,
}

impl TransferQuery {
    pub fn matches(&self, transfer: &Transfer) -> bool {
        self.from.as_ref().map_or(true, |f| f.contains(&transfer.from))
            && self.to.as_ref().map_or(true, |t| t.contains(&transfer.to))
            && self.received.map_or(true, |r| r == transfer.is_received())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_merge_and_cover() {
        let issue = BoostPermissions {
            can_issue: true,
            ..Default::default()
        };
        let edit = BoostPermissions {
            role: "Editor".into(),
            can_edit: true,
            ..Default::default()
        };

        let merged = issue.merge(&edit);
        assert!(merged.can_issue && merged.can_edit);
        assert_eq!(merged.role, "Editor");

        assert!(merged.covers(&issue));
        assert!(!issue.covers(&edit));
        assert!(BoostPermissions::all("Admin").covers(&merged));
    }

    #[test]
    fn test_hook_type_wire_names() {
        let json = serde_json::to_string(&ClaimHookType::GrantPermissions).unwrap();
        assert_eq!(json, "\"GRANT_PERMISSIONS\"");
        assert_eq!("AUTO_CONNECT".parse::<ClaimHookType>().unwrap(), ClaimHookType::AutoConnect);
        assert!("NOPE".parse::<ClaimHookType>().is_err());
    }
}
