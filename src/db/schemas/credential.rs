//! Credential instance and transfer documents

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::graph::{CredentialRecord, Transfer};

pub const CREDENTIAL_COLLECTION: &str = "credentials";
pub const TRANSFER_COLLECTION: &str = "transfers";

/// Credential node with its `instanceOf` edge inlined
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CredentialDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub credential: CredentialRecord,
}

impl CredentialDoc {
    pub fn new(credential: CredentialRecord) -> Self {
        Self {
            _id: credential.id.clone(),
            metadata: Metadata::new(),
            credential,
        }
    }
}

impl IntoIndexes for CredentialDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "boostId": 1 },
            Some(IndexOptions::builder().name("boost_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for CredentialDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// `sentTo` edge; `receivedAt` is set when the recipient accepts.
/// Timestamps are BSON dates so listings sort in the database.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransferDoc {
    #[serde(rename = "_id")]
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub credential_id: String,

    pub from: String,

    pub to: String,

    pub sent_at: DateTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime>,

    /// Sender-supplied metadata of the transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_metadata: Option<serde_json::Value>,
}

impl TransferDoc {
    pub fn new(transfer: Transfer) -> Self {
        Self {
            _id: Self::key(&transfer.credential_id, &transfer.to),
            metadata: Metadata::new(),
            credential_id: transfer.credential_id,
            from: transfer.from,
            to: transfer.to,
            sent_at: DateTime::from_chrono(transfer.sent_at),
            received_at: transfer.received_at.map(DateTime::from_chrono),
            transfer_metadata: transfer.metadata,
        }
    }

    pub fn into_transfer(self) -> Transfer {
        Transfer {
            credential_id: self.credential_id,
            from: self.from,
            to: self.to,
            sent_at: self.sent_at.to_chrono(),
            received_at: self.received_at.map(|at| at.to_chrono()),
            metadata: self.transfer_metadata,
        }
    }

    pub fn key(credential_id: &str, to: &str) -> String {
        format!("{}|{}", credential_id, to)
    }
}

impl IntoIndexes for TransferDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "to": 1, "sentAt": -1 },
                Some(IndexOptions::builder().name("to_sent_index".to_string()).build()),
            ),
            (
                doc! { "from": 1, "sentAt": -1 },
                Some(IndexOptions::builder().name("from_sent_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for TransferDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_transfer_dates_are_bson_dates() {
        let sent_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let transfer = Transfer {
            credential_id: "c1".into(),
            from: "usera".into(),
            to: "userb".into(),
            sent_at,
            received_at: None,
            metadata: Some(serde_json::json!({ "note": "hi" })),
        };

        let encoded = bson::to_document(&TransferDoc::new(transfer.clone())).unwrap();
        assert_eq!(encoded.get_str("_id").unwrap(), "c1|userb");
        assert!(encoded.get_datetime("sentAt").is_ok());
        assert!(!encoded.contains_key("receivedAt"));
        assert!(encoded.get_document("metadata").unwrap().contains_key("is_deleted"));

        let decoded: TransferDoc = bson::from_document(encoded).unwrap();
        assert_eq!(decoded.into_transfer(), transfer);
    }
}
