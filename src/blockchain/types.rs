// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::keys::PublicKey;
use super::name::Name;

/// Error code the chain reports when a transaction exceeds its CPU budget.
pub const TX_CPU_USAGE_EXCEEDED: i64 = 3_080_004;

/// Error code for an account lookup that matched nothing.
pub const ACCOUNT_QUERY_EXCEPTION: i64 = 3_060_002;

/// Error code for a malformed name, which can never match an account.
pub const NAME_TYPE_EXCEPTION: i64 = 3_010_001;

/// Registration contract table holding one row per user.
pub const USERS_TABLE: Name = Name::from_static("users");

/// 32-byte chain identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId([u8; 32]);

impl ChainId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid chain id: {e}"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("chain id must be 32 bytes, got {}", b.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({self})")
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Subset of the node's `get_info` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: ChainId,
    #[serde(default)]
    pub head_block_num: u32,
    #[serde(default)]
    pub last_irreversible_block_num: u32,
    #[serde(default)]
    pub server_version_string: Option<String>,
}

/// A key entry in an on-chain authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: String,
    pub weight: u16,
}

/// The authority required to satisfy a permission level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    #[serde(default)]
    pub keys: Vec<KeyWeight>,
    #[serde(default)]
    pub accounts: Vec<serde_json::Value>,
    #[serde(default)]
    pub waits: Vec<serde_json::Value>,
}

/// One named permission of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub perm_name: Name,
    #[serde(default)]
    pub parent: Name,
    pub required_auth: Authority,
}

impl Permission {
    /// Whether `key` is one of the keys listed for this permission.
    ///
    /// Keys are compared structurally, so legacy and `PUB_K1_` spellings of
    /// the same key match. Entries the node returns in an unknown format are
    /// skipped.
    pub fn authorizes(&self, key: &PublicKey) -> bool {
        self.required_auth.keys.iter().any(|entry| {
            match entry.key.parse::<PublicKey>() {
                Ok(listed) => listed == *key,
                Err(e) => {
                    tracing::debug!(key = %entry.key, error = %e, "Skipping unparseable permission key");
                    false
                }
            }
        })
    }
}

/// An account's current permission to key mapping, as reported by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub account_name: Name,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl PermissionRecord {
    pub fn permission(&self, name: Name) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.perm_name == name)
    }
}

/// `get_table_rows` request for one contract table scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableQuery {
    pub code: Name,
    pub scope: Name,
    pub table: Name,
    /// Ask the node to decode rows with the contract ABI.
    pub json: bool,
    pub limit: u32,
}

impl TableQuery {
    /// JSON-decoded rows of `table` in `scope` of contract `code`.
    pub fn new(code: Name, scope: Name, table: Name) -> Self {
        Self {
            code,
            scope,
            table,
            json: true,
            limit: 10,
        }
    }
}

/// `get_table_rows` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableRows {
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
    /// Whether the node holds rows beyond this page.
    #[serde(default, deserialize_with = "more_flag")]
    pub more: bool,
}

/// Older nodes report `more` as a boolean, newer ones as the next key.
fn more_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(more) => more,
        serde_json::Value::String(next) => !next.is_empty(),
        serde_json::Value::Null => false,
        _ => true,
    })
}

/// A transaction body plus its ordered signatures.
///
/// Position 0 holds the service co-signature once one has been added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub serialized_transaction: Vec<u8>,
    pub signatures: Vec<String>,
}

impl SignedEnvelope {
    pub fn new(serialized_transaction: Vec<u8>, signatures: Vec<String>) -> Self {
        Self {
            serialized_transaction,
            signatures,
        }
    }

    /// A copy of this envelope with `signature` prepended.
    pub fn with_leading_signature(&self, signature: String) -> Self {
        let mut signatures = Vec::with_capacity(self.signatures.len() + 1);
        signatures.push(signature);
        signatures.extend(self.signatures.iter().cloned());
        Self {
            serialized_transaction: self.serialized_transaction.clone(),
            signatures,
        }
    }
}

/// Raw `push_transaction` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushTransactionResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub processed: Option<serde_json::Value>,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    #[serde(rename = "txId")]
    pub transaction_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::keys::tests::DEV_PUBLIC;

    #[test]
    fn table_rows_accept_both_more_styles() {
        let old: TableRows =
            serde_json::from_str(r#"{"rows":[{"status":1}],"more":false}"#).unwrap();
        assert_eq!(old.rows.len(), 1);
        assert!(!old.more);

        let paged: TableRows =
            serde_json::from_str(r#"{"rows":[],"more":true,"next_key":"7"}"#).unwrap();
        assert!(paged.more);

        let keyed: TableRows = serde_json::from_str(r#"{"rows":[],"more":""}"#).unwrap();
        assert!(!keyed.more);

        let bare: TableRows = serde_json::from_str(r#"{"rows":[]}"#).unwrap();
        assert!(!bare.more);
    }

    #[test]
    fn chain_id_hex_round_trip() {
        let raw = "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906";
        let id: ChainId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!("abcd".parse::<ChainId>().is_err());
        assert!("zz".parse::<ChainId>().is_err());
    }

    #[test]
    fn permission_record_from_node_json() {
        let json = serde_json::json!({
            "account_name": "alice",
            "head_block_num": 10,
            "permissions": [
                {
                    "perm_name": "active",
                    "parent": "owner",
                    "required_auth": {
                        "threshold": 1,
                        "keys": [{ "key": DEV_PUBLIC, "weight": 1 }],
                        "accounts": [],
                        "waits": []
                    }
                },
                {
                    "perm_name": "owner",
                    "parent": "",
                    "required_auth": { "threshold": 1, "keys": [] }
                }
            ]
        });

        let record: PermissionRecord = serde_json::from_value(json).unwrap();
        let key: PublicKey = DEV_PUBLIC.parse().unwrap();

        let active = record.permission("active".parse().unwrap()).unwrap();
        assert!(active.authorizes(&key));
        let owner = record.permission("owner".parse().unwrap()).unwrap();
        assert!(!owner.authorizes(&key));
        assert!(record.permission("trade".parse().unwrap()).is_none());
    }

    #[test]
    fn leading_signature_leaves_original_untouched() {
        let original = SignedEnvelope::new(vec![1, 2, 3], vec!["user".to_string()]);
        let cosigned = original.with_leading_signature("service".to_string());

        assert_eq!(cosigned.signatures, vec!["service", "user"]);
        assert_eq!(original.signatures, vec!["user"]);
        assert_eq!(cosigned.serialized_transaction, original.serialized_transaction);
    }
}
