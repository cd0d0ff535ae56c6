// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-chain permission lookup and key matching.
//!
//! Records are fetched fresh for every authentication attempt. Permission
//! changes on chain take effect immediately.

use std::sync::Arc;

use crate::blockchain::client::{ChainRpc, RpcError};
use crate::blockchain::keys::PublicKey;
use crate::blockchain::name::Name;
use crate::blockchain::types::PermissionRecord;

/// Outcome of a failed lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Account not found: {0}")]
    NotFound(Name),

    #[error("Permission lookup failed: {0}")]
    Transport(String),
}

/// Why a recovered key does not authorize a permission level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Account {account} has no {permission} permission")]
    MissingPermission { account: Name, permission: Name },

    #[error("Key is not listed for {account}@{permission}")]
    KeyNotAuthorized { account: Name, permission: Name },
}

/// Reads account permission records from the chain.
#[derive(Clone)]
pub struct PermissionOracle {
    rpc: Arc<dyn ChainRpc>,
}

impl PermissionOracle {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    pub async fn lookup(&self, account: Name) -> Result<PermissionRecord, LookupError> {
        match self.rpc.get_account(account).await {
            Ok(record) => Ok(record),
            Err(RpcError::Node(error)) if error.is_not_found() => {
                tracing::debug!(account = %account, "Account not found on chain");
                Err(LookupError::NotFound(account))
            }
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "Permission lookup failed");
                Err(LookupError::Transport(e.to_string()))
            }
        }
    }
}

/// Check that `key` is listed under `permission` of `record`.
///
/// Matching is exact: a key on a parent permission does not satisfy a child.
pub fn match_key(
    record: &PermissionRecord,
    permission: Name,
    key: &PublicKey,
) -> Result<(), MatchError> {
    let entry = record
        .permission(permission)
        .ok_or(MatchError::MissingPermission {
            account: record.account_name,
            permission,
        })?;

    if entry.authorizes(key) {
        Ok(())
    } else {
        Err(MatchError::KeyNotAuthorized {
            account: record.account_name,
            permission,
        })
    }
}
