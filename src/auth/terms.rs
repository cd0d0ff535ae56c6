// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Terms-of-service acceptance, read from the registration contract's
//! `users` table.
//!
//! Each user owns at most one row, scoped by account, whose `status` holds
//! the terms version they accepted.

use std::sync::Arc;

use serde_json::Value;

use crate::blockchain::client::ChainRpc;
use crate::blockchain::name::Name;
use crate::blockchain::types::{TableQuery, USERS_TABLE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TermsError {
    #[error("{0} has not accepted the current terms")]
    NotAccepted(Name),

    #[error("More than one user row found for {0}")]
    Ambiguous(Name),

    #[error("Terms lookup failed: {0}")]
    Lookup(String),
}

/// Requires users to have accepted a given terms version.
#[derive(Clone)]
pub struct TermsCheck {
    rpc: Arc<dyn ChainRpc>,
    contract: Name,
    current: u32,
}

impl TermsCheck {
    pub fn new(rpc: Arc<dyn ChainRpc>, contract: Name, current: u32) -> Self {
        Self {
            rpc,
            contract,
            current,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Whether `account` accepted the current terms version.
    pub async fn accepted(&self, account: Name) -> Result<bool, TermsError> {
        let query = TableQuery::new(self.contract, account, USERS_TABLE);
        let table = self.rpc.get_table_rows(&query).await.map_err(|e| {
            tracing::warn!(account = %account, error = %e, "Terms lookup failed");
            TermsError::Lookup(e.to_string())
        })?;

        if table.more || table.rows.len() > 1 {
            tracing::warn!(account = %account, rows = table.rows.len(), "Ambiguous user rows");
            return Err(TermsError::Ambiguous(account));
        }

        let status = table.rows.first().and_then(row_status);
        tracing::debug!(account = %account, ?status, current = self.current, "Read terms status");
        Ok(status == Some(i64::from(self.current)))
    }

    /// Fail with [`TermsError::NotAccepted`] unless `account` accepted the
    /// current terms version.
    pub async fn check(&self, account: Name) -> Result<(), TermsError> {
        if self.accepted(account).await? {
            Ok(())
        } else {
            Err(TermsError::NotAccepted(account))
        }
    }
}

impl std::fmt::Debug for TermsCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermsCheck")
            .field("contract", &self.contract)
            .field("current", &self.current)
            .finish()
    }
}

/// `status` of a user row as a 32-bit integer. Contracts encode it either as
/// a number or as a decimal string; fractions are truncated.
fn row_status(row: &Value) -> Option<i64> {
    let status = row.get("status")?;
    let value = match status {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })?
        }
        _ => return None,
    };
    i32::try_from(value).ok().map(i64::from)
}
