// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the chain node's `/v1/chain` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::name::Name;
use super::types::*;

/// Default timeout for a single node request.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// Chain node operations the gateway depends on.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Fetch the node's chain info (chain id, head block).
    async fn get_info(&self) -> Result<ChainInfo, RpcError>;

    /// Fetch the permission record of an account.
    async fn get_account(&self, account: Name) -> Result<PermissionRecord, RpcError>;

    /// Read rows of a contract table.
    async fn get_table_rows(&self, query: &TableQuery) -> Result<TableRows, RpcError>;

    /// Submit a signed transaction. Called exactly once per submission.
    async fn push_transaction(
        &self,
        envelope: &SignedEnvelope,
    ) -> Result<PushTransactionResponse, RpcError>;
}

/// An application-level error reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainError {
    pub code: i64,
    pub name: String,
    pub what: String,
    pub message: String,
    pub details: Vec<String>,
}

impl ChainError {
    /// Whether the node says the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.code, ACCOUNT_QUERY_EXCEPTION | NAME_TYPE_EXCEPTION)
    }

    /// Most specific human-readable description available.
    pub fn describe(&self) -> String {
        self.details
            .first()
            .cloned()
            .filter(|d| !d.is_empty())
            .or_else(|| Some(self.what.clone()).filter(|w| !w.is_empty()))
            .unwrap_or_else(|| self.message.clone())
    }
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.code, self.describe())
    }
}

/// Errors returned by [`ChainRpc`] implementations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid node URL: {0}")]
    InvalidUrl(String),

    #[error("Node unreachable: {0}")]
    Transport(String),

    #[error("Node error: {0}")]
    Node(ChainError),

    #[error("Invalid node response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: Option<ErrorInner>,
}

#[derive(Debug, Deserialize)]
struct ErrorInner {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    what: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl From<ErrorBody> for ChainError {
    fn from(body: ErrorBody) -> Self {
        let inner = body.error;
        Self {
            code: inner.as_ref().map_or(0, |e| e.code),
            name: inner.as_ref().map(|e| e.name.clone()).unwrap_or_default(),
            what: inner.as_ref().map(|e| e.what.clone()).unwrap_or_default(),
            message: body.message,
            details: inner
                .map(|e| e.details.into_iter().map(|d| d.message).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct GetAccountRequest {
    account_name: Name,
}

#[derive(Serialize)]
struct PushTransactionRequest<'a> {
    signatures: &'a [String],
    compression: u8,
    packed_context_free_data: &'static str,
    packed_trx: String,
}

/// [`ChainRpc`] over the node's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct NodeRpc {
    base_url: String,
    http: Client,
}

impl NodeRpc {
    /// Create a client for the node at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, RpcError> {
        Self::with_timeout(base_url, DEFAULT_RPC_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let parsed: url::Url = base_url
            .parse()
            .map_err(|e: url::ParseError| RpcError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RpcError::InvalidUrl(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B, T>(&self, path: &str, body: &B) -> Result<T, RpcError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(format!("{}/v1/chain/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{path} request failed: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(format!("{path} body read failed: {e}")))?;

        if !status.is_success() {
            return match serde_json::from_slice::<ErrorBody>(&bytes) {
                Ok(body) => Err(RpcError::Node(body.into())),
                Err(_) => {
                    tracing::warn!(
                        path,
                        status = %status,
                        body = %body_excerpt(&bytes),
                        "Node returned an unreadable error body"
                    );
                    Err(RpcError::InvalidResponse(format!("{path} returned {status}")))
                }
            };
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(path, error = %e, body = %body_excerpt(&bytes), "Node returned an unreadable body");
            RpcError::InvalidResponse(format!("{path} returned an unreadable body"))
        })
    }
}

/// Bytes of a node body kept for logs.
const BODY_EXCERPT_LEN: usize = 512;

fn body_excerpt(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[..bytes.len().min(BODY_EXCERPT_LEN)]).into_owned()
}

#[async_trait]
impl ChainRpc for NodeRpc {
    async fn get_info(&self) -> Result<ChainInfo, RpcError> {
        self.call("get_info", &serde_json::json!({})).await
    }

    async fn get_account(&self, account: Name) -> Result<PermissionRecord, RpcError> {
        self.call("get_account", &GetAccountRequest { account_name: account })
            .await
    }

    async fn get_table_rows(&self, query: &TableQuery) -> Result<TableRows, RpcError> {
        self.call("get_table_rows", query).await
    }

    async fn push_transaction(
        &self,
        envelope: &SignedEnvelope,
    ) -> Result<PushTransactionResponse, RpcError> {
        let request = PushTransactionRequest {
            signatures: &envelope.signatures,
            compression: 0,
            packed_context_free_data: "",
            packed_trx: hex::encode(&envelope.serialized_transaction),
        };
        self.call("push_transaction", &request).await
    }
}
