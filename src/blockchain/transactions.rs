// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction submission and result classification.
//!
//! Every submission makes exactly one `push_transaction` call. The node's
//! outcome is mapped to a [`SubmitError`] the gateway can report without
//! forwarding raw node bodies.

use std::sync::Arc;

use super::client::{ChainRpc, RpcError};
use super::types::*;

/// Errors produced while submitting a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Transaction carries no signatures")]
    MissingSignature,

    #[error("CPU usage exceeded: {message}")]
    Cpu { message: String },

    #[error("Transaction rejected: {message}")]
    Rejected { message: String },

    #[error("Transaction was not processed")]
    InvalidKey,

    #[error("Chain node unavailable: {0}")]
    Transport(String),

    /// The node answered with a body that could not be read.
    #[error("Unreadable node response: {0}")]
    InvalidResponse(String),
}

/// Map a node response to a receipt or a classified failure.
pub fn classify(result: Result<PushTransactionResponse, RpcError>) -> Result<TxReceipt, SubmitError> {
    match result {
        Ok(PushTransactionResponse {
            transaction_id: Some(transaction_id),
            processed: Some(_),
        }) if !transaction_id.is_empty() => Ok(TxReceipt { transaction_id }),
        Ok(_) => Err(SubmitError::InvalidKey),
        Err(RpcError::Node(error)) if error.code == TX_CPU_USAGE_EXCEEDED => Err(SubmitError::Cpu {
            message: error.describe(),
        }),
        Err(RpcError::Node(error)) => Err(SubmitError::Rejected {
            message: error.describe(),
        }),
        Err(RpcError::InvalidResponse(message)) => Err(SubmitError::InvalidResponse(message)),
        Err(RpcError::Transport(message)) | Err(RpcError::InvalidUrl(message)) => {
            Err(SubmitError::Transport(message))
        }
    }
}

/// Pushes fully signed envelopes to the chain.
#[derive(Clone)]
pub struct ChainSubmitter {
    rpc: Arc<dyn ChainRpc>,
}

impl ChainSubmitter {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    /// Submit `envelope` once and classify the outcome. Never retries.
    pub async fn submit(&self, envelope: &SignedEnvelope) -> Result<TxReceipt, SubmitError> {
        if envelope.signatures.is_empty() {
            return Err(SubmitError::MissingSignature);
        }

        let result = classify(self.rpc.push_transaction(envelope).await);
        match &result {
            Ok(receipt) => tracing::info!(tx_id = %receipt.transaction_id, "Transaction pushed"),
            Err(e) => tracing::warn!(error = %e, "Transaction push failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::client::ChainError;
    use crate::blockchain::name::Name;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeNode {
        pushes: AtomicUsize,
        response: Mutex<Option<Result<PushTransactionResponse, RpcError>>>,
    }

    impl FakeNode {
        fn answering(response: Result<PushTransactionResponse, RpcError>) -> Arc<Self> {
            Arc::new(Self {
                pushes: AtomicUsize::new(0),
                response: Mutex::new(Some(response)),
            })
        }
    }

    #[async_trait]
    impl ChainRpc for FakeNode {
        async fn get_info(&self) -> Result<ChainInfo, RpcError> {
            Err(RpcError::Transport("unused".to_string()))
        }

        async fn get_account(&self, _account: Name) -> Result<PermissionRecord, RpcError> {
            Err(RpcError::Transport("unused".to_string()))
        }

        async fn get_table_rows(&self, _query: &TableQuery) -> Result<TableRows, RpcError> {
            Err(RpcError::Transport("unused".to_string()))
        }

        async fn push_transaction(
            &self,
            _envelope: &SignedEnvelope,
        ) -> Result<PushTransactionResponse, RpcError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(RpcError::Transport("pushed twice".to_string())))
        }
    }

    fn envelope() -> SignedEnvelope {
        SignedEnvelope::new(vec![1, 2, 3], vec!["SIG_K1_a".to_string(), "SIG_K1_b".to_string()])
    }

    fn node_error(code: i64, detail: &str) -> RpcError {
        RpcError::Node(ChainError {
            code,
            name: "tx_error".to_string(),
            what: "Transaction error".to_string(),
            message: "Internal Service Error".to_string(),
            details: vec![detail.to_string()],
        })
    }

    #[tokio::test]
    async fn successful_push_returns_receipt() {
        let node = FakeNode::answering(Ok(PushTransactionResponse {
            transaction_id: Some("abc123".to_string()),
            processed: Some(serde_json::json!({ "id": "abc123" })),
        }));
        let submitter = ChainSubmitter::new(node.clone());

        let receipt = submitter.submit(&envelope()).await.unwrap();
        assert_eq!(receipt.transaction_id, "abc123");
        assert_eq!(node.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cpu_exhaustion_is_classified_and_not_retried() {
        let node = FakeNode::answering(Err(node_error(
            TX_CPU_USAGE_EXCEEDED,
            "billed CPU time (1200 us) is greater than the maximum",
        )));
        let submitter = ChainSubmitter::new(node.clone());

        let err = submitter.submit(&envelope()).await.unwrap_err();
        assert_eq!(
            err,
            SubmitError::Cpu {
                message: "billed CPU time (1200 us) is greater than the maximum".to_string()
            }
        );
        assert_eq!(node.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_signatures_never_reach_the_node() {
        let node = FakeNode::answering(Err(RpcError::Transport("unused".to_string())));
        let submitter = ChainSubmitter::new(node.clone());

        let err = submitter
            .submit(&SignedEnvelope::new(vec![1], vec![]))
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::MissingSignature);
        assert_eq!(node.pushes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn classification_table() {
        assert!(matches!(
            classify(Err(node_error(3_050_003, "assertion failure"))),
            Err(SubmitError::Rejected { message }) if message == "assertion failure"
        ));
        assert_eq!(
            classify(Ok(PushTransactionResponse::default())),
            Err(SubmitError::InvalidKey)
        );
        assert_eq!(
            classify(Ok(PushTransactionResponse {
                transaction_id: Some("id".to_string()),
                processed: None,
            })),
            Err(SubmitError::InvalidKey)
        );
        assert!(matches!(
            classify(Err(RpcError::Transport("connection refused".to_string()))),
            Err(SubmitError::Transport(_))
        ));
        assert!(matches!(
            classify(Err(RpcError::InvalidResponse("garbage".to_string()))),
            Err(SubmitError::InvalidResponse(_))
        ));
    }
}
