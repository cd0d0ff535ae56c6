// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway errors.
//!
//! Component errors roll up into [`GatewayError`]. Callers see a
//! machine-readable [`ErrorKind`] plus optional details; raw node bodies are
//! never forwarded.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::{LookupError, MatchError, PolicyError, TermsError};
use crate::blockchain::{CryptoError, DecodeError, Name, RpcError, SubmitError};
use crate::channel::ChannelError;

/// Machine-readable error kinds reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TxInvalid,
    AuthInvalid,
    Timeout,
    WsDown,
    Cpu,
    InvalidKey,
    InvalidPermissionLevel,
    TosNotSigned,
    Generic,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::TxInvalid => "ERR_TX_INVALID",
            ErrorKind::AuthInvalid => "ERR_AUTH_INVALID",
            ErrorKind::Timeout => "ERR_TIMEOUT",
            ErrorKind::WsDown => "ERR_WS_DOWN",
            ErrorKind::Cpu => "ERR_CPU",
            ErrorKind::InvalidKey => "ERR_INVALID_KEY",
            ErrorKind::InvalidPermissionLevel => "ERR_INVALID_PERMISSION_LEVEL",
            ErrorKind::TosNotSigned => "ERR_TOS_NOT_SIGNED",
            ErrorKind::Generic => "ERR_GENERIC",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::TxInvalid | ErrorKind::InvalidKey => StatusCode::BAD_REQUEST,
            ErrorKind::AuthInvalid
            | ErrorKind::InvalidPermissionLevel
            | ErrorKind::TosNotSigned => StatusCode::FORBIDDEN,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::WsDown | ErrorKind::Cpu => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Generic => StatusCode::BAD_GATEWAY,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Every way a gateway operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Wrong serialized transaction data: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transaction rejected: {0}")]
    Policy(#[from] PolicyError),

    #[error("Signature rejected: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Account not found: {0}")]
    UnknownAccount(Name),

    #[error(transparent)]
    Permission(#[from] MatchError),

    #[error("Terms of service not accepted by {0}")]
    TosNotSigned(Name),

    #[error("Invalid claim: {0}")]
    InvalidClaim(String),

    #[error("Claim rejected by verifier")]
    ClaimRejected,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl From<LookupError> for GatewayError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::NotFound(account) => GatewayError::UnknownAccount(account),
            LookupError::Transport(message) => GatewayError::Upstream(message),
        }
    }
}

impl From<TermsError> for GatewayError {
    fn from(e: TermsError) -> Self {
        match e {
            TermsError::NotAccepted(account) => GatewayError::TosNotSigned(account),
            other => GatewayError::Upstream(other.to_string()),
        }
    }
}

impl From<RpcError> for GatewayError {
    fn from(e: RpcError) -> Self {
        GatewayError::Upstream(e.to_string())
    }
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Decode(_) | GatewayError::Policy(_) | GatewayError::InvalidClaim(_) => {
                ErrorKind::TxInvalid
            }
            GatewayError::Crypto(CryptoError::Signing(_)) => ErrorKind::Generic,
            GatewayError::Crypto(_)
            | GatewayError::UnknownAccount(_)
            | GatewayError::ClaimRejected
            | GatewayError::Permission(MatchError::KeyNotAuthorized { .. }) => {
                ErrorKind::AuthInvalid
            }
            GatewayError::Permission(MatchError::MissingPermission { .. }) => {
                ErrorKind::InvalidPermissionLevel
            }
            GatewayError::TosNotSigned(_) => ErrorKind::TosNotSigned,
            GatewayError::Channel(ChannelError::Timeout) => ErrorKind::Timeout,
            GatewayError::Channel(ChannelError::NotOpen | ChannelError::Closed) => {
                ErrorKind::WsDown
            }
            GatewayError::Channel(_) => ErrorKind::Generic,
            GatewayError::Submit(SubmitError::Cpu { .. }) => ErrorKind::Cpu,
            GatewayError::Submit(SubmitError::Rejected { .. } | SubmitError::MissingSignature) => {
                ErrorKind::TxInvalid
            }
            GatewayError::Submit(SubmitError::InvalidKey) => ErrorKind::InvalidKey,
            GatewayError::Submit(SubmitError::Transport(_) | SubmitError::InvalidResponse(_))
            | GatewayError::Upstream(_) => ErrorKind::Generic,
        }
    }

    /// Human-readable details safe to show a client.
    pub fn details(&self) -> Vec<String> {
        match self {
            GatewayError::Decode(_) => vec!["Wrong serialized transaction data".to_string()],
            GatewayError::Policy(e) => vec![e.to_string()],
            GatewayError::InvalidClaim(message) => vec![message.clone()],
            GatewayError::Submit(SubmitError::Cpu { message })
            | GatewayError::Submit(SubmitError::Rejected { message }) => vec![message.clone()],
            GatewayError::Submit(SubmitError::MissingSignature) => {
                vec!["Transaction carries no signatures".to_string()]
            }
            _ => Vec::new(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Generic {
            tracing::error!(error = %self, "Gateway upstream failure");
        } else {
            tracing::debug!(error = %self, kind = %kind, "Gateway request rejected");
        }

        let body = Json(ErrorBody {
            error: kind.code(),
            details: self.details(),
        });
        (kind.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: GatewayError) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn kinds_follow_component_errors() {
        assert_eq!(
            GatewayError::from(PolicyError::DifferentActions).kind(),
            ErrorKind::TxInvalid
        );
        assert_eq!(
            GatewayError::from(CryptoError::RecoveryFailed).kind(),
            ErrorKind::AuthInvalid
        );
        assert_eq!(
            GatewayError::from(LookupError::NotFound(Name::default())).kind(),
            ErrorKind::AuthInvalid
        );
        assert_eq!(
            GatewayError::from(LookupError::Transport("down".to_string())).kind(),
            ErrorKind::Generic
        );
        assert_eq!(
            GatewayError::from(MatchError::MissingPermission {
                account: Name::default(),
                permission: Name::default(),
            })
            .kind(),
            ErrorKind::InvalidPermissionLevel
        );
        assert_eq!(
            GatewayError::from(ChannelError::Timeout).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(GatewayError::from(ChannelError::Closed).kind(), ErrorKind::WsDown);
        assert_eq!(GatewayError::from(SubmitError::InvalidKey).kind(), ErrorKind::InvalidKey);
        assert_eq!(
            GatewayError::from(RpcError::Transport("refused".to_string())).kind(),
            ErrorKind::Generic
        );
    }

    #[tokio::test]
    async fn policy_errors_carry_their_reason() {
        let (status, body) = body_of(PolicyError::WrongAuthorization.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"ERR_TX_INVALID","details":["wrong authorization"]}"#);
    }

    #[tokio::test]
    async fn cpu_errors_carry_node_message() {
        let (status, body) = body_of(
            SubmitError::Cpu {
                message: "billed CPU time exceeded".to_string(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, r#"{"error":"ERR_CPU","details":["billed CPU time exceeded"]}"#);
    }

    #[tokio::test]
    async fn unreadable_node_responses_hide_the_body() {
        let (status, body) = body_of(
            SubmitError::InvalidResponse("push_transaction returned 500 Internal Server Error".to_string())
                .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, r#"{"error":"ERR_GENERIC"}"#);
    }

    #[tokio::test]
    async fn unaccepted_terms_are_forbidden() {
        let account: Name = "alice".parse().unwrap();
        let (status, body) = body_of(TermsError::NotAccepted(account).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, r#"{"error":"ERR_TOS_NOT_SIGNED"}"#);

        assert_eq!(
            GatewayError::from(TermsError::Ambiguous(account)).kind(),
            ErrorKind::Generic
        );
    }

    #[tokio::test]
    async fn upstream_errors_hide_internals() {
        let (status, body) = body_of(GatewayError::Upstream(
            "connect to 10.0.0.3:8888 failed".to_string(),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, r#"{"error":"ERR_GENERIC"}"#);
    }
}
