// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification peer wire messages.
//!
//! Requests are JSON objects; responses are JSON arrays
//! `[header, messageKind, correlationId, isValid]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Message kind the peer uses for claim verification results.
pub const DEFAULT_MESSAGE_KIND: &str = "ct";

/// Outbound verification request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub claim: Value,
    pub correlation_id: String,
    pub issued_at: DateTime<Utc>,
}

impl VerificationRequest {
    pub fn new(claim: Value, correlation_id: impl Into<String>) -> Self {
        Self {
            claim,
            correlation_id: correlation_id.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Inbound verification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResponse {
    pub correlation_id: String,
    pub message_kind: String,
    pub is_valid: bool,
}

#[derive(Deserialize)]
struct RawResponse(Value, String, String, bool);

impl VerificationResponse {
    /// Parse a peer message. Returns `None` for anything that is not a
    /// four-element response array.
    pub fn parse(text: &str) -> Option<Self> {
        let RawResponse(_header, message_kind, correlation_id, is_valid) =
            serde_json::from_str(text).ok()?;
        Some(Self {
            correlation_id,
            message_kind,
            is_valid,
        })
    }
}

/// New correlation id: a random UUID followed by the claimed actor.
pub fn correlation_id(actor: &str) -> String {
    format!("{}{actor}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_camel_case_fields() {
        let request = VerificationRequest::new(json!({ "actions": [] }), "abc");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["correlationId"], "abc");
        assert_eq!(value["claim"], json!({ "actions": [] }));
        assert!(value["issuedAt"].is_string());
    }

    #[test]
    fn parses_response_arrays() {
        let response = VerificationResponse::parse(r#"[0, "ct", "id-1", true]"#).unwrap();
        assert_eq!(
            response,
            VerificationResponse {
                correlation_id: "id-1".to_string(),
                message_kind: "ct".to_string(),
                is_valid: true,
            }
        );

        assert!(VerificationResponse::parse(r#"{"correlationId":"id-1"}"#).is_none());
        assert!(VerificationResponse::parse(r#"[0, "ct", "id-1"]"#).is_none());
        assert!(VerificationResponse::parse(r#"[0, "ct", "id-1", "yes"]"#).is_none());
        assert!(VerificationResponse::parse("not json").is_none());
    }

    #[test]
    fn correlation_ids_are_unique_and_carry_actor() {
        let a = correlation_id("alice");
        let b = correlation_id("alice");
        assert_ne!(a, b);
        assert!(a.ends_with("alice"));
        assert_eq!(a.len(), 36 + "alice".len());
    }
}
