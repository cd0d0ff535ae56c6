// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Verification Channel
//!
//! Side-chain claims are verified by a remote peer over a single
//! long-lived websocket. Many requests share the connection; each carries a
//! correlation id the peer echoes back in its response.
//!
//! ## Protocol
//!
//! - Request: `{"claim": …, "correlationId": "…", "issuedAt": "…"}`
//! - Response: `[header, messageKind, correlationId, isValid]`
//!
//! Responses of a different `messageKind`, or for ids with no pending
//! request, are logged and dropped.
//!
//! ## Reconnect
//!
//! The connection is re-established `retry_after` after it ends. Requests in
//! flight on a lost connection fail; they are never answered by a later one.

pub mod client;
pub mod error;
pub mod message;
pub mod state;

pub use client::{ChannelConfig, VerificationChannel};
pub use error::ChannelError;
pub use message::{correlation_id, VerificationRequest, VerificationResponse};
pub use state::ConnectionState;
