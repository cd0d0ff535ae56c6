// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification channel errors.

/// Ways a verification call can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel has no open connection.
    #[error("Verification channel is not open")]
    NotOpen,

    /// The connection carrying the request went away before a response.
    #[error("Verification channel closed while the request was pending")]
    Closed,

    #[error("Verification request timed out")]
    Timeout,

    #[error("Correlation id already in flight: {0}")]
    DuplicateCorrelation(String),

    #[error("Failed to encode verification request: {0}")]
    Encode(String),
}
