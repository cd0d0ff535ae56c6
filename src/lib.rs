// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cosign Gateway - Transaction Authentication & Co-Signing
//!
//! Clients prove who they are by signing chain transactions. The gateway
//! checks those transactions against strict shape policies, recovers the
//! signing key and matches it against the account's on-chain permissions,
//! then co-signs and forwards approved transactions to the chain node.
//!
//! ## Modules
//!
//! - `auth` - Transaction policies and on-chain permission lookups
//! - `blockchain` - Chain codec, keys, node RPC, co-signing and submission
//! - `channel` - Side-chain claim verification over a websocket
//! - `gateway` - The authentication and co-signing pipelines
//! - `config` / `telemetry` - Environment configuration and logging setup

pub mod auth;
pub mod blockchain;
pub mod channel;
pub mod config;
pub mod error;
pub mod gateway;
pub mod telemetry;

pub use config::{ConfigError, GatewayConfig, LogFormat};
pub use error::{ErrorKind, GatewayError};
pub use gateway::{AuthOutcome, Gateway, GatewaySettings, Registration, SignedTransaction};
