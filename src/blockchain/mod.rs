// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain integration.
//!
//! This module provides:
//! - Name packing and the binary transaction codec
//! - Key, signature, and digest handling with public key recovery
//! - The node RPC client
//! - Service co-signing and transaction submission

pub mod client;
pub mod codec;
pub mod keys;
pub mod name;
pub mod recovery;
pub mod signing;
pub mod transactions;
pub mod types;

pub use client::{ChainError, ChainRpc, NodeRpc, RpcError};
pub use codec::{Action, DecodeError, PermissionLevel, Transaction};
pub use keys::{CryptoError, PublicKey, Signature};
pub use name::Name;
pub use signing::{CoSigner, CosignerIdentity};
pub use transactions::{ChainSubmitter, SubmitError};
pub use types::*;
