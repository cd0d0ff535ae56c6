// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Authentication
//!
//! Clients authenticate by signing a chain transaction instead of presenting
//! a bearer token.
//!
//! ## Auth Flow
//!
//! 1. Client signs a transaction with one of its account keys
//! 2. Client sends `{ t: <hex body>, s: <signature> }`
//! 3. Gateway:
//!    - Decodes the body and checks it against the flow's [`Policy`]
//!    - Recovers the signing key from the signature and chain id
//!    - Fetches the account's permissions from the chain
//!    - Requires the recovered key on the claimed permission level
//!    - Optionally requires the current terms version in the users table
//!
//! ## Security
//!
//! - All structural checks run before any network call
//! - Permission records are never cached
//! - Unknown accounts and unreachable nodes both fail closed

pub mod permissions;
pub mod policy;
pub mod terms;

pub use permissions::{match_key, LookupError, MatchError, PermissionOracle};
pub use policy::{Policy, PolicyError, ValidatedTx};
pub use terms::{TermsCheck, TermsError};
