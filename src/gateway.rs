// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway
//!
//! Composes decoding, policy checks, key recovery, permission lookup,
//! co-signing, and submission into the flows the HTTP layer exposes.
//!
//! | Operation | Policy | Network calls |
//! |-----------|--------|---------------|
//! | [`Gateway::authenticate`] | auth | chain id, `get_account`, `get_table_rows` (terms) |
//! | [`Gateway::push_transaction`] | push | chain id, `push_transaction` |
//! | [`Gateway::cosign_transaction`] | withdraw | chain id |
//! | [`Gateway::register`] | register | chain id, `push_transaction` |
//! | [`Gateway::verify_claim`] | none | verification channel |
//!
//! All structural checks run before the first network call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::info;

use crate::auth::{match_key, PermissionOracle, Policy, TermsCheck, ValidatedTx};
use crate::blockchain::codec::{self, Transaction};
use crate::blockchain::recovery::recover_key;
use crate::blockchain::{
    ChainId, ChainRpc, ChainSubmitter, CoSigner, Name, PublicKey, Signature, SignedEnvelope,
    TxReceipt,
};
use crate::channel::{correlation_id, ChannelError, VerificationChannel};
use crate::error::GatewayError;

/// A client-signed transaction as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Hex-encoded serialized transaction.
    #[serde(rename = "t")]
    pub serialized_transaction: String,
    /// Client signature over the transaction.
    #[serde(rename = "s")]
    pub signature: String,
}

/// Action names accepted by each flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub auth_actions: Vec<Name>,
    pub push_actions: Vec<Name>,
    pub withdraw_actions: Vec<Name>,
    /// Terms version authenticated users must have accepted. `None` skips
    /// the check.
    pub tos_current: Option<u32>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let names = |list: &[&str]| -> Vec<Name> {
            list.iter().filter_map(|n| n.parse().ok()).collect()
        };
        Self {
            auth_actions: names(&["verify"]),
            push_actions: names(&["usertos", "transfer"]),
            withdraw_actions: names(&["withdraw"]),
            tos_current: None,
        }
    }
}

/// A successfully authenticated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub account: Name,
    pub permission: Name,
    pub public_key: PublicKey,
    pub transaction: Transaction,
}

/// Result of the registration flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub account: Name,
    pub receipt: TxReceipt,
}

struct Policies {
    auth: Policy,
    push: Policy,
    withdraw: Policy,
    register: Policy,
}

/// Transaction authentication and co-signing gateway.
pub struct Gateway {
    rpc: Arc<dyn ChainRpc>,
    oracle: PermissionOracle,
    terms: Option<TermsCheck>,
    submitter: ChainSubmitter,
    cosigner: CoSigner,
    channel: Option<Arc<VerificationChannel>>,
    chain_id: OnceCell<ChainId>,
    policies: Policies,
}

impl Gateway {
    pub fn new(settings: GatewaySettings, rpc: Arc<dyn ChainRpc>, cosigner: CoSigner) -> Self {
        let identity = *cosigner.identity();
        let policies = Policies {
            auth: Policy::auth(identity.contract, settings.auth_actions),
            push: Policy::push(&identity, settings.push_actions),
            withdraw: Policy::push(&identity, settings.withdraw_actions),
            register: Policy::register(&identity),
        };

        Self {
            oracle: PermissionOracle::new(rpc.clone()),
            terms: settings
                .tos_current
                .map(|current| TermsCheck::new(rpc.clone(), identity.contract, current)),
            submitter: ChainSubmitter::new(rpc.clone()),
            rpc,
            cosigner,
            channel: None,
            chain_id: OnceCell::new(),
            policies,
        }
    }

    /// Attach the side-chain verification channel.
    pub fn with_channel(mut self, channel: Arc<VerificationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Use a fixed chain id instead of asking the node.
    pub fn with_chain_id(self, chain_id: ChainId) -> Self {
        let _ = self.chain_id.set(chain_id);
        self
    }

    pub fn cosigner(&self) -> &CoSigner {
        &self.cosigner
    }

    pub fn channel(&self) -> Option<&Arc<VerificationChannel>> {
        self.channel.as_ref()
    }

    /// The chain id, fetched from the node once and cached.
    pub async fn chain_id(&self) -> Result<ChainId, GatewayError> {
        let id = self
            .chain_id
            .get_or_try_init(|| async {
                let info = self.rpc.get_info().await?;
                info!(chain_id = %info.chain_id, "Fetched chain id");
                Ok::<_, GatewayError>(info.chain_id)
            })
            .await?;
        Ok(*id)
    }

    /// Prove that the signer of `signed` controls the account and permission
    /// named in its first authorization.
    pub async fn authenticate(&self, signed: &SignedTransaction) -> Result<AuthOutcome, GatewayError> {
        let (bytes, validated, signature) = self.check(signed, &self.policies.auth)?;

        let chain_id = self.chain_id().await?;
        let public_key = recover_key(&signature, &chain_id, &bytes)?;
        let record = self.oracle.lookup(validated.actor).await?;
        match_key(&record, validated.permission, &public_key)?;
        self.check_terms_accepted(validated.actor).await?;

        info!(
            account = %validated.actor,
            permission = %validated.permission,
            "Authenticated signed transaction"
        );
        Ok(AuthOutcome {
            account: validated.actor,
            permission: validated.permission,
            public_key,
            transaction: validated.transaction,
        })
    }

    /// Require `account` to have accepted the configured terms version.
    /// Passes when no version is configured.
    pub async fn check_terms_accepted(&self, account: Name) -> Result<(), GatewayError> {
        if let Some(terms) = &self.terms {
            terms.check(account).await?;
        }
        Ok(())
    }

    /// Co-sign a push transaction and submit it.
    pub async fn push_transaction(
        &self,
        signed: &SignedTransaction,
    ) -> Result<TxReceipt, GatewayError> {
        let (bytes, validated, _) = self.check(signed, &self.policies.push)?;
        let receipt = self.cosign_and_submit(bytes, signed).await?;

        info!(account = %validated.actor, tx_id = %receipt.transaction_id, "Pushed transaction");
        Ok(receipt)
    }

    /// Co-sign a withdrawal and hand the co-signature back without submitting.
    pub async fn cosign_transaction(
        &self,
        signed: &SignedTransaction,
    ) -> Result<String, GatewayError> {
        let (bytes, validated, _) = self.check(signed, &self.policies.withdraw)?;

        let chain_id = self.chain_id().await?;
        let signature = self.cosigner.sign(&chain_id, &bytes)?;

        info!(account = %validated.actor, "Co-signed withdrawal");
        Ok(signature)
    }

    /// Co-sign and submit an account registration.
    pub async fn register(&self, signed: &SignedTransaction) -> Result<Registration, GatewayError> {
        let (bytes, validated, _) = self.check(signed, &self.policies.register)?;
        let receipt = self.cosign_and_submit(bytes, signed).await?;

        info!(account = %validated.actor, tx_id = %receipt.transaction_id, "Registered account");
        Ok(Registration {
            account: validated.actor,
            receipt,
        })
    }

    /// Ask the verification peer whether `claim` is valid. Returns the
    /// claimed actor on success.
    pub async fn verify_claim(&self, claim: &Value) -> Result<Name, GatewayError> {
        let actor = claimed_actor(claim)?;
        let channel = self.channel.as_ref().ok_or(ChannelError::NotOpen)?;

        let correlation_id = correlation_id(&actor.to_string());
        let response = channel.verify(claim.clone(), &correlation_id, None).await?;
        if !response.is_valid {
            info!(account = %actor, "Verifier rejected claim");
            return Err(GatewayError::ClaimRejected);
        }

        Ok(actor)
    }

    /// Synchronous checks shared by every transaction flow.
    fn check(
        &self,
        signed: &SignedTransaction,
        policy: &Policy,
    ) -> Result<(Vec<u8>, ValidatedTx, Signature), GatewayError> {
        let bytes = codec::hex_to_bytes(&signed.serialized_transaction)?;
        let transaction = codec::decode(&bytes)?;
        let validated = policy.validate(transaction)?;
        let signature: Signature = signed.signature.parse()?;
        Ok((bytes, validated, signature))
    }

    async fn cosign_and_submit(
        &self,
        bytes: Vec<u8>,
        signed: &SignedTransaction,
    ) -> Result<TxReceipt, GatewayError> {
        let chain_id = self.chain_id().await?;
        let envelope = SignedEnvelope::new(bytes, vec![signed.signature.clone()]);
        let cosigned = self.cosigner.cosign(&envelope, &chain_id)?;
        Ok(self.submitter.submit(&cosigned).await?)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("cosigner", &self.cosigner)
            .field("channel", &self.channel)
            .field("terms", &self.terms)
            .field("chain_id", &self.chain_id.get())
            .finish()
    }
}

/// `actions[0].authorization[0].actor` of a JSON transaction claim.
fn claimed_actor(claim: &Value) -> Result<Name, GatewayError> {
    let actor = claim
        .pointer("/actions/0/authorization/0/actor")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidClaim("missing claimed actor".to_string()))?;

    actor
        .parse()
        .map_err(|e| GatewayError::InvalidClaim(format!("bad actor: {e}")))
}
