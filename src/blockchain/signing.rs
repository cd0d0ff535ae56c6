// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service co-signing.
//!
//! The gateway holds one secp256k1 key bound to a chain permission level.
//! Co-signing produces a canonical signature over the transaction digest and
//! prepends it to the client's signatures, so the service signature always
//! sits at position 0.

use std::fmt;

use k256::ecdsa::signature::hazmat::RandomizedPrehashSigner;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey};
use rand::rngs::OsRng;

use super::keys::{parse_private_key, CryptoError, PublicKey, Signature};
use super::name::Name;
use super::recovery::signing_digest;
use super::types::{ChainId, SignedEnvelope};

/// Upper bound on signing attempts while looking for a canonical signature.
const MAX_CANONICAL_ATTEMPTS: usize = 128;

/// The permission level and contract the service signs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CosignerIdentity {
    /// Account the service key belongs to.
    pub account: Name,
    /// Permission of `account` the key satisfies.
    pub permission: Name,
    /// Contract that receives the leading validation action.
    pub contract: Name,
}

/// Holds the service key and produces co-signatures.
#[derive(Clone)]
pub struct CoSigner {
    key: SigningKey,
    public_key: PublicKey,
    identity: CosignerIdentity,
}

impl CoSigner {
    pub fn new(key: SigningKey, identity: CosignerIdentity) -> Self {
        let public_key = PublicKey::from_verifying_key(*key.verifying_key());
        Self {
            key,
            public_key,
            identity,
        }
    }

    /// Build a co-signer from WIF, `PVT_K1_`, or PEM key material.
    pub fn from_key_material(
        material: &str,
        identity: CosignerIdentity,
    ) -> Result<Self, CryptoError> {
        Ok(Self::new(parse_private_key(material)?, identity))
    }

    pub fn identity(&self) -> &CosignerIdentity {
        &self.identity
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Keys this signer can produce signatures for.
    pub fn available_keys(&self) -> Vec<PublicKey> {
        vec![self.public_key]
    }

    /// Sign `serialized_transaction` for `chain_id`, returning a `SIG_K1_`
    /// string the chain will accept.
    pub fn sign(
        &self,
        chain_id: &ChainId,
        serialized_transaction: &[u8],
    ) -> Result<String, CryptoError> {
        let digest = signing_digest(chain_id, serialized_transaction);

        for _ in 0..MAX_CANONICAL_ATTEMPTS {
            let signature: EcdsaSignature = self
                .key
                .sign_prehash_with_rng(&mut OsRng, &digest)
                .map_err(|e| CryptoError::Signing(e.to_string()))?;
            let signature = signature.normalize_s().unwrap_or(signature);

            let recovery_id =
                RecoveryId::trial_recovery_from_prehash(self.key.verifying_key(), &digest, &signature)
                    .map_err(|e| CryptoError::Signing(e.to_string()))?;

            let signature = Signature::new(signature, recovery_id);
            if signature.is_canonical() {
                return Ok(signature.to_string());
            }
        }

        Err(CryptoError::Signing(
            "no canonical signature produced".to_string(),
        ))
    }

    /// A copy of `envelope` with the service signature prepended.
    pub fn cosign(
        &self,
        envelope: &SignedEnvelope,
        chain_id: &ChainId,
    ) -> Result<SignedEnvelope, CryptoError> {
        let signature = self.sign(chain_id, &envelope.serialized_transaction)?;
        tracing::debug!(
            account = %self.identity.account,
            permission = %self.identity.permission,
            signatures = envelope.signatures.len() + 1,
            "Co-signed transaction"
        );
        Ok(envelope.with_leading_signature(signature))
    }
}

impl fmt::Debug for CoSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoSigner")
            .field("key", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .field("identity", &self.identity)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blockchain::keys::tests::{DEV_PUBLIC, DEV_WIF};
    use crate::blockchain::recovery::recover;

    pub(crate) fn identity() -> CosignerIdentity {
        CosignerIdentity {
            account: "cosigner".parse().unwrap(),
            permission: "active".parse().unwrap(),
            contract: "gateway".parse().unwrap(),
        }
    }

    pub(crate) fn cosigner() -> CoSigner {
        CoSigner::from_key_material(DEV_WIF, identity()).unwrap()
    }

    #[test]
    fn signatures_are_canonical_and_recoverable() {
        let signer = cosigner();
        let chain_id = ChainId::new([3u8; 32]);

        for i in 0..20u8 {
            let body = vec![i; 40];
            let signature = signer.sign(&chain_id, &body).unwrap();
            let parsed: Signature = signature.parse().unwrap();
            assert!(parsed.is_canonical());

            let recovered = recover(&signature, &chain_id, &body).unwrap();
            assert_eq!(recovered.to_legacy_string(), DEV_PUBLIC);
        }
    }

    #[test]
    fn cosign_prepends_without_mutating() {
        let signer = cosigner();
        let chain_id = ChainId::new([3u8; 32]);
        let envelope = SignedEnvelope::new(vec![1, 2, 3], vec!["SIG_K1_user".to_string()]);

        let cosigned = signer.cosign(&envelope, &chain_id).unwrap();

        assert_eq!(envelope.signatures, vec!["SIG_K1_user"]);
        assert_eq!(cosigned.signatures.len(), 2);
        assert_eq!(cosigned.signatures[1], "SIG_K1_user");
        let recovered = recover(&cosigned.signatures[0], &chain_id, &[1, 2, 3]).unwrap();
        assert_eq!(recovered, *signer.public_key());
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", cosigner());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(DEV_WIF));
    }

    #[test]
    fn rejects_bad_key_material() {
        assert!(CoSigner::from_key_material("not-a-key", identity()).is_err());
        assert_eq!(cosigner().available_keys().len(), 1);
    }
}
