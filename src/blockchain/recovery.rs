// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing digest and public key recovery.

use k256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};

use super::keys::{CryptoError, PublicKey, Signature};
use super::types::ChainId;

/// Context-free data marker appended to every signing payload.
const EMPTY_CONTEXT_FREE_DIGEST: [u8; 32] = [0u8; 32];

/// SHA-256 over `chain_id || serialized_transaction || 32 zero bytes`.
pub fn signing_digest(chain_id: &ChainId, serialized_transaction: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.as_bytes());
    hasher.update(serialized_transaction);
    hasher.update(EMPTY_CONTEXT_FREE_DIGEST);
    hasher.finalize().into()
}

/// Recover the public key that produced `signature` over the transaction.
pub fn recover_key(
    signature: &Signature,
    chain_id: &ChainId,
    serialized_transaction: &[u8],
) -> Result<PublicKey, CryptoError> {
    let digest = signing_digest(chain_id, serialized_transaction);
    VerifyingKey::recover_from_prehash(&digest, signature.ecdsa(), signature.recovery_id())
        .map(PublicKey::from_verifying_key)
        .map_err(|_| CryptoError::RecoveryFailed)
}

/// Parse a textual signature and recover its public key.
pub fn recover(
    signature: &str,
    chain_id: &ChainId,
    serialized_transaction: &[u8],
) -> Result<PublicKey, CryptoError> {
    let signature: Signature = signature.parse()?;
    recover_key(&signature, chain_id, serialized_transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::keys::tests::{dev_key, DEV_PUBLIC};
    use k256::ecdsa::SigningKey;

    fn chain() -> ChainId {
        ChainId::new([7u8; 32])
    }

    fn sign(key: &SigningKey, chain_id: &ChainId, body: &[u8]) -> String {
        let digest = signing_digest(chain_id, body);
        let (sig, recid) = key.sign_prehash_recoverable(&digest).unwrap();
        Signature::new(sig, recid).to_string()
    }

    #[test]
    fn digest_includes_context_marker() {
        let mut expected = Sha256::new();
        expected.update([7u8; 32]);
        expected.update(b"body");
        expected.update([0u8; 32]);
        let expected: [u8; 32] = expected.finalize().into();

        assert_eq!(signing_digest(&chain(), b"body"), expected);
    }

    #[test]
    fn recovers_signer_public_key() {
        let key = dev_key();
        let signature = sign(&key, &chain(), b"transaction body");

        let recovered = recover(&signature, &chain(), b"transaction body").unwrap();
        assert_eq!(recovered.to_legacy_string(), DEV_PUBLIC);
    }

    #[test]
    fn recovers_many_keys() {
        for seed in 1u8..=16 {
            let key = SigningKey::from_slice(&[seed; 32]).unwrap();
            let body = vec![seed; seed as usize * 3];
            let signature = sign(&key, &chain(), &body);

            let recovered = recover(&signature, &chain(), &body).unwrap();
            assert_eq!(recovered.verifying_key(), key.verifying_key());
        }
    }

    #[test]
    fn different_body_recovers_different_key() {
        let key = dev_key();
        let signature = sign(&key, &chain(), b"original");

        let recovered = recover(&signature, &chain(), b"tampered").unwrap();
        assert_ne!(recovered.to_legacy_string(), DEV_PUBLIC);
    }

    #[test]
    fn malformed_signature_is_crypto_error() {
        assert!(recover("not-a-signature", &chain(), b"x").is_err());
        assert!(recover("SIG_K1_111", &chain(), b"x").is_err());
    }
}
