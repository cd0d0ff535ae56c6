// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Textual key and signature formats used by the chain.
//!
//! - Public keys: legacy `EOS…` and `PUB_K1_…`
//! - Signatures: `SIG_K1_…` (65-byte compact recoverable form)
//! - Private keys: WIF, `PVT_K1_…`, or PEM (SEC1 / PKCS#8)
//!
//! The `K1` forms carry a RIPEMD-160 checksum over the payload followed by
//! the `K1` suffix; the legacy forms use RIPEMD-160 (public keys) or double
//! SHA-256 (WIF) over the payload alone.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::SecretKey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

const LEGACY_PUBLIC_PREFIX: &str = "EOS";
const K1_PUBLIC_PREFIX: &str = "PUB_K1_";
const K1_SIGNATURE_PREFIX: &str = "SIG_K1_";
const K1_PRIVATE_PREFIX: &str = "PVT_K1_";
const K1_SUFFIX: &[u8] = b"K1";
const WIF_VERSION: u8 = 0x80;

/// Header byte offset for compact recoverable signatures
/// (27 + 4 marks a compressed public key).
const COMPACT_HEADER_BASE: u8 = 27 + 4;

/// Errors raised while parsing or producing key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("unsupported key format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid base58 data: {0}")]
    InvalidEncoding(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("signing failed: {0}")]
    Signing(String),
}

fn ripemd_checksum(payload: &[u8], suffix: &[u8]) -> [u8; 4] {
    let mut hasher = Ripemd160::new();
    hasher.update(payload);
    hasher.update(suffix);
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

fn double_sha_checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    [digest[0], digest[1], digest[2], digest[3]]
}

fn encode_with_checksum(payload: &[u8], checksum: [u8; 4]) -> String {
    let mut raw = Vec::with_capacity(payload.len() + 4);
    raw.extend_from_slice(payload);
    raw.extend_from_slice(&checksum);
    bs58::encode(raw).into_string()
}

/// Decode base58 data of `payload_len` bytes plus a 4-byte checksum.
fn decode_checked(
    encoded: &str,
    payload_len: usize,
    checksum: impl Fn(&[u8]) -> [u8; 4],
) -> Result<Vec<u8>, CryptoError> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

    if raw.len() != payload_len + 4 {
        return Err(CryptoError::InvalidEncoding(format!(
            "expected {} bytes, got {}",
            payload_len + 4,
            raw.len()
        )));
    }

    let (payload, sum) = raw.split_at(payload_len);
    if checksum(payload) != sum {
        return Err(CryptoError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

/// A secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_verifying_key(key: VerifyingKey) -> Self {
        Self(key)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }

    /// 33-byte compressed SEC1 encoding.
    pub fn to_compressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Legacy `EOS…` representation, as returned by most chain nodes.
    pub fn to_legacy_string(&self) -> String {
        let compressed = self.to_compressed();
        let checksum = ripemd_checksum(&compressed, &[]);
        format!("{LEGACY_PUBLIC_PREFIX}{}", encode_with_checksum(&compressed, checksum))
    }

    fn from_compressed(bytes: &[u8]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(K1_PUBLIC_PREFIX) {
            let payload = decode_checked(rest, 33, |p| ripemd_checksum(p, K1_SUFFIX))?;
            Self::from_compressed(&payload)
        } else if let Some(rest) = s.strip_prefix(LEGACY_PUBLIC_PREFIX) {
            let payload = decode_checked(rest, 33, |p| ripemd_checksum(p, &[]))?;
            Self::from_compressed(&payload)
        } else {
            Err(CryptoError::UnsupportedFormat(
                s.chars().take(7).collect::<String>(),
            ))
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compressed = self.to_compressed();
        let checksum = ripemd_checksum(&compressed, K1_SUFFIX);
        write!(f, "{K1_PUBLIC_PREFIX}{}", encode_with_checksum(&compressed, checksum))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_string()).finish()
    }
}

/// A compact recoverable secp256k1 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    signature: EcdsaSignature,
    recovery_id: RecoveryId,
}

impl Signature {
    pub fn new(signature: EcdsaSignature, recovery_id: RecoveryId) -> Self {
        Self {
            signature,
            recovery_id,
        }
    }

    pub fn ecdsa(&self) -> &EcdsaSignature {
        &self.signature
    }

    pub fn recovery_id(&self) -> RecoveryId {
        self.recovery_id
    }

    /// 65-byte `[header, r, s]` form.
    pub fn to_compact(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = COMPACT_HEADER_BASE + self.recovery_id.to_byte();
        out[1..].copy_from_slice(&self.signature.to_bytes());
        out
    }

    /// Whether the chain accepts this signature: both `r` and `s` must be
    /// below 2^255 and minimally encoded.
    pub fn is_canonical(&self) -> bool {
        let c = self.to_compact();
        c[1] & 0x80 == 0
            && !(c[1] == 0 && c[2] & 0x80 == 0)
            && c[33] & 0x80 == 0
            && !(c[33] == 0 && c[34] & 0x80 == 0)
    }
}

impl FromStr for Signature {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(K1_SIGNATURE_PREFIX)
            .ok_or_else(|| CryptoError::UnsupportedFormat(s.chars().take(7).collect()))?;
        let payload = decode_checked(rest, 65, |p| ripemd_checksum(p, K1_SUFFIX))?;

        let header = payload[0];
        if !(27..=34).contains(&header) {
            return Err(CryptoError::InvalidSignature(format!(
                "bad recovery header {header}"
            )));
        }
        let recovery_id = RecoveryId::from_byte((header - 27) & 3)
            .ok_or_else(|| CryptoError::InvalidSignature("bad recovery id".to_string()))?;
        let signature = EcdsaSignature::from_slice(&payload[1..])
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

        Ok(Self {
            signature,
            recovery_id,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compact = self.to_compact();
        let checksum = ripemd_checksum(&compact, K1_SUFFIX);
        write!(f, "{K1_SIGNATURE_PREFIX}{}", encode_with_checksum(&compact, checksum))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature").field(&self.to_string()).finish()
    }
}

/// Parse private key material in WIF, `PVT_K1_`, or PEM form.
pub fn parse_private_key(material: &str) -> Result<SigningKey, CryptoError> {
    let material = material.trim();

    if material.starts_with("-----BEGIN") {
        return signing_key_from_pem(material);
    }

    let bytes = if let Some(rest) = material.strip_prefix(K1_PRIVATE_PREFIX) {
        decode_checked(rest, 32, |p| ripemd_checksum(p, K1_SUFFIX))?
    } else {
        let payload = decode_checked(material, 33, double_sha_checksum)?;
        if payload[0] != WIF_VERSION {
            return Err(CryptoError::InvalidKey(format!(
                "unexpected WIF version byte {:#04x}",
                payload[0]
            )));
        }
        payload[1..].to_vec()
    };

    SigningKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Parse a PEM-encoded secp256k1 key, accepting SEC1 and PKCS#8 bodies.
fn signing_key_from_pem(pem_str: &str) -> Result<SigningKey, CryptoError> {
    use k256::pkcs8::DecodePrivateKey;

    let pem = pem::parse(pem_str).map_err(|e| CryptoError::InvalidKey(format!("Invalid PEM: {e}")))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| SecretKey::from_pkcs8_der(pem.contents()))
        .map_err(|e| CryptoError::InvalidKey(format!("Invalid key format: {e}")))?;

    Ok(SigningKey::from(secret_key))
}

/// Legacy WIF encoding of a private key. Only used to build fixtures.
#[cfg(test)]
pub(crate) fn to_wif(key: &SigningKey) -> String {
    let mut payload = vec![WIF_VERSION];
    payload.extend_from_slice(&key.to_bytes());
    let checksum = double_sha_checksum(&payload);
    encode_with_checksum(&payload, checksum)
}
