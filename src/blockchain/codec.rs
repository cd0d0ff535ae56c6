// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Binary transaction codec.
//!
//! Reads and writes the chain's packed transaction layout. All integers are
//! little-endian; lengths and a few header fields use LEB128 `varuint32`.
//! Action payloads are kept as opaque bytes.

use serde::{Deserialize, Serialize};

use super::name::Name;

/// Errors produced while decoding a packed transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("unexpected end of data at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("varuint32 at offset {0} does not fit in 32 bits")]
    VarintOverflow(usize),

    #[error("length {len} at offset {offset} exceeds remaining data")]
    LengthOutOfBounds { offset: usize, len: usize },

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
}

/// An `(actor, permission)` pair declaring who must sign an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

/// One instruction within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// A transaction extension entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub kind: u16,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// A decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Expiration as seconds since the Unix epoch.
    pub expiration: u32,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub max_net_usage_words: u32,
    pub max_cpu_usage_ms: u8,
    pub delay_sec: u32,
    pub context_free_actions: Vec<Action>,
    pub actions: Vec<Action>,
    pub transaction_extensions: Vec<Extension>,
}

/// Decode a hex string into raw bytes.
pub fn hex_to_bytes(hex_tx: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(hex_tx.trim()).map_err(|e| DecodeError::InvalidHex(e.to_string()))
}

/// Decode a hex-encoded packed transaction.
pub fn decode_hex(hex_tx: &str) -> Result<Transaction, DecodeError> {
    decode(&hex_to_bytes(hex_tx)?)
}

/// Decode a packed transaction. The whole buffer must be consumed.
pub fn decode(bytes: &[u8]) -> Result<Transaction, DecodeError> {
    let mut reader = Reader::new(bytes);

    let tx = Transaction {
        expiration: reader.u32()?,
        ref_block_num: reader.u16()?,
        ref_block_prefix: reader.u32()?,
        max_net_usage_words: reader.varuint32()?,
        max_cpu_usage_ms: reader.u8()?,
        delay_sec: reader.varuint32()?,
        context_free_actions: reader.vec(Reader::action)?,
        actions: reader.vec(Reader::action)?,
        transaction_extensions: reader.vec(Reader::extension)?,
    };

    match reader.remaining() {
        0 => Ok(tx),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

/// Encode a transaction into its packed form.
pub fn encode(tx: &Transaction) -> Vec<u8> {
    let mut w = Writer::default();

    w.u32(tx.expiration);
    w.u16(tx.ref_block_num);
    w.u32(tx.ref_block_prefix);
    w.varuint32(tx.max_net_usage_words);
    w.u8(tx.max_cpu_usage_ms);
    w.varuint32(tx.delay_sec);
    w.vec(&tx.context_free_actions, Writer::action);
    w.vec(&tx.actions, Writer::action);
    w.vec(&tx.transaction_extensions, Writer::extension);

    w.buf
}

/// Encode a transaction as lowercase hex.
pub fn encode_hex(tx: &Transaction) -> String {
    hex::encode(encode(tx))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn name(&mut self) -> Result<Name, DecodeError> {
        Ok(Name::from_u64(u64::from_le_bytes(self.array()?)))
    }

    fn varuint32(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(DecodeError::VarintOverflow(start));
            }
        }
        u32::try_from(value).map_err(|_| DecodeError::VarintOverflow(start))
    }

    /// Length-prefixed collection. Every element takes at least one byte,
    /// so lengths larger than the remaining buffer are rejected up front.
    fn vec<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let offset = self.pos;
        let len = self.varuint32()? as usize;
        if len > self.remaining() {
            return Err(DecodeError::LengthOutOfBounds { offset, len });
        }
        (0..len).map(|_| item(self)).collect()
    }

    fn bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let offset = self.pos;
        let len = self.varuint32()? as usize;
        if len > self.remaining() {
            return Err(DecodeError::LengthOutOfBounds { offset, len });
        }
        Ok(self.take(len)?.to_vec())
    }

    fn permission_level(&mut self) -> Result<PermissionLevel, DecodeError> {
        Ok(PermissionLevel {
            actor: self.name()?,
            permission: self.name()?,
        })
    }

    fn action(&mut self) -> Result<Action, DecodeError> {
        Ok(Action {
            account: self.name()?,
            name: self.name()?,
            authorization: self.vec(Reader::permission_level)?,
            data: self.bytes()?,
        })
    }

    fn extension(&mut self) -> Result<Extension, DecodeError> {
        Ok(Extension {
            kind: self.u16()?,
            data: self.bytes()?,
        })
    }
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn name(&mut self, v: Name) {
        self.buf.extend_from_slice(&v.as_u64().to_le_bytes());
    }

    fn varuint32(&mut self, mut v: u32) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    fn len(&mut self, len: usize) {
        // Collections longer than u32::MAX cannot be represented on chain.
        self.varuint32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    fn vec<T>(&mut self, items: &[T], mut item: impl FnMut(&mut Self, &T)) {
        self.len(items.len());
        for it in items {
            item(self, it);
        }
    }

    fn bytes(&mut self, data: &[u8]) {
        self.len(data.len());
        self.buf.extend_from_slice(data);
    }

    fn action(&mut self, action: &Action) {
        self.name(action.account);
        self.name(action.name);
        self.vec(&action.authorization, |w, level| {
            w.name(level.actor);
            w.name(level.permission);
        });
        self.bytes(&action.data);
    }

    fn extension(&mut self, ext: &Extension) {
        self.u16(ext.kind);
        self.bytes(&ext.data);
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}
