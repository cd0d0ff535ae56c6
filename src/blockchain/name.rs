// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain account and action names.
//!
//! Names are packed into a `u64`: up to twelve characters of five bits each
//! followed by an optional thirteenth character of four bits, using the
//! alphabet `.12345abcdefghijklmnopqrstuvwxyz`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Maximum encoded length of a name.
pub const MAX_NAME_LEN: usize = 13;

/// A 64-bit chain name (account, action, or permission).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(u64);

/// Error returned when a string cannot be packed into a [`Name`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name is longer than {MAX_NAME_LEN} characters: {0}")]
    TooLong(String),

    #[error("invalid character {ch:?} in name {name}")]
    InvalidChar { name: String, ch: char },

    #[error("thirteenth character of {0} must be one of .12345abcdefghij")]
    InvalidLastChar(String),
}

impl Name {
    /// Build a name from its raw packed value.
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Raw packed value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns true when the name is the empty name (all dots).
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true when the name is a syntactically valid account name.
    pub fn is_valid_account(&self) -> bool {
        is_valid_account_name(&self.to_string())
    }

    /// Pack a name literal at compile time.
    ///
    /// # Panics
    /// If `s` is not a valid name. Meant for `const` items, where that
    /// panic becomes a build error.
    pub const fn from_static(s: &str) -> Self {
        match pack(s.as_bytes()) {
            Ok(value) => Self(value),
            Err(_) => panic!("invalid name literal"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PackError {
    TooLong,
    InvalidChar(u8),
    InvalidLastChar,
}

const fn symbol_of(ch: u8) -> Option<u64> {
    match ch {
        b'.' => Some(0),
        b'1'..=b'5' => Some((ch - b'1') as u64 + 1),
        b'a'..=b'z' => Some((ch - b'a') as u64 + 6),
        _ => None,
    }
}

/// The one packing routine behind both [`Name::from_static`] and `FromStr`.
const fn pack(bytes: &[u8]) -> Result<u64, PackError> {
    if bytes.len() > MAX_NAME_LEN {
        return Err(PackError::TooLong);
    }

    let mut value = 0u64;
    let mut i = 0;
    while i < bytes.len() {
        let symbol = match symbol_of(bytes[i]) {
            Some(symbol) => symbol,
            None => return Err(PackError::InvalidChar(bytes[i])),
        };

        if i < 12 {
            value |= (symbol & 0x1f) << (64 - 5 * (i + 1));
        } else {
            if symbol > 0x0f {
                return Err(PackError::InvalidLastChar);
            }
            value |= symbol;
        }
        i += 1;
    }
    Ok(value)
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        pack(s.as_bytes()).map(Self).map_err(|e| match e {
            PackError::TooLong => NameError::TooLong(s.to_string()),
            PackError::InvalidChar(ch) => NameError::InvalidChar {
                name: s.to_string(),
                ch: ch as char,
            },
            PackError::InvalidLastChar => NameError::InvalidLastChar(s.to_string()),
        })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; MAX_NAME_LEN];
        let mut tmp = self.0;
        for i in 0..MAX_NAME_LEN {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[12 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }

        let end = out.iter().rposition(|c| *c != b'.').map_or(0, |p| p + 1);
        // CHARMAP is ASCII, so every prefix is valid UTF-8.
        f.write_str(std::str::from_utf8(&out[..end]).map_err(|_| fmt::Error)?)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Account-name grammar check.
///
/// Accepts 1-12 characters of `[a-z1-5.]` not ending in a dot, or exactly
/// 13 characters whose last one is in `[a-j1-5]`.
pub fn is_valid_account_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let body_ok = |b: &[u8]| b.iter().all(|c| matches!(c, b'a'..=b'z' | b'1'..=b'5' | b'.'));

    match bytes.len() {
        1..=12 => {
            let (last, body) = (bytes[bytes.len() - 1], &bytes[..bytes.len() - 1]);
            body_ok(body) && matches!(last, b'a'..=b'z' | b'1'..=b'5')
        }
        13 => body_ok(&bytes[..12]) && matches!(bytes[12], b'a'..=b'j' | b'1'..=b'5'),
        _ => false,
    }
}
