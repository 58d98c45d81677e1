//! Dictionary keys and their fixed-width base-52 text form.
//!
//! Keys are stored as numbers and only rendered to text at a given width
//! (`a`, `b`, ... `Z`, then `aa`, `ab`, ...). The engine that reads these maps
//! cannot address keys beyond 65534, so the usable space is capped slightly
//! below that.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// Number of symbols in the key alphabet.
pub const BASE: u32 = 52;

/// Widest key the format supports.
pub const MAX_KEY_LENGTH: usize = 3;

/// Usable key numbers are capped below the engine's hard limit.
const KEY_CEILING: u32 = 65530;

const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn symbol_value(ch: u8) -> Option<u32> {
    match ch {
        b'a'..=b'z' => Some(u32::from(ch - b'a')),
        b'A'..=b'Z' => Some(u32::from(ch - b'A') + 26),
        _ => None,
    }
}

/// Number of distinct keys available at `key_length`.
pub fn max_key_for(key_length: usize) -> u32 {
    let exp = u32::try_from(key_length).unwrap_or(u32::MAX);
    BASE.checked_pow(exp).map_or(KEY_CEILING, |n| n.min(KEY_CEILING))
}

/// Smallest key width able to enumerate `count` entries.
pub fn width_for(count: usize) -> MapResult<usize> {
    (1..=MAX_KEY_LENGTH)
        .find(|&width| max_key_for(width) as usize >= count)
        .ok_or(MapError::KeySpaceExhausted { entries: count })
}

/// A dictionary key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey(u32);

impl TileKey {
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    /// Parse key text such as `"aB"`.
    pub fn parse(text: &str) -> MapResult<Self> {
        if text.is_empty() || text.len() > MAX_KEY_LENGTH {
            return Err(MapError::InvalidKey(text.to_string()));
        }
        text.bytes()
            .try_fold(0u32, |acc, ch| symbol_value(ch).map(|v| acc * BASE + v))
            .map(Self)
            .ok_or_else(|| MapError::InvalidKey(text.to_string()))
    }

    /// Render this key at exactly `key_length` symbols, left-padded with `a`.
    pub fn encode(&self, key_length: usize) -> MapResult<String> {
        if key_length == 0 || key_length > MAX_KEY_LENGTH {
            return Err(MapError::InvalidKeyLength(key_length));
        }
        if self.0 >= max_key_for(key_length) {
            return Err(MapError::KeyTooLarge {
                index: self.0,
                key_length,
            });
        }
        let mut symbols = vec![ALPHABET[0]; key_length];
        let mut n = self.0;
        for slot in symbols.iter_mut().rev() {
            *slot = ALPHABET[(n % BASE) as usize];
            n /= BASE;
        }
        Ok(symbols.into_iter().map(char::from).collect())
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
