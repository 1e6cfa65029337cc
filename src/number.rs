//! Phone number alphabet: validation, symbol mapping and ordering.
//!
//! Numbers are strings over twelve symbols. Each symbol is a path step in
//! both tries:
//!
//! | symbol | value |
//! |--------|-------|
//! | `0`-`9` | 0-9 |
//! | `*` | 10 |
//! | `#` | 11 |

use std::cmp::Ordering;
use std::collections::TryReserveError;

use crate::error::InvalidArgument;

/// Number of distinct symbols, and so the fan-out of every trie node.
pub const SYMBOLS: usize = 12;

/// Symbol characters indexed by value.
pub const ALPHABET: &[u8; SYMBOLS] = b"0123456789*#";

/// Maps a byte to its symbol value, or `None` outside the alphabet.
#[inline]
pub fn symbol_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'*' => Some(10),
        b'#' => Some(11),
        _ => None,
    }
}

/// Rank used for ordering. Bytes outside the alphabet rank after every symbol.
#[inline]
pub fn symbol_rank(byte: u8) -> u8 {
    symbol_value(byte).unwrap_or(u8::MAX)
}

/// Symbol values of an already validated string.
#[inline]
pub(crate) fn symbol_indices(raw: &str) -> impl Iterator<Item = usize> + '_ {
    raw.bytes().map(|b| usize::from(symbol_rank(b)))
}

/// Compares two numbers symbol by symbol under `rank`.
///
/// A number that ends first is smaller, so a proper prefix sorts before
/// every extension of it.
pub fn compare_by<F>(a: &str, b: &str, rank: F) -> Ordering
where
    F: Fn(u8) -> u8,
{
    let mut a = a.bytes();
    let mut b = b.bytes();
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match rank(x).cmp(&rank(y)) {
                Ordering::Equal => {}
                ord => return ord,
            },
        }
    }
}

/// [`compare_by`] with the phone number alphabet ranking.
#[inline]
pub fn compare_numbers(a: &str, b: &str) -> Ordering {
    compare_by(a, b, symbol_rank)
}

/// A validated, non-empty number borrowed from the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Number<'a>(&'a str);

impl<'a> Number<'a> {
    /// Validates `raw`. Never allocates.
    pub fn parse(raw: &'a str) -> Result<Self, InvalidArgument> {
        if raw.is_empty() {
            return Err(InvalidArgument::Empty);
        }
        if let Some((position, byte)) = raw
            .bytes()
            .enumerate()
            .find(|&(_, b)| symbol_value(b).is_none())
        {
            return Err(InvalidArgument::BadSymbol { position, byte });
        }
        Ok(Self(raw))
    }

    #[inline]
    pub fn as_str(self) -> &'a str {
        self.0
    }

    /// Number of symbols (every symbol is one byte).
    #[inline]
    pub fn len(self) -> usize {
        self.0.len()
    }

    /// Always false for a parsed number.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    /// Symbol values, in order.
    #[inline]
    pub fn symbols(self) -> impl Iterator<Item = usize> + 'a {
        symbol_indices(self.0)
    }

    /// The tail after the first `consumed` symbols.
    #[inline]
    pub fn suffix(self, consumed: usize) -> &'a str {
        &self.0[consumed..]
    }
}

/// Concatenates `parts` into a new `String`, reporting allocation failure
/// instead of aborting.
pub fn try_concat(parts: &[&str]) -> Result<String, TryReserveError> {
    let len = parts.iter().map(|p| p.len()).sum();
    let mut out = String::new();
    out.try_reserve_exact(len)?;
    for part in parts {
        out.push_str(part);
    }
    Ok(out)
}
