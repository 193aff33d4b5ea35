//! # Lexical Filter
//!
//! Decides whether a chat message could be a count attempt at all.
//!
//! The whitelist is deliberately tiny: digits, the operator symbols, and the
//! three radix markers `x`, `o`, `b` when they follow a `0`. The letters
//! `a`..`f` only survive inside a hexadecimal literal, so nothing that looks
//! like an identifier ever reaches the kernel.
//!
//! Normalisation before the scan:
//! 1. lowercase
//! 2. drop all whitespace
//! 3. `,` becomes `.` (decimal comma)
//! 4. `_` disappears (digit separator)

use thiserror::Error;

/// Longest message (in code points) that is still considered.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Why a message was not a count attempt.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRejection {
    /// The raw message is longer than [`MAX_MESSAGE_CHARS`].
    #[error("message exceeds {MAX_MESSAGE_CHARS} characters")]
    Oversize,

    /// Nothing left after normalisation.
    #[error("message is empty")]
    Empty,

    /// A character outside the alphabet, at the given position of the normalised text.
    #[error("character {character:?} not allowed at position {position}")]
    Disallowed {
        /// The offending character.
        character: char,
        /// Index (in chars) within the normalised string.
        position: usize,
    },
}

/// Characters accepted anywhere.
#[inline]
fn is_base_symbol(c: char) -> bool {
    c.is_ascii_digit()
        || matches!(
            c,
            '*' | '/' | '-' | '+' | '.' | '(' | ')' | '%' | '^' | '&' | '<' | '>' | '|' | '~' | '#'
        )
}

#[inline]
fn is_hex_digit(c: char) -> bool {
    matches!(c, '0'..='9' | 'a'..='f')
}

/// Lowercases, strips whitespace, rewrites separators. No validation.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Runs the filter.
///
/// # Errors
///
/// Returns a [`FilterRejection`] describing the first reason the message
/// cannot be a count attempt.
pub fn filter(raw: &str) -> Result<String, FilterRejection> {
    if raw.chars().count() > MAX_MESSAGE_CHARS {
        return Err(FilterRejection::Oversize);
    }

    let normalized = normalize(raw);
    if normalized.is_empty() {
        return Err(FilterRejection::Empty);
    }

    let mut in_hex = false;
    let mut previous: Option<char> = None;

    for (position, c) in normalized.chars().enumerate() {
        if in_hex && is_hex_digit(c) {
            previous = Some(c);
            continue;
        }
        in_hex = false;

        let accepted = if is_base_symbol(c) {
            true
        } else if matches!(c, 'x' | 'o' | 'b') && previous == Some('0') {
            in_hex = c == 'x';
            true
        } else {
            false
        };

        if !accepted {
            return Err(FilterRejection::Disallowed { character: c, position });
        }
        previous = Some(c);
    }

    Ok(normalized)
}
