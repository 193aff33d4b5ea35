//! # Surface Rewriting
//!
//! Two textual passes between the filter and the kernel.
//!
//! - [`rewrite_bases`] turns `0b…`, `0o…` and `0x…` literals into decimal
//!   integers so the kernel only ever sees base-10 numbers.
//! - [`rewrite_ops`] maps the chat spelling of the operators onto the
//!   kernel's: `#` is exponentiation and becomes `**`; `^` is already XOR.
//!
//! Both passes expect filtered (lowercase, whitespace-free) input.

use std::sync::OnceLock;

use num_bigint::BigUint;
use regex::{Captures, Regex};

/// Kernel spelling of exponentiation.
pub const KERNEL_POW: &str = "**";

/// Chat spelling of exponentiation.
pub const SURFACE_POW: char = '#';

fn radix_literal() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"0b[01]+|0o[0-7]+|0x[0-9a-f]+").expect("radix literal pattern is valid")
    })
}

/// Rewrites every radix literal into its base-10 spelling.
///
/// Matches are found left to right and never overlap. Text between matches
/// is copied verbatim, so `0b12` becomes `12` (`0b1` then a literal `2`).
#[must_use]
pub fn rewrite_bases(input: &str) -> String {
    radix_literal()
        .replace_all(input, |caps: &Captures<'_>| {
            let literal = &caps[0];
            let radix = match literal.as_bytes()[1] {
                b'b' => 2,
                b'o' => 8,
                _ => 16,
            };
            // The pattern only admits digits valid for the radix.
            BigUint::parse_bytes(&literal.as_bytes()[2..], radix)
                .map_or_else(|| literal.to_string(), |value| value.to_string())
        })
        .into_owned()
}

/// Maps the chat operator spelling onto the kernel's.
///
/// A single pass over the characters, so a freshly produced `**` is never
/// rewritten again and `^` can never be mistaken for exponentiation.
#[must_use]
pub fn rewrite_ops(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.matches(SURFACE_POW).count());
    for c in input.chars() {
        if c == SURFACE_POW {
            out.push_str(KERNEL_POW);
        } else {
            out.push(c);
        }
    }
    out
}

/// Both rewrites, in pipeline order.
#[must_use]
pub fn rewrite(input: &str) -> String {
    rewrite_ops(&rewrite_bases(input))
}
