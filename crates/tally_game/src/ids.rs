//! # Identifiers
//!
//! Every id the host hands us is a 64-bit integer. Older records spell some
//! of them as strings, sometimes as a mention (`<@123>`, `<@!123>`), so
//! [`FromStr`] is the one place such text becomes a key. Nothing else in the
//! crate sees a string id.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Text that is not an id of the requested kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not a {kind} id: {input:?}")]
pub struct ParseIdError {
    /// Kind of id that was expected.
    pub kind: &'static str,
    /// Text that was given.
    pub input: String,
}

/// Generates an opaque `u64` id newtype.
///
/// Each generated type has:
/// - `new()` and `get()`
/// - `Display` as the bare number
/// - `FromStr` accepting the bare number or one of the listed mention forms
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, [$($prefix:literal),*]) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw id.
            #[inline]
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw id.
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_id(s, $kind, &[$($prefix),*]).map(Self)
            }
        }
    };
}

define_id!(
    /// A chat user.
    UserId, "user", ["<@!", "<@"]
);
define_id!(
    /// A chat message.
    MessageId, "message", []
);
define_id!(
    /// A chat channel.
    ChannelId, "channel", ["<#"]
);
define_id!(
    /// A role that can be granted to a user.
    RoleId, "role", ["<@&"]
);

fn parse_id(text: &str, kind: &'static str, prefixes: &[&str]) -> Result<u64, ParseIdError> {
    let trimmed = text.trim();
    let digits = prefixes
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix)?.strip_suffix('>'))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseIdError {
            kind,
            input: text.to_owned(),
        });
    }
    digits.parse().map_err(|_| ParseIdError {
        kind,
        input: text.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_numbers() {
        assert_eq!("42".parse::<UserId>().unwrap(), UserId::new(42));
        assert_eq!(" 7 ".parse::<MessageId>().unwrap().get(), 7);
        assert_eq!(ChannelId::new(9).to_string(), "9");
    }

    #[test]
    fn test_mentions() {
        assert_eq!("<@123>".parse::<UserId>().unwrap(), UserId::new(123));
        assert_eq!("<@!123>".parse::<UserId>().unwrap(), UserId::new(123));
        assert_eq!("<@&5>".parse::<RoleId>().unwrap(), RoleId::new(5));
        assert_eq!("<#8>".parse::<ChannelId>().unwrap(), ChannelId::new(8));
    }

    #[test]
    fn test_rejects() {
        assert!("".parse::<UserId>().is_err());
        assert!("-1".parse::<UserId>().is_err());
        assert!("+1".parse::<UserId>().is_err());
        assert!("<@12".parse::<UserId>().is_err());
        assert!("<#8>".parse::<UserId>().is_err());
        assert!("<@1>".parse::<MessageId>().is_err());
        assert!("99999999999999999999999".parse::<UserId>().is_err());

        let err = "abc".parse::<RoleId>().unwrap_err();
        assert_eq!(err.to_string(), "not a role id: \"abc\"");
    }
}
