//! Reply templates, keyed by outcome kind.

use tally_expr::ExactDecimal;

use crate::ids::UserId;
use crate::outcome::Outcome;

/// Longest value quoted verbatim in a reply.
pub const MAX_VALUE_CHARS: usize = 64;

/// Reply posted for `outcome`, if it gets one.
///
/// `previous_count` is the last accepted count before the message.
#[must_use]
pub fn reply_text(outcome: &Outcome, user: UserId, previous_count: u64) -> Option<String> {
    let reason = match outcome {
        Outcome::FailedSameUser => "You can't count twice in a row.".to_owned(),
        Outcome::FailedWrongNumber { expected, actual } => {
            format!("Expected **{expected}**, got **{}**.", abbreviate(actual))
        }
        Outcome::FailedTimeout => "That took too long to evaluate.".to_owned(),
        Outcome::FailedOverflow => "That number is out of range.".to_owned(),
        Outcome::FailedDivZero => "You divided by zero.".to_owned(),
        Outcome::FailedPrecision => "That needs more precision than I keep.".to_owned(),
        Outcome::AdvisoryNextIsOne => {
            return Some(format!("<@{user}> The count starts at **1**."));
        }
        Outcome::NotACount
        | Outcome::Accepted { .. }
        | Outcome::RejectedSyntax
        | Outcome::RejectedBanned => return None,
    };
    Some(format!(
        "<@{user}> ruined it at **{previous_count}**! {reason} Next number is **1**."
    ))
}

/// Renders `value` for a reply, shortened past [`MAX_VALUE_CHARS`].
///
/// Values with a very long integer part are described by size only, so a
/// million-digit result is never formatted.
#[must_use]
pub fn abbreviate(value: &ExactDecimal) -> String {
    let digits = value.integer_digits();
    if digits > MAX_VALUE_CHARS as u64 {
        let sign = if value.is_negative() { "negative " } else { "" };
        return format!("a {sign}{digits}-digit number");
    }

    let text = value.to_string();
    let len = text.chars().count();
    if len <= MAX_VALUE_CHARS {
        return text;
    }
    let head: String = text.chars().take(MAX_VALUE_CHARS - 1).collect();
    format!("{head}…")
}
