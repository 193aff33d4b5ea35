//! # Count Validator
//!
//! The rules of the game as a pure function:
//!
//! ```text
//! (GameState, user, message, TaggedResult) ──► Transition { outcome, next, ops }
//! ```
//!
//! Nothing here touches a store or the host. [`crate::CountingGame`] feeds
//! it the sandbox result and commits what it returns.
//!
//! ## Order of checks
//!
//! 1. `Invalid` evaluates to [`Outcome::RejectedSyntax`], no change
//! 2. Same user as the last count, while a run is going: failure
//! 3. Numeric failure (timeout, overflow, division by zero, precision): failure
//! 4. Value not exactly `last_count + 1`: advisory at zero, failure otherwise
//! 5. Otherwise the count advances
//!
//! The same-user check only applies while `last_count != 0`, ahead of the
//! numeric checks.

use tally_expr::{prepare, ExactDecimal, TaggedResult};

use crate::ids::{MessageId, UserId};
use crate::outcome::{Outcome, Reaction};
use crate::state::GameState;
use crate::store::StoreOp;

/// What a message is, before anything is evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// The lexical filter rejected it.
    NotACount,
    /// A count attempt, already rewritten to kernel syntax.
    Candidate(String),
}

/// Runs the lexical filter and the rewriters over raw message text.
#[must_use]
pub fn classify(text: &str) -> Classification {
    match prepare(text) {
        Ok(expr) => Classification::Candidate(expr),
        Err(rejection) => {
            tracing::trace!(%rejection, "not a count");
            Classification::NotACount
        }
    }
}

/// Result of one transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// What happened.
    pub outcome: Outcome,
    /// Channel state afterwards.
    pub next: GameState,
    /// User statistics to commit with it.
    pub ops: Vec<StoreOp>,
}

impl Transition {
    fn unchanged(state: &GameState, outcome: Outcome) -> Self {
        Self {
            outcome,
            next: *state,
            ops: Vec::new(),
        }
    }

    fn failure(state: &GameState, user: UserId, outcome: Outcome) -> Self {
        tracing::info!(
            user = user.get(),
            at = state.last_count,
            kind = outcome.kind(),
            "count broken"
        );
        Self {
            outcome,
            next: state.reset(),
            ops: vec![StoreOp::IncrementFail(user)],
        }
    }
}

/// Applies one evaluated message to `state`.
#[must_use]
pub fn transition(
    state: &GameState,
    user: UserId,
    message: MessageId,
    result: &TaggedResult,
) -> Transition {
    if *result == TaggedResult::Invalid {
        return Transition::unchanged(state, Outcome::RejectedSyntax);
    }

    if state.last_count != 0 && state.last_count_user == Some(user) {
        return Transition::failure(state, user, Outcome::FailedSameUser);
    }

    let value = match result {
        TaggedResult::Success(value) => value,
        TaggedResult::Timeout => return Transition::failure(state, user, Outcome::FailedTimeout),
        TaggedResult::Overflow => return Transition::failure(state, user, Outcome::FailedOverflow),
        TaggedResult::DivideByZero => {
            return Transition::failure(state, user, Outcome::FailedDivZero)
        }
        TaggedResult::PrecisionError => {
            return Transition::failure(state, user, Outcome::FailedPrecision)
        }
        TaggedResult::Invalid => return Transition::unchanged(state, Outcome::RejectedSyntax),
    };

    // The count cannot go past u64::MAX.
    let Some(expected) = state.expected() else {
        return Transition::failure(state, user, Outcome::FailedOverflow);
    };

    if *value != ExactDecimal::from(expected) {
        if state.last_count == 0 {
            return Transition::unchanged(state, Outcome::AdvisoryNextIsOne);
        }
        return Transition::failure(
            state,
            user,
            Outcome::FailedWrongNumber {
                expected,
                actual: value.clone(),
            },
        );
    }

    let reaction = if expected > state.highest_count {
        tracing::info!(user = user.get(), count = expected, "new high");
        Reaction::NewHigh
    } else {
        Reaction::Ok
    };
    Transition {
        outcome: Outcome::Accepted {
            new_last_count: expected,
            reaction,
        },
        next: state.advanced(user, expected, message),
        ops: vec![
            StoreOp::IncrementSuccess(user),
            StoreOp::SetHighestIfGreater(user, expected),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: UserId = UserId::new(1);
    const B: UserId = UserId::new(2);
    const MSG: MessageId = MessageId::new(500);

    fn ok(text: &str) -> TaggedResult {
        TaggedResult::Success(ExactDecimal::parse_literal(text).unwrap())
    }

    fn at(count: u64, user: UserId) -> GameState {
        GameState::new().advanced(user, count, MessageId::new(1))
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("hello"), Classification::NotACount);
        assert_eq!(classify(""), Classification::NotACount);
        assert_eq!(classify("0x2"), Classification::Candidate("2".to_owned()));
        assert_eq!(classify("6 # 1"), Classification::Candidate("6**1".to_owned()));
    }

    #[test]
    fn test_first_count() {
        let t = transition(&GameState::new(), A, MSG, &ok("1"));
        assert_eq!(
            t.outcome,
            Outcome::Accepted {
                new_last_count: 1,
                reaction: Reaction::NewHigh,
            }
        );
        assert_eq!(t.next.last_count, 1);
        assert_eq!(t.next.last_count_user, Some(A));
        assert_eq!(t.next.last_counted_message_id, Some(MSG));
        assert_eq!(
            t.ops,
            vec![StoreOp::IncrementSuccess(A), StoreOp::SetHighestIfGreater(A, 1)]
        );
    }

    #[test]
    fn test_below_record_is_ok() {
        let state = GameState {
            highest_count: 10,
            ..at(4, B)
        };
        let t = transition(&state, A, MSG, &ok("5"));
        assert_eq!(
            t.outcome,
            Outcome::Accepted {
                new_last_count: 5,
                reaction: Reaction::Ok,
            }
        );
        assert_eq!(t.next.highest_count, 10);
    }

    #[test]
    fn test_same_user() {
        let t = transition(&at(1, A), A, MSG, &ok("2"));
        assert_eq!(t.outcome, Outcome::FailedSameUser);
        assert_eq!(t.next.last_count, 0);
        assert_eq!(t.next.last_count_user, None);
        assert_eq!(t.next.highest_count, 1);
        assert_eq!(t.ops, vec![StoreOp::IncrementFail(A)]);
    }

    #[test]
    fn test_same_user_beats_numeric_failure() {
        let t = transition(&at(3, A), A, MSG, &TaggedResult::DivideByZero);
        assert_eq!(t.outcome, Outcome::FailedSameUser);
    }

    #[test]
    fn test_invalid_changes_nothing() {
        let state = at(3, A);
        let t = transition(&state, A, MSG, &TaggedResult::Invalid);
        assert_eq!(t.outcome, Outcome::RejectedSyntax);
        assert_eq!(t.next, state);
        assert!(t.ops.is_empty());
    }

    #[test]
    fn test_numeric_failures() {
        let cases = [
            (TaggedResult::Timeout, Outcome::FailedTimeout),
            (TaggedResult::Overflow, Outcome::FailedOverflow),
            (TaggedResult::DivideByZero, Outcome::FailedDivZero),
            (TaggedResult::PrecisionError, Outcome::FailedPrecision),
        ];
        for (result, expected) in cases {
            let t = transition(&at(2, B), A, MSG, &result);
            assert_eq!(t.outcome, expected);
            assert_eq!(t.next.last_count, 0);
            assert_eq!(t.ops, vec![StoreOp::IncrementFail(A)]);
        }
    }

    #[test]
    fn test_numeric_failure_at_zero_still_fails() {
        let t = transition(&GameState::new(), A, MSG, &TaggedResult::Timeout);
        assert_eq!(t.outcome, Outcome::FailedTimeout);
        assert_eq!(t.ops, vec![StoreOp::IncrementFail(A)]);
    }

    #[test]
    fn test_wrong_number() {
        let t = transition(&at(2, B), A, MSG, &ok("4"));
        assert_eq!(
            t.outcome,
            Outcome::FailedWrongNumber {
                expected: 3,
                actual: ExactDecimal::from(4u64),
            }
        );
        assert_eq!(t.next.last_count, 0);
    }

    #[test]
    fn test_near_miss_is_wrong() {
        let t = transition(&at(2, B), A, MSG, &ok("3.00000000000000000001"));
        assert!(matches!(t.outcome, Outcome::FailedWrongNumber { expected: 3, .. }));
    }

    #[test]
    fn test_advisory_at_zero() {
        let t = transition(&GameState::new(), A, MSG, &ok("5"));
        assert_eq!(t.outcome, Outcome::AdvisoryNextIsOne);
        assert_eq!(t.next, GameState::new());
        assert!(t.ops.is_empty());
    }

    #[test]
    fn test_end_of_the_count() {
        let t = transition(&at(u64::MAX, B), A, MSG, &ok("1"));
        assert_eq!(t.outcome, Outcome::FailedOverflow);
    }
}
