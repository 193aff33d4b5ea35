//! # Outcomes and Host Directives
//!
//! An [`Outcome`] says what a message did to the game. The host actions it
//! implies are planned as [`Directive`]s, so the engine stays pure and the
//! driver only has to execute them.

use tally_expr::ExactDecimal;

use crate::ids::{MessageId, RoleId, UserId};
use crate::messages;

/// Reaction mark put on a counted message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reaction {
    /// Accepted.
    Ok,
    /// Accepted, and a new channel record.
    NewHigh,
    /// The message broke the count.
    Fail,
}

impl Reaction {
    /// Short lowercase name, for logs and text hosts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NewHigh => "new_high",
            Self::Fail => "fail",
        }
    }
}

/// What one message did to the game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The lexical filter rejected the text: not a count attempt at all.
    NotACount,
    /// The count advanced.
    Accepted {
        /// The new last count.
        new_last_count: u64,
        /// Mark to put on the message.
        reaction: Reaction,
    },
    /// Looked like a count but did not evaluate.
    RejectedSyntax,
    /// The user holds the ban role; the message is ignored.
    RejectedBanned,
    /// The same user counted twice in a row.
    FailedSameUser,
    /// The value was not the expected number.
    FailedWrongNumber {
        /// The number that was due.
        expected: u64,
        /// What the message evaluated to.
        actual: ExactDecimal,
    },
    /// Evaluation hit its deadline.
    FailedTimeout,
    /// Evaluation left the representable range.
    FailedOverflow,
    /// Evaluation divided by zero.
    FailedDivZero,
    /// Evaluation needed more precision than configured.
    FailedPrecision,
    /// Nothing to break yet, but the count starts at one.
    AdvisoryNextIsOne,
}

impl Outcome {
    /// True for outcomes that reset the channel.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::FailedSameUser
                | Self::FailedWrongNumber { .. }
                | Self::FailedTimeout
                | Self::FailedOverflow
                | Self::FailedDivZero
                | Self::FailedPrecision
        )
    }

    /// True for [`Outcome::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Short lowercase tag, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotACount => "not_a_count",
            Self::Accepted { .. } => "accepted",
            Self::RejectedSyntax => "rejected_syntax",
            Self::RejectedBanned => "rejected_banned",
            Self::FailedSameUser => "failed_same_user",
            Self::FailedWrongNumber { .. } => "failed_wrong_number",
            Self::FailedTimeout => "failed_timeout",
            Self::FailedOverflow => "failed_overflow",
            Self::FailedDivZero => "failed_div_zero",
            Self::FailedPrecision => "failed_precision",
            Self::AdvisoryNextIsOne => "advisory_next_is_one",
        }
    }

    /// Host actions this outcome calls for, in execution order.
    #[must_use]
    pub fn directives(&self, ctx: &DirectiveContext) -> Vec<Directive> {
        let mut planned = Vec::new();
        match self {
            Self::Accepted { reaction, .. } => planned.push(Directive::React {
                message: ctx.message,
                reaction: *reaction,
            }),
            _ if self.is_failure() => {
                planned.push(Directive::React {
                    message: ctx.message,
                    reaction: Reaction::Fail,
                });
                if let Some(text) = messages::reply_text(self, ctx.user, ctx.previous_count) {
                    planned.push(Directive::Reply {
                        message: ctx.message,
                        text,
                    });
                }
                if let Some(role) = ctx.fail_role {
                    planned.push(Directive::ApplyRole {
                        user: ctx.user,
                        role,
                    });
                }
            }
            Self::AdvisoryNextIsOne => {
                if let Some(text) = messages::reply_text(self, ctx.user, ctx.previous_count) {
                    planned.push(Directive::Reply {
                        message: ctx.message,
                        text,
                    });
                }
            }
            _ => {}
        }
        planned
    }
}

/// What [`Outcome::directives`] needs to know about the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectiveContext {
    /// Author of the message.
    pub user: UserId,
    /// The message itself.
    pub message: MessageId,
    /// Last accepted count before the message.
    pub previous_count: u64,
    /// Role granted on failure, if any.
    pub fail_role: Option<RoleId>,
}

/// One host action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Put a reaction mark on a message.
    React {
        /// Target message.
        message: MessageId,
        /// Mark to add.
        reaction: Reaction,
    },
    /// Reply to a message.
    Reply {
        /// Message replied to.
        message: MessageId,
        /// Reply body.
        text: String,
    },
    /// Grant a role to a user.
    ApplyRole {
        /// Recipient.
        user: UserId,
        /// Role granted.
        role: RoleId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(fail_role: Option<RoleId>) -> DirectiveContext {
        DirectiveContext {
            user: UserId::new(1),
            message: MessageId::new(100),
            previous_count: 5,
            fail_role,
        }
    }

    #[test]
    fn test_accepted_reacts_only() {
        let outcome = Outcome::Accepted {
            new_last_count: 6,
            reaction: Reaction::NewHigh,
        };
        assert_eq!(
            outcome.directives(&ctx(Some(RoleId::new(9)))),
            vec![Directive::React {
                message: MessageId::new(100),
                reaction: Reaction::NewHigh,
            }]
        );
    }

    #[test]
    fn test_failure_plan() {
        let planned = Outcome::FailedDivZero.directives(&ctx(Some(RoleId::new(9))));
        assert_eq!(planned.len(), 3);
        assert_eq!(
            planned[0],
            Directive::React {
                message: MessageId::new(100),
                reaction: Reaction::Fail,
            }
        );
        assert!(matches!(&planned[1], Directive::Reply { text, .. } if text.contains("**5**")));
        assert_eq!(
            planned[2],
            Directive::ApplyRole {
                user: UserId::new(1),
                role: RoleId::new(9),
            }
        );

        // Without a fail role there is nothing to grant.
        assert_eq!(Outcome::FailedTimeout.directives(&ctx(None)).len(), 2);
    }

    #[test]
    fn test_quiet_outcomes() {
        for outcome in [Outcome::NotACount, Outcome::RejectedSyntax, Outcome::RejectedBanned] {
            assert!(outcome.directives(&ctx(Some(RoleId::new(9)))).is_empty());
            assert!(!outcome.is_failure());
        }
        let advisory = Outcome::AdvisoryNextIsOne.directives(&ctx(None));
        assert!(matches!(advisory.as_slice(), [Directive::Reply { .. }]));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Outcome::FailedSameUser.kind(), "failed_same_user");
        assert!(Outcome::FailedSameUser.is_failure());
        assert_eq!(Reaction::NewHigh.as_str(), "new_high");
    }
}
