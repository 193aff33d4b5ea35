//! # Game State
//!
//! Per-channel counting state and per-user statistics.
//!
//! ## Invariants
//!
//! - `last_count == 0` exactly when `last_count_user` is `None`
//! - `highest_count >= last_count`, and it never decreases
//! - `highest_user_count <= highest_count` of the channel that counted it

use crate::ids::{MessageId, UserId};

/// State of one counting channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GameState {
    /// Last accepted count, `0` after a reset.
    pub last_count: u64,
    /// Who posted `last_count`.
    pub last_count_user: Option<UserId>,
    /// Best count ever reached.
    pub highest_count: u64,
    /// Message that carried `last_count`.
    pub last_counted_message_id: Option<MessageId>,
}

impl GameState {
    /// Fresh channel.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_count: 0,
            last_count_user: None,
            highest_count: 0,
            last_counted_message_id: None,
        }
    }

    /// The number the next message must evaluate to, `None` once the
    /// count has reached `u64::MAX`.
    #[inline]
    #[must_use]
    pub const fn expected(&self) -> Option<u64> {
        self.last_count.checked_add(1)
    }

    /// State after `user` counted `count` in `message`.
    #[must_use]
    pub fn advanced(&self, user: UserId, count: u64, message: MessageId) -> Self {
        Self {
            last_count: count,
            last_count_user: Some(user),
            highest_count: self.highest_count.max(count),
            last_counted_message_id: Some(message),
        }
    }

    /// State after a failure. The record is kept, the run is not.
    #[must_use]
    pub const fn reset(&self) -> Self {
        Self {
            last_count: 0,
            last_count_user: None,
            highest_count: self.highest_count,
            last_counted_message_id: self.last_counted_message_id,
        }
    }
}

/// Lifetime statistics of one user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct UserStats {
    /// Accepted counts.
    pub successes: u64,
    /// Counts that broke the run.
    pub fails: u64,
    /// Highest number this user counted.
    pub highest_user_count: u64,
}
