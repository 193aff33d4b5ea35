//! # Count Stores
//!
//! The only shared mutable resource of the game. A store keeps
//!
//! - `user → UserStats` (successes, fails, highest count)
//! - `channel → GameState`
//!
//! and applies every operation atomically. A transition's operations are
//! committed together through [`CountStore::apply`], so a reader never sees
//! a channel reset without the matching fail counted.
//!
//! ## Implementations
//!
//! | Store | Durability |
//! |-------|------------|
//! | [`MemoryCountStore`] | none, process lifetime |
//! | [`JournalCountStore`] | append-only journal, replayed on open |

mod journal;
mod memory;

pub use journal::{JournalCountStore, RecoveryStats};
pub use memory::MemoryCountStore;

use std::collections::HashMap;
use std::future::Future;

use crate::error::{StoreError, StoreResult};
use crate::ids::{ChannelId, UserId};
use crate::state::{GameState, UserStats};

/// One store mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// `successes[user] += 1`.
    IncrementSuccess(UserId),
    /// `fails[user] += 1`.
    IncrementFail(UserId),
    /// `highest_user_count[user] = max(highest_user_count[user], n)`.
    SetHighestIfGreater(UserId, u64),
    /// Replace a channel's state.
    SaveChannel(ChannelId, GameState),
    /// Replace a user's statistics. Written by journal checkpoints.
    PutUser(UserId, UserStats),
}

/// Linearizable statistics storage.
///
/// Every method is one atomic step. The single-operation methods are
/// shorthands for a one-element [`CountStore::apply`].
pub trait CountStore: Send + Sync {
    /// Statistics of `user` (zeroes for a stranger).
    fn read(&self, user: UserId) -> impl Future<Output = StoreResult<UserStats>> + Send;

    /// State of `channel`, if it was ever saved.
    fn load_channel(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = StoreResult<Option<GameState>>> + Send;

    /// Applies `batch` all-or-nothing.
    fn apply(&self, batch: Vec<StoreOp>) -> impl Future<Output = StoreResult<()>> + Send;

    /// Users by successes, best first, at most `limit`.
    fn leaderboard(
        &self,
        limit: usize,
    ) -> impl Future<Output = StoreResult<Vec<(UserId, UserStats)>>> + Send;

    /// `successes[user] += 1`.
    fn increment_success(&self, user: UserId) -> impl Future<Output = StoreResult<()>> + Send {
        self.apply(vec![StoreOp::IncrementSuccess(user)])
    }

    /// `fails[user] += 1`.
    fn increment_fail(&self, user: UserId) -> impl Future<Output = StoreResult<()>> + Send {
        self.apply(vec![StoreOp::IncrementFail(user)])
    }

    /// Raises the user's best count to `n` if it is lower.
    fn set_highest_if_greater(
        &self,
        user: UserId,
        n: u64,
    ) -> impl Future<Output = StoreResult<()>> + Send {
        self.apply(vec![StoreOp::SetHighestIfGreater(user, n)])
    }

    /// Replaces the state of `channel`.
    fn save_channel(
        &self,
        channel: ChannelId,
        state: GameState,
    ) -> impl Future<Output = StoreResult<()>> + Send {
        self.apply(vec![StoreOp::SaveChannel(channel, state)])
    }
}

/// Rows a batch will write, computed before anything is written.
#[derive(Debug, Default)]
pub(crate) struct Staged {
    users: HashMap<UserId, UserStats>,
    channels: HashMap<ChannelId, GameState>,
}

/// The tables both stores keep in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Tables {
    pub(crate) users: HashMap<UserId, UserStats>,
    pub(crate) channels: HashMap<ChannelId, GameState>,
}

impl Tables {
    /// Applies `batch` all-or-nothing.
    pub(crate) fn apply(&mut self, batch: &[StoreOp]) -> StoreResult<()> {
        let staged = self.stage(batch)?;
        self.commit(staged);
        Ok(())
    }

    /// Computes the rows `batch` touches without changing anything.
    pub(crate) fn stage(&self, batch: &[StoreOp]) -> StoreResult<Staged> {
        let mut staged = Staged::default();

        for op in batch {
            match *op {
                StoreOp::IncrementSuccess(user) => {
                    let stats = self.staged(&mut staged.users, user);
                    stats.successes = stats
                        .successes
                        .checked_add(1)
                        .ok_or(StoreError::CounterOverflow(user.get()))?;
                }
                StoreOp::IncrementFail(user) => {
                    let stats = self.staged(&mut staged.users, user);
                    stats.fails = stats
                        .fails
                        .checked_add(1)
                        .ok_or(StoreError::CounterOverflow(user.get()))?;
                }
                StoreOp::SetHighestIfGreater(user, n) => {
                    let stats = self.staged(&mut staged.users, user);
                    stats.highest_user_count = stats.highest_user_count.max(n);
                }
                StoreOp::PutUser(user, stats) => {
                    staged.users.insert(user, stats);
                }
                StoreOp::SaveChannel(channel, state) => {
                    staged.channels.insert(channel, state);
                }
            }
        }
        Ok(staged)
    }

    /// Installs rows computed by [`Tables::stage`].
    pub(crate) fn commit(&mut self, staged: Staged) {
        self.users.extend(staged.users);
        self.channels.extend(staged.channels);
    }

    fn staged<'a>(
        &self,
        staged: &'a mut HashMap<UserId, UserStats>,
        user: UserId,
    ) -> &'a mut UserStats {
        staged
            .entry(user)
            .or_insert_with(|| self.users.get(&user).copied().unwrap_or_default())
    }

    pub(crate) fn read(&self, user: UserId) -> UserStats {
        self.users.get(&user).copied().unwrap_or_default()
    }

    pub(crate) fn leaderboard(&self, limit: usize) -> Vec<(UserId, UserStats)> {
        let mut rows: Vec<(UserId, UserStats)> =
            self.users.iter().map(|(user, stats)| (*user, *stats)).collect();
        rows.sort_unstable_by(|(a_user, a), (b_user, b)| {
            b.successes
                .cmp(&a.successes)
                .then(b.highest_user_count.cmp(&a.highest_user_count))
                .then(a_user.cmp(b_user))
        });
        rows.truncate(limit);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_is_all_or_nothing() {
        let user = UserId::new(1);
        let mut tables = Tables::default();
        tables
            .apply(&[StoreOp::PutUser(
                user,
                UserStats {
                    successes: u64::MAX,
                    ..UserStats::default()
                },
            )])
            .unwrap();

        let before = tables.clone();
        let err = tables
            .apply(&[
                StoreOp::IncrementFail(user),
                StoreOp::SaveChannel(ChannelId::new(5), GameState::new()),
                StoreOp::IncrementSuccess(user),
            ])
            .unwrap_err();
        assert_eq!(err, StoreError::CounterOverflow(1));
        assert_eq!(tables, before);
    }

    #[test]
    fn test_highest_only_rises() {
        let user = UserId::new(2);
        let mut tables = Tables::default();
        tables
            .apply(&[
                StoreOp::SetHighestIfGreater(user, 10),
                StoreOp::SetHighestIfGreater(user, 4),
            ])
            .unwrap();
        assert_eq!(tables.read(user).highest_user_count, 10);
    }

    #[test]
    fn test_leaderboard_order() {
        let mut tables = Tables::default();
        for (id, successes) in [(1, 3), (2, 9), (3, 3), (4, 0)] {
            tables
                .apply(&[StoreOp::PutUser(
                    UserId::new(id),
                    UserStats {
                        successes,
                        ..UserStats::default()
                    },
                )])
                .unwrap();
        }
        let top: Vec<u64> = tables.leaderboard(3).iter().map(|(u, _)| u.get()).collect();
        assert_eq!(top, vec![2, 1, 3]);
    }
}
