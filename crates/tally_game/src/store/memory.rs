//! In-memory store. Everything is lost with the process.

use parking_lot::Mutex;

use super::{CountStore, StoreOp, Tables};
use crate::error::StoreResult;
use crate::ids::{ChannelId, UserId};
use crate::state::{GameState, UserStats};

/// Tables behind one lock.
#[derive(Debug, Default)]
pub struct MemoryCountStore {
    tables: Mutex<Tables>,
}

impl MemoryCountStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with statistics.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.tables.lock().users.len()
    }
}

impl CountStore for MemoryCountStore {
    async fn read(&self, user: UserId) -> StoreResult<UserStats> {
        Ok(self.tables.lock().read(user))
    }

    async fn load_channel(&self, channel: ChannelId) -> StoreResult<Option<GameState>> {
        Ok(self.tables.lock().channels.get(&channel).copied())
    }

    async fn apply(&self, batch: Vec<StoreOp>) -> StoreResult<()> {
        self.tables.lock().apply(&batch)
    }

    async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<(UserId, UserStats)>> {
        Ok(self.tables.lock().leaderboard(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MessageId;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryCountStore::new();
        let user = UserId::new(3);
        store.increment_success(user).await.unwrap();
        store.increment_success(user).await.unwrap();
        store.increment_fail(user).await.unwrap();
        store.set_highest_if_greater(user, 12).await.unwrap();
        store.set_highest_if_greater(user, 7).await.unwrap();

        assert_eq!(
            store.read(user).await.unwrap(),
            UserStats {
                successes: 2,
                fails: 1,
                highest_user_count: 12,
            }
        );
        assert_eq!(store.read(UserId::new(99)).await.unwrap(), UserStats::default());
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_channels() {
        let store = MemoryCountStore::new();
        let channel = ChannelId::new(1);
        assert_eq!(store.load_channel(channel).await.unwrap(), None);

        let state = GameState::new().advanced(UserId::new(1), 1, MessageId::new(2));
        store.save_channel(channel, state).await.unwrap();
        assert_eq!(store.load_channel(channel).await.unwrap(), Some(state));
    }
}
