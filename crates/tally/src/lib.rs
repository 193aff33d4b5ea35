//! # Tally
//!
//! The two entry points a chat host needs:
//!
//! - [`Tally::evaluate`]: text to [`TaggedResult`], no state involved
//! - [`Tally::process_count`]: text to [`Outcome`], applied to the game of
//!   the channel it was posted in
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally::Tally;
//! use tally_game::{CountingConfig, MemoryCountStore, RecordingHost};
//!
//! let tally = Tally::new(
//!     CountingConfig::default(),
//!     Arc::new(MemoryCountStore::new()),
//!     Arc::new(RecordingHost::new()),
//! );
//! let outcome = tally.process_count(channel, user, message, "0x1").await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod console;
pub mod error;

pub use error::{TallyError, TallyResult};

use std::collections::HashMap;
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use tally_expr::{evaluate_message_async, Sandbox, TaggedResult};
use tally_game::{
    ChannelId, CountStore, CountingConfig, CountingGame, Host, MessageId, Outcome, UserId,
    UserStats,
};

static TRACING_INIT: Once = Once::new();

/// Installs a `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies (for
/// example `"info"` or `"tally_game=debug"`). Safe to call more than once.
pub fn init_tracing(default_filter: &str) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        let installed = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
        if installed.is_err() {
            tracing::debug!("a global subscriber was already installed");
        }
    });
}

/// Host-facing entry point: one sandbox, one store, a game per channel.
pub struct Tally<S, H> {
    config: CountingConfig,
    sandbox: Arc<Sandbox>,
    store: Arc<S>,
    host: Arc<H>,
    games: Mutex<HashMap<ChannelId, Arc<CountingGame<S, H>>>>,
}

impl<S, H> Tally<S, H>
where
    S: CountStore + 'static,
    H: Host + 'static,
{
    /// Builds the shim. Games are opened on their first message.
    #[must_use]
    pub fn new(config: CountingConfig, store: Arc<S>, host: Arc<H>) -> Self {
        let sandbox = Arc::new(Sandbox::new(config.sandbox_config()));
        tracing::info!(
            channel = ?config.counting_channel_id,
            deadline_ms = config.evaluation_deadline_ms,
            precision = config.working_precision_digits,
            "tally ready"
        );
        Self {
            config,
            sandbox,
            store,
            host,
            games: Mutex::new(HashMap::new()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CountingConfig {
        &self.config
    }

    /// Shared store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Shared host.
    #[must_use]
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Evaluates raw message text. Touches no game state.
    pub async fn evaluate(&self, text: &str) -> TaggedResult {
        evaluate_message_async(text, &self.sandbox).await
    }

    /// Applies a message to the game of `channel`.
    ///
    /// Messages outside the configured game channel are
    /// [`Outcome::NotACount`].
    ///
    /// # Errors
    ///
    /// [`TallyError::Game`] when the game cannot be opened or the commit
    /// fails; the channel state is then unchanged.
    pub async fn process_count(
        &self,
        channel: ChannelId,
        user: UserId,
        message: MessageId,
        text: &str,
    ) -> TallyResult<Outcome> {
        if self.config.channel().is_some_and(|game| game != channel) {
            return Ok(Outcome::NotACount);
        }
        let game = self.game(channel).await?;
        let outcome = game.process(user, message, text).await?;
        tracing::debug!(
            channel = channel.get(),
            user = user.get(),
            outcome = outcome.kind(),
            "message processed"
        );
        Ok(outcome)
    }

    /// Best counters, by successes.
    ///
    /// # Errors
    ///
    /// [`TallyError::Store`] when the store cannot be read.
    pub async fn leaderboard(&self, limit: usize) -> TallyResult<Vec<(UserId, UserStats)>> {
        Ok(self.store.leaderboard(limit).await?)
    }

    /// The game of `channel`, opened on first use.
    async fn game(&self, channel: ChannelId) -> TallyResult<Arc<CountingGame<S, H>>> {
        let existing = self.games.lock().get(&channel).cloned();
        if let Some(game) = existing {
            return Ok(game);
        }
        let opened = CountingGame::open(
            channel,
            self.config.clone(),
            Arc::clone(&self.sandbox),
            Arc::clone(&self.store),
            Arc::clone(&self.host),
        )
        .await?;
        // Two first messages may race here; the first game in wins.
        let mut games = self.games.lock();
        Ok(Arc::clone(
            games.entry(channel).or_insert_with(|| Arc::new(opened)),
        ))
    }
}

impl<S, H> std::fmt::Debug for Tally<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tally")
            .field("config", &self.config)
            .field("games", &self.games.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_expr::ExactDecimal;
    use tally_game::{MemoryCountStore, RecordingHost};

    fn tally(config: CountingConfig) -> Tally<MemoryCountStore, RecordingHost> {
        Tally::new(
            config,
            Arc::new(MemoryCountStore::new()),
            Arc::new(RecordingHost::new()),
        )
    }

    #[tokio::test]
    async fn test_evaluate() {
        let tally = tally(CountingConfig::default());
        assert_eq!(
            tally.evaluate("0x10 # 0b10").await,
            TaggedResult::Success(ExactDecimal::from(256u64))
        );
        assert_eq!(tally.evaluate("hello").await, TaggedResult::Invalid);
    }

    #[tokio::test]
    async fn test_channel_routing() {
        let tally = tally(CountingConfig {
            counting_channel_id: Some(5),
            ..CountingConfig::default()
        });
        let user = UserId::new(1);
        let elsewhere = tally
            .process_count(ChannelId::new(6), user, MessageId::new(1), "1")
            .await
            .unwrap();
        assert_eq!(elsewhere, Outcome::NotACount);

        let here = tally
            .process_count(ChannelId::new(5), user, MessageId::new(2), "1")
            .await
            .unwrap();
        assert!(here.is_accepted());
    }

    #[tokio::test]
    async fn test_games_are_per_channel() {
        let tally = tally(CountingConfig::default());
        for channel in [1, 2] {
            let outcome = tally
                .process_count(ChannelId::new(channel), UserId::new(9), MessageId::new(channel), "1")
                .await
                .unwrap();
            assert!(outcome.is_accepted(), "channel {channel}");
        }
        let top = tally.leaderboard(10).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].1.successes, 2);
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing("warn");
        init_tracing("debug");
    }
}
