//! # Counting Game Driver
//!
//! Runs one channel's game against a store and a host.
//!
//! ```text
//! text ─► classify ─► ban check ─► [channel lock] ─► sandbox ─► transition
//!                                                                 │
//!                        host directives ◄── commit (spawned) ◄───┘
//! ```
//!
//! ## Guarantees
//!
//! - Messages of one channel are applied one at a time, in lock order.
//! - Nothing is written until the sandbox has returned.
//! - The commit runs in its own task: dropping the caller's future after
//!   evaluation cannot leave a transition half applied.
//! - Host failures are logged and never undo a commit.

use std::sync::Arc;

use tokio::sync::Mutex;

use tally_expr::{Sandbox, TaggedResult};

use crate::config::CountingConfig;
use crate::engine::{self, Classification};
use crate::error::{GameError, GameResult};
use crate::host::Host;
use crate::ids::{ChannelId, MessageId, UserId};
use crate::outcome::{Directive, DirectiveContext, Outcome};
use crate::state::GameState;
use crate::store::{CountStore, StoreOp};

/// One channel's counting game.
pub struct CountingGame<S, H> {
    channel: ChannelId,
    config: CountingConfig,
    sandbox: Arc<Sandbox>,
    store: Arc<S>,
    host: Arc<H>,
    state: Arc<Mutex<GameState>>,
}

impl<S, H> CountingGame<S, H>
where
    S: CountStore + 'static,
    H: Host + 'static,
{
    /// Opens the game of `channel`, resuming its saved state.
    ///
    /// # Errors
    ///
    /// [`GameError::Store`] when the saved state cannot be read.
    pub async fn open(
        channel: ChannelId,
        config: CountingConfig,
        sandbox: Arc<Sandbox>,
        store: Arc<S>,
        host: Arc<H>,
    ) -> GameResult<Self> {
        let state = store.load_channel(channel).await?.unwrap_or_default();
        tracing::debug!(
            channel = channel.get(),
            last_count = state.last_count,
            highest_count = state.highest_count,
            "game opened"
        );
        Ok(Self {
            channel,
            config,
            sandbox,
            store,
            host,
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// The channel this game runs in.
    #[must_use]
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Current state, after every commit that finished.
    pub async fn state(&self) -> GameState {
        *self.state.lock().await
    }

    /// Shared store handle.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Shared host handle.
    #[must_use]
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Classifies raw message text and steps the game with it.
    ///
    /// # Errors
    ///
    /// As [`Self::step`].
    pub async fn process(&self, user: UserId, message: MessageId, text: &str) -> GameResult<Outcome> {
        match engine::classify(text) {
            Classification::NotACount => Ok(Outcome::NotACount),
            Classification::Candidate(expr) => self.step(user, message, &expr).await,
        }
    }

    /// Evaluates a candidate (kernel syntax) and applies it.
    ///
    /// # Errors
    ///
    /// [`GameError::Store`] when the commit is refused, and
    /// [`GameError::CommitAborted`] when the commit task dies. In both cases
    /// the channel state is unchanged.
    pub async fn step(&self, user: UserId, message: MessageId, candidate: &str) -> GameResult<Outcome> {
        if self.is_banned(user).await {
            tracing::debug!(user = user.get(), "banned user ignored");
            return Ok(Outcome::RejectedBanned);
        }

        let guard = Arc::clone(&self.state).lock_owned().await;
        let result = self.sandbox.run_async(candidate).await;
        tracing::trace!(user = user.get(), tag = result.tag(), "evaluated");

        let previous = *guard;
        let transition = engine::transition(&previous, user, message, &result);
        let mut ops = transition.ops;
        if transition.next != previous {
            ops.push(StoreOp::SaveChannel(self.channel, transition.next));
        }

        let store = Arc::clone(&self.store);
        let next = transition.next;
        let commit = tokio::spawn(async move {
            let mut guard = guard;
            if !ops.is_empty() {
                store.apply(ops).await?;
            }
            *guard = next;
            Ok::<(), GameError>(())
        });
        commit
            .await
            .map_err(|e| GameError::CommitAborted(e.to_string()))??;

        let outcome = transition.outcome;
        let directives = outcome.directives(&DirectiveContext {
            user,
            message,
            previous_count: previous.last_count,
            fail_role: self.config.fail_role(),
        });
        self.execute(directives).await;
        Ok(outcome)
    }

    /// Evaluates without touching the game.
    pub async fn evaluate(&self, candidate: &str) -> TaggedResult {
        self.sandbox.run_async(candidate).await
    }

    async fn is_banned(&self, user: UserId) -> bool {
        let Some(role) = self.config.ban_role() else {
            return false;
        };
        match self.host.is_member_of_role(user, role).await {
            Ok(banned) => banned,
            Err(err) => {
                tracing::warn!(user = user.get(), %err, "ban check failed, letting the count through");
                false
            }
        }
    }

    async fn execute(&self, directives: Vec<Directive>) {
        for directive in directives {
            let result = match &directive {
                Directive::React { message, reaction } => self.host.react(*message, *reaction).await,
                Directive::Reply { message, text } => self.host.reply(*message, text).await,
                Directive::ApplyRole { user, role } => self.host.apply_role(*user, *role).await,
            };
            if let Err(err) = result {
                tracing::warn!(?directive, %err, "host action failed");
            }
        }
    }
}

impl<S, H> std::fmt::Debug for CountingGame<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingGame")
            .field("channel", &self.channel)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
