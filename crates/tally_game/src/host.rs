//! # Host Capabilities
//!
//! What the game needs from the chat platform. The game never talks to the
//! platform directly; the host implements this trait.
//!
//! ```text
//! tally_game defines:   host implements:
//! ┌─────────────┐       ┌─────────────┐
//! │ trait Host  │  ←─   │ impl Host   │
//! └─────────────┘       └─────────────┘
//! ```
//!
//! Every capability is best-effort. A failed reaction or role change is
//! logged by the caller and the game state stays as committed.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{HostError, HostResult};
use crate::ids::{MessageId, RoleId, UserId};
use crate::outcome::Reaction;

// ============================================================================
// HOST INTERFACE
// ============================================================================

/// Chat platform capabilities used by the game.
pub trait Host: Send + Sync {
    /// Puts a reaction mark on a message.
    fn react(
        &self,
        message: MessageId,
        reaction: Reaction,
    ) -> impl Future<Output = HostResult<()>> + Send;

    /// Replies to a message.
    fn reply(&self, message: MessageId, text: &str) -> impl Future<Output = HostResult<()>> + Send;

    /// Grants a role to a user.
    fn apply_role(&self, user: UserId, role: RoleId)
        -> impl Future<Output = HostResult<()>> + Send;

    /// Whether `user` holds `role`.
    fn is_member_of_role(
        &self,
        user: UserId,
        role: RoleId,
    ) -> impl Future<Output = HostResult<bool>> + Send;
}

// ============================================================================
// MOCK IMPLEMENTATIONS (For Testing)
// ============================================================================

/// One capability call seen by a [`RecordingHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCall {
    /// `react(message, reaction)`.
    React(MessageId, Reaction),
    /// `reply(message, text)`.
    Reply(MessageId, String),
    /// `apply_role(user, role)`.
    ApplyRole(UserId, RoleId),
}

/// Host that records every call and keeps roles in memory.
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    roles: Mutex<HashSet<(UserId, RoleId)>>,
    failing: AtomicBool,
}

impl RecordingHost {
    /// Host with no roles granted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `role` to `user` up front.
    pub fn grant(&self, user: UserId, role: RoleId) {
        self.roles.lock().insert((user, role));
    }

    /// While set, every action fails with [`HostError::Unavailable`].
    /// Role queries fail too.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    /// Drains the recorded calls.
    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Whether `user` holds `role` right now.
    #[must_use]
    pub fn has_role(&self, user: UserId, role: RoleId) -> bool {
        self.roles.lock().contains(&(user, role))
    }

    fn check(&self) -> HostResult<()> {
        if self.failing.load(Ordering::Relaxed) {
            Err(HostError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl Host for RecordingHost {
    async fn react(&self, message: MessageId, reaction: Reaction) -> HostResult<()> {
        self.check()?;
        self.calls.lock().push(HostCall::React(message, reaction));
        Ok(())
    }

    async fn reply(&self, message: MessageId, text: &str) -> HostResult<()> {
        self.check()?;
        self.calls
            .lock()
            .push(HostCall::Reply(message, text.to_owned()));
        Ok(())
    }

    async fn apply_role(&self, user: UserId, role: RoleId) -> HostResult<()> {
        self.check()?;
        self.roles.lock().insert((user, role));
        self.calls.lock().push(HostCall::ApplyRole(user, role));
        Ok(())
    }

    async fn is_member_of_role(&self, user: UserId, role: RoleId) -> HostResult<bool> {
        self.check()?;
        Ok(self.has_role(user, role))
    }
}
