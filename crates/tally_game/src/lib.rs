//! # Tally Counting Game
//!
//! The rules of a chat counting game, and the machinery that keeps its
//! statistics straight.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ text  ┌──────────────┐ result ┌──────────────┐
//! │     Host     │ ────▶ │ CountingGame │ ◀───── │   Sandbox    │
//! │ (chat side)  │ ◀──── │  (per chan)  │        │ (tally_expr) │
//! └──────────────┘ react └──────────────┘        └──────────────┘
//!                   reply        │ commit
//!                   roles        ▼
//!                        ┌──────────────┐
//!                        │  CountStore  │ memory | journal
//!                        └──────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure rules** - [`engine::transition`] is a function, not a service
//! 2. **Atomic commits** - a transition's writes land together or not at all
//! 3. **Best-effort host** - reactions and roles never block or undo the game
//! 4. **One key per thing** - every id is a `u64` newtype

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod host;
pub mod ids;
pub mod messages;
pub mod outcome;
pub mod state;
pub mod store;

pub use config::CountingConfig;
pub use engine::{classify, transition, Classification, Transition};
pub use error::{ConfigError, GameError, GameResult, HostError, StoreError};
pub use game::CountingGame;
pub use host::{Host, HostCall, RecordingHost};
pub use ids::{ChannelId, MessageId, ParseIdError, RoleId, UserId};
pub use outcome::{Directive, DirectiveContext, Outcome, Reaction};
pub use state::{GameState, UserStats};
pub use store::{CountStore, JournalCountStore, MemoryCountStore, StoreOp};
