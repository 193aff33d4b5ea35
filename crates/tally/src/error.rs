//! # Shim Error Types

use tally_game::{ConfigError, GameError, StoreError};
use thiserror::Error;

/// Errors surfaced to the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A message could not be applied.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Result type for shim operations.
pub type TallyResult<T> = Result<T, TallyError>;
