//! # Game Error Types
//!
//! All errors that can occur around the counting game. Numeric failures of
//! a count attempt are not errors here: they are [`crate::Outcome`]s.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration {path}: {reason}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        reason: String,
    },

    /// The TOML did not parse or had unknown keys.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// A value outside its permitted range.
    #[error("{field} = {value} is out of range (expected {bounds})")]
    OutOfRange {
        /// Offending key.
        field: &'static str,
        /// Value that was given.
        value: u64,
        /// Human-readable permitted range.
        bounds: &'static str,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by a [`crate::store::CountStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O failed: {0}")]
    Io(String),

    /// The journal header is not ours or has an unsupported version.
    #[error("not a tally journal: {0}")]
    BadHeader(String),

    /// A committed record failed its checksum.
    #[error("journal record {lsn} is corrupt")]
    Corrupt {
        /// Sequence number of the bad record.
        lsn: u64,
    },

    /// A counter would exceed `u64`.
    #[error("counter overflow for user {0}")]
    CounterOverflow(u64),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`crate::host::Host`] capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host refused the action (missing permission, unknown message).
    #[error("host rejected {action}: {reason}")]
    Rejected {
        /// Capability that was invoked.
        action: &'static str,
        /// Host-supplied reason.
        reason: String,
    },

    /// The host could not be reached.
    #[error("host unavailable")]
    Unavailable,
}

/// Result type for host capabilities.
pub type HostResult<T> = Result<T, HostError>;

/// Errors that abort a [`crate::CountingGame::step`].
///
/// When one of these is returned the channel state is exactly what it was
/// before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The store refused the commit.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The commit task was torn down before it finished.
    #[error("commit task aborted: {0}")]
    CommitAborted(String),
}

/// Result type for game operations.
pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ConfigError::OutOfRange {
            field: "evaluation_deadline_ms",
            value: 5,
            bounds: ">= 100",
        };
        assert_eq!(
            err.to_string(),
            "evaluation_deadline_ms = 5 is out of range (expected >= 100)"
        );
        assert_eq!(
            GameError::from(StoreError::Corrupt { lsn: 7 }).to_string(),
            "journal record 7 is corrupt"
        );
    }
}
