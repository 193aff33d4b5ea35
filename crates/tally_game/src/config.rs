//! # Game Configuration
//!
//! Loaded once at startup from TOML. Every key is optional:
//!
//! ```toml
//! counting_channel_id = 1180000000000000000
//! counting_ban_role = 1180000000000000001
//! counting_fail_role = 1180000000000000002
//! evaluation_deadline_ms = 2000
//! working_precision_digits = 1048575
//! final_fractional_digits = 20
//! worker_stack_bytes = 16777216
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tally_expr::decimal::{
    DEFAULT_FRACTIONAL_DIGITS, DEFAULT_PRECISION, MAX_FRACTIONAL_DIGITS, MAX_PRECISION,
    MIN_PRECISION,
};
use tally_expr::{EvaluatorSettings, SandboxConfig};

use crate::error::{ConfigError, ConfigResult};
use crate::ids::{ChannelId, RoleId};

/// Shortest evaluation deadline accepted.
pub const MIN_DEADLINE_MS: u64 = 100;

/// Smallest worker stack accepted (1 MiB).
pub const MIN_STACK_BYTES: usize = 1024 * 1024;

/// Counting game configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountingConfig {
    /// Channel hosting the game. `None` accepts every channel.
    pub counting_channel_id: Option<u64>,
    /// Users holding this role cannot count.
    pub counting_ban_role: Option<u64>,
    /// Role granted to a user who breaks the count.
    pub counting_fail_role: Option<u64>,
    /// Wall-clock budget per evaluation.
    pub evaluation_deadline_ms: u64,
    /// Working precision of the evaluator, in digits.
    pub working_precision_digits: u64,
    /// Places kept after the point in an evaluated count.
    pub final_fractional_digits: u32,
    /// Stack size of each evaluation worker.
    pub worker_stack_bytes: usize,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            counting_channel_id: None,
            counting_ban_role: None,
            counting_fail_role: None,
            evaluation_deadline_ms: 2000,
            working_precision_digits: DEFAULT_PRECISION,
            final_fractional_digits: DEFAULT_FRACTIONAL_DIGITS,
            worker_stack_bytes: tally_expr::sandbox::DEFAULT_STACK_BYTES,
        }
    }
}

impl CountingConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown keys,
    /// [`ConfigError::OutOfRange`] for values outside their bounds.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks every bounded value.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError::OutOfRange`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.evaluation_deadline_ms < MIN_DEADLINE_MS {
            return Err(ConfigError::OutOfRange {
                field: "evaluation_deadline_ms",
                value: self.evaluation_deadline_ms,
                bounds: ">= 100",
            });
        }
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.working_precision_digits) {
            return Err(ConfigError::OutOfRange {
                field: "working_precision_digits",
                value: self.working_precision_digits,
                bounds: "64..=16777215",
            });
        }
        if self.final_fractional_digits > MAX_FRACTIONAL_DIGITS {
            return Err(ConfigError::OutOfRange {
                field: "final_fractional_digits",
                value: u64::from(self.final_fractional_digits),
                bounds: "0..=40",
            });
        }
        if self.worker_stack_bytes < MIN_STACK_BYTES {
            return Err(ConfigError::OutOfRange {
                field: "worker_stack_bytes",
                value: self.worker_stack_bytes as u64,
                bounds: ">= 1048576",
            });
        }
        Ok(())
    }

    /// The game channel, if one is configured.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelId> {
        self.counting_channel_id.map(ChannelId::new)
    }

    /// The ban role, if one is configured.
    #[must_use]
    pub fn ban_role(&self) -> Option<RoleId> {
        self.counting_ban_role.map(RoleId::new)
    }

    /// The fail role, if one is configured.
    #[must_use]
    pub fn fail_role(&self) -> Option<RoleId> {
        self.counting_fail_role.map(RoleId::new)
    }

    /// Evaluation deadline.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.evaluation_deadline_ms)
    }

    /// Numeric settings for the kernel.
    #[must_use]
    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            precision: self.working_precision_digits,
            fractional_digits: self.final_fractional_digits,
        }
    }

    /// Sandbox settings.
    #[must_use]
    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            deadline: self.deadline(),
            stack_bytes: self.worker_stack_bytes,
            evaluator: self.evaluator_settings(),
        }
    }
}
