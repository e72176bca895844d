use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Session,
    Batch,
    Qsub,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Session => write!(f, "session"),
            Mode::Batch => write!(f, "batch"),
            Mode::Qsub => write!(f, "qsub"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(pub String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid mode: '{}'. Valid values are: session, batch, qsub",
            self.0
        )
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Mode::Session),
            "batch" => Ok(Mode::Batch),
            "qsub" => Ok(Mode::Qsub),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// User-facing knobs, all optional. `resolve` turns them into the
/// concrete values the scheduler loop runs with.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Mode,
    pub max_queued: Option<usize>,
    pub time_between_checks: Option<f64>,
    pub nb_checks_per_point: Option<u64>,
    pub max_buffer: Option<usize>,
    pub shell_options: String,
    pub qsub_options: String,
    pub restart: Vec<String>,
}

/// Fully resolved configuration. Every field is concrete; the loop never
/// consults a default again.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub mode: Mode,
    pub max_queued: usize,
    pub time_between_checks: Duration,
    pub nb_checks_per_point: u64,
    pub max_buffer: usize,
    pub shell_options: String,
    pub qsub_options: String,
}

impl RunOptions {
    pub fn resolve(&self) -> Result<ManagerConfig, ConfigError> {
        let max_queued = self.max_queued.unwrap_or(match self.mode {
            Mode::Batch => 1,
            Mode::Session | Mode::Qsub => usize::MAX,
        });

        let seconds = self.time_between_checks.unwrap_or(match self.mode {
            Mode::Session => 0.0,
            Mode::Batch | Mode::Qsub => 10.0,
        });
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ConfigError::InvalidInterval(seconds));
        }

        let nb_checks_per_point = self.nb_checks_per_point.unwrap_or(match self.mode {
            Mode::Session => u64::MAX,
            Mode::Batch | Mode::Qsub => 6,
        });

        let max_buffer = self.max_buffer.unwrap_or(10);
        if max_buffer == 0 {
            return Err(ConfigError::InvalidBuffer);
        }

        Ok(ManagerConfig {
            mode: self.mode,
            max_queued,
            time_between_checks: Duration::from_secs_f64(seconds),
            nb_checks_per_point,
            max_buffer,
            shell_options: self.shell_options.clone(),
            qsub_options: self.qsub_options.clone(),
        })
    }
}
