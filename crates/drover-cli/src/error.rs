use drover_core::config::ParseModeError;
use drover_core::errors::{EnvError, ModelError};
use drover_manager::ManagerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Mode(#[from] ParseModeError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pipeline file: {0}")]
    Json(#[from] serde_json::Error),
}
