use drover_core::errors::{ConfigError, GraphError};
use drover_core::model::JobName;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(
        "Missing input for job '{job}': file '{file}' is produced by no job \
         and does not exist on disk."
    )]
    MissingInput { job: JobName, file: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize pipeline manifest: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error(
        "A manager already owns '{path}' (locked since {since}). \
         Remove the lock file if that manager is dead."
    )]
    Held { path: PathBuf, since: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Backend submission failed for job '{job}': {detail}")]
    Dispatch { job: JobName, detail: String },

    #[error("Operator abort: running jobs were sent a kill signal.")]
    OperatorAbort,

    #[error("No job is runnable and none is running, yet {remaining} job(s) are still pending.")]
    Stalled { remaining: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Could not load the payload for job '{job}': {source}")]
    Payload {
        job: JobName,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed payload for job '{job}': {source}")]
    PayloadFormat {
        job: JobName,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
