pub mod backend;
pub mod error;
pub mod heartbeat;
pub mod init;
pub mod lock;
pub mod report;
pub mod runner;
pub mod scheduler;

pub use error::ManagerError;
pub use report::RunSummary;

use crate::heartbeat::Heartbeat;
use crate::lock::LockGuard;
use crate::report::History;
use crate::scheduler::Scheduler;
use drover_core::{Environment, LogDir, Pipeline, RunOptions};
use std::path::PathBuf;

/// Drive a pipeline to termination: acquire the lock, reconcile the log
/// directory, then run the scheduler loop with a heartbeat on the side.
///
/// The lock is released on every exit path; per-job failures are
/// contained in the returned summary, manager-level failures are `Err`.
pub fn run_pipeline(
    pipeline: &Pipeline,
    logs_root: impl Into<PathBuf>,
    options: &RunOptions,
    env: &Environment,
    force_lock: bool,
) -> Result<RunSummary, ManagerError> {
    let cfg = options.resolve()?;
    let logs = LogDir::new(logs_root);

    fs_err::create_dir_all(logs.root())?;
    let lock = LockGuard::acquire(&logs, force_lock)?;

    let graph = init::initialize(&logs, pipeline, &options.restart)?;

    let history = History::new(&logs);
    history.banner(env, &cfg, graph.len())?;

    let backend = backend::backend_for(&cfg, env);
    let heartbeat = Heartbeat::start(&logs);

    let mut scheduler = Scheduler::new(logs, graph, cfg, backend);
    let result = scheduler.run(&lock);

    drop(heartbeat);
    lock.release()?;
    result.map_err(Into::into)
}
