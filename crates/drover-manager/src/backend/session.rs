use super::{Backend, Submission};
use crate::error::SchedulerError;
use crate::runner;
use drover_core::model::JobName;
use drover_core::{Environment, LogDir};

/// In-process execution. `submit` blocks until the job is done and
/// returns the verdict directly; tag files are still written so the log
/// directory reads the same as with the other backends.
pub struct SessionBackend {
    env: Environment,
}

impl SessionBackend {
    pub fn new(env: Environment) -> Self {
        SessionBackend { env }
    }
}

impl Backend for SessionBackend {
    fn label(&self) -> &'static str {
        "session"
    }

    fn blocking(&self) -> bool {
        true
    }

    fn submit(&self, logs: &LogDir, job: &JobName) -> Result<Submission, SchedulerError> {
        let outcome =
            runner::run_job(logs, job, &self.env).map_err(|e| SchedulerError::Dispatch {
                job: job.clone(),
                detail: e.to_string(),
            })?;
        Ok(Submission::Completed(outcome))
    }
}
