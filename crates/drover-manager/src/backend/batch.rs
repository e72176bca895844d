use super::{write_script, Backend, Submission};
use crate::error::SchedulerError;
use drover_core::model::JobName;
use drover_core::{Environment, LogDir};
use std::process::Command;

/// Local one-shot queue. Each job becomes a generated script handed to
/// `at` for immediate background execution; the queue itself provides
/// the detachment from the manager process.
pub struct BatchBackend {
    env: Environment,
    shell_options: String,
}

impl BatchBackend {
    pub fn new(env: Environment, shell_options: String) -> Self {
        BatchBackend { env, shell_options }
    }
}

impl Backend for BatchBackend {
    fn label(&self) -> &'static str {
        "batch"
    }

    fn submit(&self, logs: &LogDir, job: &JobName) -> Result<Submission, SchedulerError> {
        let script = write_script(logs, job, &self.env, &self.shell_options)?;

        let output = Command::new(&self.env.at_bin)
            .arg("-f")
            .arg(&script)
            .arg("now")
            .output()
            .map_err(|e| SchedulerError::Dispatch {
                job: job.clone(),
                detail: format!("could not invoke '{}': {}", self.env.at_bin.display(), e),
            })?;

        if !output.status.success() {
            return Err(SchedulerError::Dispatch {
                job: job.clone(),
                detail: format!(
                    "'{}' returned {}: {}",
                    self.env.at_bin.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(Submission::Dispatched)
    }
}
