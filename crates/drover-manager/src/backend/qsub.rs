use super::{write_script, Backend, Submission};
use crate::error::SchedulerError;
use drover_core::constants::QSUB_NAME_MAX;
use drover_core::model::JobName;
use drover_core::{Environment, LogDir};
use std::process::Command;

/// Cluster batch submission (SGE/PBS family). The generated script is
/// handed to `qsub` with the job's stdout/stderr captured next to its
/// tags; `qsub_options` is forwarded verbatim.
pub struct QsubBackend {
    env: Environment,
    shell_options: String,
    qsub_options: String,
}

impl QsubBackend {
    pub fn new(env: Environment, shell_options: String, qsub_options: String) -> Self {
        QsubBackend {
            env,
            shell_options,
            qsub_options,
        }
    }
}

fn truncate_name(name: &str) -> String {
    name.chars().take(QSUB_NAME_MAX).collect()
}

impl Backend for QsubBackend {
    fn label(&self) -> &'static str {
        "qsub"
    }

    fn submit(&self, logs: &LogDir, job: &JobName) -> Result<Submission, SchedulerError> {
        let script = write_script(logs, job, &self.env, &self.shell_options)?;

        let mut cmd = Command::new(&self.env.qsub_bin);
        cmd.arg("-e")
            .arg(logs.eqsub(job))
            .arg("-o")
            .arg(logs.oqsub(job))
            .arg("-N")
            .arg(truncate_name(job.as_str()));
        for opt in self.qsub_options.split_whitespace() {
            cmd.arg(opt);
        }
        cmd.arg(&script);

        let output = cmd.output().map_err(|e| SchedulerError::Dispatch {
            job: job.clone(),
            detail: format!("could not invoke '{}': {}", self.env.qsub_bin.display(), e),
        })?;

        if !output.status.success() {
            return Err(SchedulerError::Dispatch {
                job: job.clone(),
                detail: format!(
                    "'{}' returned {}: {}",
                    self.env.qsub_bin.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(Submission::Dispatched)
    }
}
