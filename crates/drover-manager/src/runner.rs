use crate::backend::Outcome;
use crate::error::RunnerError;
use chrono::Local;
use drover_core::model::{JobName, JobRecord};
use drover_core::tags;
use drover_core::{Environment, LogDir};
use std::io::Write;
use std::process::{Command, Stdio};

/// Execute one job to completion: write the `.running` tag, run the
/// declared command under the shell with its output captured in the job
/// log, then leave exactly one verdict tag behind.
///
/// Only the runner writes a job's `.running`/`.finished`/`.failed`
/// tags; the manager learns the verdict by reading them back (or, in
/// session mode, from the returned `Outcome` directly).
pub fn run_job(logs: &LogDir, job: &JobName, env: &Environment) -> Result<Outcome, RunnerError> {
    // A pre-existing kill tag means the manager gave up on this job
    // before we started; honor it without running anything.
    if logs.kill_tag(job).exists() {
        tags::create_tag(&logs.failed(job))?;
        return Ok(Outcome::Failed);
    }

    tags::create_tag(&logs.running(job))?;
    let result = execute(logs, job, env);
    tags::remove_tag(&logs.running(job))?;

    match result {
        Ok(true) => {
            tags::create_tag(&logs.finished(job))?;
            Ok(Outcome::Finished)
        }
        Ok(false) => {
            tags::create_tag(&logs.failed(job))?;
            Ok(Outcome::Failed)
        }
        Err(e) => {
            // The manager must still see a verdict, whatever went wrong.
            let _ = tags::create_tag(&logs.failed(job));
            Err(e)
        }
    }
}

fn execute(logs: &LogDir, job: &JobName, env: &Environment) -> Result<bool, RunnerError> {
    let payload_path = logs.payload(job);
    let bytes = fs_err::read(&payload_path).map_err(|source| RunnerError::Payload {
        job: job.clone(),
        source,
    })?;
    let record: JobRecord =
        serde_json::from_slice(&bytes).map_err(|source| RunnerError::PayloadFormat {
            job: job.clone(),
            source,
        })?;

    let mut log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs.log(job))?;
    writeln!(
        log,
        "{} - Running '{}'",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        record.declaration.command
    )?;

    let status = Command::new(&env.shell)
        .arg("-c")
        .arg(&record.declaration.command)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log.try_clone()?))
        .status()?;

    writeln!(
        log,
        "{} - Exit status: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        status.code().map_or("killed".to_string(), |c| c.to_string())
    )?;

    Ok(status.success())
}
