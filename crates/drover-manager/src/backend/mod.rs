mod batch;
mod qsub;
mod session;

pub use batch::BatchBackend;
pub use qsub::QsubBackend;
pub use session::SessionBackend;

use crate::error::SchedulerError;
use drover_core::model::JobName;
use drover_core::{Environment, LogDir, ManagerConfig, Mode};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Failed,
}

/// What `submit` left behind: a verdict (blocking backends) or a side
/// effect that will eventually make the runner execute (non-blocking).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Completed(Outcome),
    Dispatched,
}

/// Uniform submission contract across execution strategies. Backends
/// never touch the scheduler masks; all they may do is run the job or
/// cause it to be run.
pub trait Backend {
    fn label(&self) -> &'static str;

    fn blocking(&self) -> bool {
        false
    }

    fn submit(&self, logs: &LogDir, job: &JobName) -> Result<Submission, SchedulerError>;
}

pub fn backend_for(cfg: &ManagerConfig, env: &Environment) -> Box<dyn Backend> {
    match cfg.mode {
        Mode::Session => Box::new(SessionBackend::new(env.clone())),
        Mode::Batch => Box::new(BatchBackend::new(env.clone(), cfg.shell_options.clone())),
        Mode::Qsub => Box::new(QsubBackend::new(
            env.clone(),
            cfg.shell_options.clone(),
            cfg.qsub_options.clone(),
        )),
    }
}

/// Generate `tmp/<job>.sh`: optional user prologue, the runner
/// invocation with its output captured into the job log, and the exit
/// sentinel the scheduler uses to detect a wrapper that died without a
/// verdict.
pub(crate) fn write_script(
    logs: &LogDir,
    job: &JobName,
    env: &Environment,
    shell_options: &str,
) -> Result<PathBuf, SchedulerError> {
    let script_path = logs.script(job);

    let mut content = String::from("#!/bin/sh\n");
    if !shell_options.trim().is_empty() {
        content.push_str(shell_options.trim_end());
        content.push('\n');
    }
    content.push_str(&format!(
        "{} internal-run --logs {} --job {} >> {} 2>&1\n",
        sh_quote(&env.runner.to_string_lossy()),
        sh_quote(&logs.root().to_string_lossy()),
        sh_quote(job.as_str()),
        sh_quote(&logs.log(job).to_string_lossy()),
    ));
    content.push_str(&format!(
        "touch {}\n",
        sh_quote(&logs.exit(job).to_string_lossy())
    ));

    write_executable(&script_path, &content).map_err(|e| SchedulerError::Dispatch {
        job: job.clone(),
        detail: format!("could not write {}: {}", script_path.display(), e),
    })?;
    Ok(script_path)
}

fn write_executable(path: &Path, content: &str) -> io::Result<()> {
    fs_err::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs_err::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Salvage what the dead wrapper left behind into the job log so the
/// user has one place to look. The wrapper's own captures (`.oqsub`,
/// `.eqsub`) are appended under labeled banners when present.
pub(crate) fn append_crash_report(logs: &LogDir, job: &JobName) -> io::Result<()> {
    let mut log = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs.log(job))?;

    writeln!(log, "\n*****************************************")?;
    writeln!(
        log,
        "The backend wrapper for job '{}' exited before the runner reported a verdict.",
        job
    )?;
    writeln!(log, "*****************************************")?;

    for (banner, path) in [
        ("qsub stdout", logs.oqsub(job)),
        ("qsub stderr", logs.eqsub(job)),
    ] {
        if let Ok(content) = fs_err::read_to_string(&path) {
            if !content.trim().is_empty() {
                writeln!(log, "***** {} ({}) *****", banner, path.display())?;
                writeln!(log, "{}", content.trim_end())?;
            }
        }
    }
    Ok(())
}
