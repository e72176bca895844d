use crate::model::JobName;
use crate::tags::LogDir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    None,
    Submitted,
    Running,
    Finished,
    Failed,
    /// The backend wrapper exited but the runner never reported a verdict.
    /// Intermediate state on the non-blocking backends.
    Exit,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::None => "none",
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Exit => "exit",
        };
        write!(f, "{}", s)
    }
}

/// Resolve a job's status from its tag files, first match wins:
/// finished, failed, exit, running, submitted, none.
///
/// Side-effect free. A job counts as submitted while its generated
/// backend script is still in place.
pub fn read_status(logs: &LogDir, job: &JobName) -> JobStatus {
    if tag_present(&logs.finished(job)) {
        JobStatus::Finished
    } else if tag_present(&logs.failed(job)) {
        JobStatus::Failed
    } else if tag_present(&logs.exit(job)) {
        JobStatus::Exit
    } else if tag_present(&logs.running(job)) {
        JobStatus::Running
    } else if logs.script(job).exists() {
        JobStatus::Submitted
    } else {
        JobStatus::None
    }
}

/// A tag is trusted only once it is non-empty or at least one second old.
/// A backend may have created the file but not yet flushed its content.
fn tag_present(path: &Path) -> bool {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return false,
    };
    if meta.len() > 0 {
        return true;
    }
    match meta.modified() {
        Ok(mtime) => SystemTime::now()
            .duration_since(mtime)
            .map(|age| age >= Duration::from_secs(1))
            .unwrap_or(false),
        Err(_) => true,
    }
}
