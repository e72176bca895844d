use crate::errors::EnvError;
use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Everything the manager needs to know about the machine it runs on,
/// resolved once at startup and threaded through constructors.
#[derive(Debug, Clone)]
pub struct Environment {
    pub user: String,
    pub hostname: String,
    pub os: &'static str,
    /// Shell used by the runner and by generated backend scripts.
    pub shell: PathBuf,
    /// Binary invoked by backend scripts to run a single job.
    pub runner: PathBuf,
    pub at_bin: PathBuf,
    pub qsub_bin: PathBuf,
}

impl Environment {
    pub fn detect() -> Result<Self, EnvError> {
        let user = env::var("USER")
            .or_else(|_| env::var("LOGNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        let hostname = env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .or_else(read_hostname)
            .unwrap_or_else(|| "localhost".to_string());

        let runner = env::current_exe().map_err(EnvError::RunnerNotFound)?;

        Ok(Environment {
            user,
            hostname,
            os: env::consts::OS,
            shell: PathBuf::from("/bin/sh"),
            runner,
            at_bin: PathBuf::from("at"),
            qsub_bin: PathBuf::from("qsub"),
        })
    }
}

fn read_hostname() -> Option<String> {
    let output = Command::new("hostname").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_populates_fields() {
        let env = Environment::detect().unwrap();
        assert!(!env.user.is_empty());
        assert!(!env.hostname.is_empty());
        assert!(!env.os.is_empty());
        assert!(env.runner.is_absolute());
    }
}
