use crate::error::LockError;
use chrono::Local;
use drover_core::tags;
use drover_core::LogDir;
use std::io::{self, Write};
use std::path::PathBuf;

/// Ownership of a log directory. At most one manager holds the lock;
/// create-exclusive semantics are the only locking primitive used.
///
/// The guard releases the lock on drop so every exit path (success,
/// error, panic) leaves the directory claimable.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    armed: bool,
}

impl LockGuard {
    pub fn acquire(logs: &LogDir, force: bool) -> Result<Self, LockError> {
        let path = logs.lock();
        match Self::try_create(&path) {
            Ok(()) => Ok(LockGuard { path, armed: true }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if force {
                    tracing::warn!("Replacing existing lock at {}", path.display());
                    fs_err::remove_file(&path)?;
                    Self::try_create(&path)?;
                    Ok(LockGuard { path, armed: true })
                } else {
                    let since = fs_err::read_to_string(&path)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default();
                    let since = if since.is_empty() {
                        "an unknown time".to_string()
                    } else {
                        since
                    };
                    Err(LockError::Held { path, since })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn try_create(path: &PathBuf) -> io::Result<()> {
        let mut file = fs_err::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        writeln!(file, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        file.flush()
    }

    /// An operator deleting the lock file is the sanctioned way to ask a
    /// running manager to shut down.
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    pub fn release(mut self) -> io::Result<()> {
        self.armed = false;
        tags::remove_tag(&self.path)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = tags::remove_tag(&self.path);
        }
    }
}
