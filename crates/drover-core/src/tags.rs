use crate::constants::{ext, pipe};
use crate::model::JobName;
use chrono::Local;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Canonical naming of every artifact in a log directory.
///
/// The filesystem is the serialization boundary between the manager and
/// the job runners; this type only builds paths and offers the atomic
/// create/delete/exists primitives. Nothing here interprets content.
#[derive(Debug, Clone)]
pub struct LogDir {
    root: PathBuf,
}

impl LogDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LogDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(pipe::MANIFEST)
    }

    pub fn lock(&self) -> PathBuf {
        self.root.join(pipe::LOCK)
    }

    pub fn kill(&self) -> PathBuf {
        self.root.join(pipe::KILL)
    }

    pub fn heartbeat(&self) -> PathBuf {
        self.root.join(pipe::HEARTBEAT)
    }

    pub fn news_feed(&self) -> PathBuf {
        self.root.join(pipe::NEWS_FEED)
    }

    pub fn history(&self) -> PathBuf {
        self.root.join(pipe::HISTORY)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(pipe::TMP)
    }

    fn job_file(&self, job: &JobName, extension: &str) -> PathBuf {
        self.root.join(format!("{}.{}", job, extension))
    }

    pub fn payload(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::PAYLOAD)
    }

    pub fn log(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::LOG)
    }

    pub fn running(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::RUNNING)
    }

    pub fn finished(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::FINISHED)
    }

    pub fn failed(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::FAILED)
    }

    pub fn exit(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::EXIT)
    }

    pub fn kill_tag(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::KILL)
    }

    pub fn oqsub(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::OQSUB)
    }

    pub fn eqsub(&self, job: &JobName) -> PathBuf {
        self.job_file(job, ext::EQSUB)
    }

    pub fn script(&self, job: &JobName) -> PathBuf {
        self.tmp_dir().join(format!("{}.{}", job, ext::SCRIPT))
    }
}

/// Write a tag file carrying a timestamp line. The write is flushed so a
/// reader observing the file non-empty can trust it.
pub fn create_tag(path: &Path) -> io::Result<()> {
    let mut file = fs_err::File::create(path)?;
    writeln!(file, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    file.flush()
}

/// Create the file if absent, refresh its timestamp content otherwise.
pub fn touch(path: &Path) -> io::Result<()> {
    create_tag(path)
}

/// Remove a tag, treating an already-absent file as success.
pub fn remove_tag(path: &Path) -> io::Result<()> {
    match fs_err::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}
