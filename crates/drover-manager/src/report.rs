use chrono::Local;
use drover_core::constants::{events, NEWS_FEED_SEP};
use drover_core::model::JobName;
use drover_core::{Environment, LogDir, ManagerConfig};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Submitted,
    Running,
    Finished,
    Failed,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Event::Submitted => events::SUBMITTED,
            Event::Running => events::RUNNING,
            Event::Finished => events::FINISHED,
            Event::Failed => events::FAILED,
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            events::SUBMITTED => Ok(Event::Submitted),
            events::RUNNING => Ok(Event::Running),
            events::FINISHED => Ok(Event::Finished),
            events::FAILED => Ok(Event::Failed),
            other => Err(format!("unknown event '{}'", other)),
        }
    }
}

/// Append-only event log. The authoritative audit trail; the stdout
/// report lines are derivative.
#[derive(Debug, Clone)]
pub struct NewsFeed {
    path: PathBuf,
}

impl NewsFeed {
    pub fn new(logs: &LogDir) -> Self {
        NewsFeed {
            path: logs.news_feed(),
        }
    }

    pub fn append(&self, job: &JobName, event: Event) -> io::Result<()> {
        let mut file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}{}{}", job, NEWS_FEED_SEP, event)
    }
}

/// Tail-reading cursor over a news feed. Remembers its byte offset so
/// each poll only parses lines appended since the previous one, and
/// never consumes a line that is not yet newline-terminated.
#[derive(Debug)]
pub struct NewsFeedCursor {
    path: PathBuf,
    offset: u64,
}

impl NewsFeedCursor {
    pub fn new(logs: &LogDir) -> Self {
        NewsFeedCursor {
            path: logs.news_feed(),
            offset: 0,
        }
    }

    pub fn poll(&mut self) -> io::Result<Vec<(JobName, Event)>> {
        let mut file = match fs_err::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;

        let mut out = Vec::new();
        let mut consumed = 0usize;
        for line in buf.split_inclusive('\n') {
            if !line.ends_with('\n') {
                break;
            }
            consumed += line.len();
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            match line.split_once(NEWS_FEED_SEP) {
                Some((job, event)) => match event.parse::<Event>() {
                    Ok(event) => out.push((JobName::from(job), event)),
                    Err(e) => tracing::warn!("Skipping malformed news feed line: {}", e),
                },
                None => tracing::warn!("Skipping malformed news feed line: '{}'", line),
            }
        }
        self.offset += consumed as u64;
        Ok(out)
    }
}

/// Human-readable session history, one timestamped line per entry.
#[derive(Debug, Clone)]
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(logs: &LogDir) -> Self {
        History {
            path: logs.history(),
        }
    }

    pub fn line(&self, message: &str) -> io::Result<()> {
        let mut file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )
    }

    pub fn banner(
        &self,
        env: &Environment,
        cfg: &ManagerConfig,
        nb_jobs: usize,
    ) -> io::Result<()> {
        let max_queued = if cfg.max_queued == usize::MAX {
            "unbounded".to_string()
        } else {
            cfg.max_queued.to_string()
        };
        self.line("*****************************************")?;
        self.line(&format!(
            "Pipeline started by {} on {} ({})",
            env.user, env.hostname, env.os
        ))?;
        self.line(&format!(
            "mode: {}, max_queued: {}, check interval: {:.1}s, {} job(s)",
            cfg.mode,
            max_queued,
            cfg.time_between_checks.as_secs_f64(),
            nb_jobs
        ))
    }
}

/// Per-run outcome counts returned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub finished: usize,
    pub failed: usize,
    pub skipped: usize,
    pub first_failed_log: Option<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} finished, {} failed, {} skipped",
            self.finished, self.failed, self.skipped
        )
    }
}
