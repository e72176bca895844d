use crate::backend::{self, Backend, Outcome, Submission};
use crate::error::SchedulerError;
use crate::lock::LockGuard;
use crate::report::{Event, History, NewsFeed, RunSummary};
use chrono::Local;
use drover_core::status::{self, JobStatus};
use drover_core::tags;
use drover_core::{GraphAnalysis, JobName, LogDir, ManagerConfig};
use std::io::Write;
use std::thread;

/// The submission loop. Single-threaded and cooperative: one iteration
/// observes tag files, advances the four masks, submits what became
/// runnable, then sleeps.
///
/// The masks partition the job set at every observable moment; nothing
/// but this type mutates them. Backends communicate exclusively through
/// the filesystem (or, for a blocking backend, the returned verdict).
pub struct Scheduler {
    logs: LogDir,
    graph: GraphAnalysis,
    cfg: ManagerConfig,
    backend: Box<dyn Backend>,
    news: NewsFeed,
    history: History,
    todo: Vec<bool>,
    running: Vec<bool>,
    finished: Vec<bool>,
    failed: Vec<bool>,
    seen_running: Vec<bool>,
    queued: usize,
}

impl Scheduler {
    pub fn new(
        logs: LogDir,
        graph: GraphAnalysis,
        cfg: ManagerConfig,
        backend: Box<dyn Backend>,
    ) -> Self {
        let n = graph.len();
        let mut scheduler = Scheduler {
            news: NewsFeed::new(&logs),
            history: History::new(&logs),
            logs,
            graph,
            cfg,
            backend,
            todo: vec![false; n],
            running: vec![false; n],
            finished: vec![false; n],
            failed: vec![false; n],
            seen_running: vec![false; n],
            queued: 0,
        };

        // Jobs already finished on disk (with unchanged declarations; the
        // initializer cleared everything else) are not re-run.
        for j in 0..n {
            let name = scheduler.graph.name(j).clone();
            if status::read_status(&scheduler.logs, &name) == JobStatus::Finished {
                scheduler.finished[j] = true;
                scheduler.graph.prune_producer(j);
            } else {
                scheduler.todo[j] = true;
            }
        }
        scheduler
    }

    pub fn run(&mut self, lock: &LockGuard) -> Result<RunSummary, SchedulerError> {
        let mut idle: u64 = 0;
        loop {
            if self.abort_requested(lock) {
                return self.abort();
            }

            let mut changed = self.observe()?;
            changed |= self.submit_ready()?;

            if !self.todo.iter().any(|&t| t) && !self.running.iter().any(|&r| r) {
                break;
            }

            if self.queued == 0 && self.next_runnable().is_none() {
                // Unreachable on a DAG with cascade-skip in place; bail
                // out rather than spin forever.
                let remaining = self.todo.iter().filter(|&&t| t).count();
                return Err(SchedulerError::Stalled { remaining });
            }

            if changed {
                idle = 0;
            } else {
                idle += 1;
                if self.cfg.nb_checks_per_point != u64::MAX
                    && idle % self.cfg.nb_checks_per_point == 0
                {
                    print!(".");
                    std::io::stdout().flush()?;
                }
            }
            thread::sleep(self.cfg.time_between_checks);
        }

        let summary = self.summary();
        self.history
            .line(&format!("Pipeline terminated: {}", summary))?;
        Ok(summary)
    }

    /// Re-read the tags of every job believed to be in flight.
    fn observe(&mut self) -> Result<bool, SchedulerError> {
        let mut changed = false;
        for j in 0..self.graph.len() {
            if !self.running[j] {
                continue;
            }
            let name = self.graph.name(j).clone();
            match status::read_status(&self.logs, &name) {
                JobStatus::Finished => {
                    self.mark_finished(j)?;
                    changed = true;
                }
                JobStatus::Failed => {
                    self.mark_failed(j)?;
                    changed = true;
                }
                JobStatus::Exit if !self.backend.blocking() => {
                    // The wrapper died without a runner verdict.
                    backend::append_crash_report(&self.logs, &name)?;
                    self.history.line(&format!(
                        "The backend wrapper for job '{}' crashed; treating the job as failed.",
                        name
                    ))?;
                    self.mark_failed(j)?;
                    changed = true;
                }
                JobStatus::Running => {
                    if !self.seen_running[j] {
                        self.seen_running[j] = true;
                        self.news.append(&name, Event::Running)?;
                    }
                }
                _ => {}
            }
        }
        Ok(changed)
    }

    /// Submit runnable jobs, lowest index first, while below the
    /// concurrency cap and the per-worker buffer.
    fn submit_ready(&mut self) -> Result<bool, SchedulerError> {
        let mut changed = false;
        let mut pending = if self.backend.blocking() {
            0
        } else {
            self.pending_count()
        };

        while self.queued < self.cfg.max_queued
            && (self.backend.blocking() || pending < self.cfg.max_buffer)
        {
            let Some(j) = self.next_runnable() else {
                break;
            };
            let name = self.graph.name(j).clone();

            self.todo[j] = false;
            self.running[j] = true;
            self.queued += 1;
            self.news.append(&name, Event::Submitted)?;
            self.report(&name, "been submitted")?;

            match self.backend.submit(&self.logs, &name) {
                // A blocking backend maps straight to the verdict; the
                // tag-polled running state never existed for this job.
                Ok(Submission::Completed(outcome)) => match outcome {
                    Outcome::Finished => self.mark_finished(j)?,
                    Outcome::Failed => self.mark_failed(j)?,
                },
                Ok(Submission::Dispatched) => {
                    pending += 1;
                }
                Err(e) => {
                    self.history.line(&format!("Fatal dispatch error: {}", e))?;
                    return Err(e);
                }
            }
            changed = true;
        }
        Ok(changed)
    }

    fn next_runnable(&self) -> Option<usize> {
        (0..self.graph.len()).find(|&j| self.todo[j] && !self.graph.has_unmet_deps(j))
    }

    /// Jobs handed to the backend whose runner has not started yet.
    fn pending_count(&self) -> usize {
        (0..self.graph.len())
            .filter(|&j| {
                self.running[j]
                    && status::read_status(&self.logs, self.graph.name(j)) == JobStatus::Submitted
            })
            .count()
    }

    fn mark_finished(&mut self, j: usize) -> Result<(), SchedulerError> {
        if self.running[j] {
            self.running[j] = false;
            self.queued -= 1;
        }
        self.todo[j] = false;
        self.finished[j] = true;
        self.graph.prune_producer(j);
        let name = self.graph.name(j).clone();
        self.news.append(&name, Event::Finished)?;
        self.report(&name, "finished")?;
        Ok(())
    }

    fn mark_failed(&mut self, j: usize) -> Result<(), SchedulerError> {
        if self.running[j] {
            self.running[j] = false;
            self.queued -= 1;
        }
        self.todo[j] = false;
        self.failed[j] = true;
        let name = self.graph.name(j).clone();
        self.news.append(&name, Event::Failed)?;
        self.report(&name, "failed")?;
        self.cascade_skip(j)?;
        Ok(())
    }

    /// Clear `todo` for every transitive descendant of a failed job so
    /// the rest of the graph can still drain.
    fn cascade_skip(&mut self, j: usize) -> Result<(), SchedulerError> {
        for k in self.graph.descendants(j) {
            if self.todo[k] {
                self.todo[k] = false;
                self.history.line(&format!(
                    "The job '{}' was skipped: ancestor '{}' failed.",
                    self.graph.name(k),
                    self.graph.name(j)
                ))?;
            }
        }
        Ok(())
    }

    fn report(&self, name: &JobName, verb: &str) -> Result<(), SchedulerError> {
        let message = format!(
            "The job {} has {} ({} jobs in queue).",
            name, verb, self.queued
        );
        println!(
            "{} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );
        self.history.line(&message)?;
        Ok(())
    }

    fn abort_requested(&self, lock: &LockGuard) -> bool {
        self.logs.kill().exists() || !lock.is_held()
    }

    /// Cooperative shutdown: leave a kill tag for every running job and
    /// hand back the directory.
    fn abort(&mut self) -> Result<RunSummary, SchedulerError> {
        for j in 0..self.graph.len() {
            if self.running[j] {
                tags::create_tag(&self.logs.kill_tag(self.graph.name(j)))?;
            }
        }
        let summary = self.summary();
        self.history
            .line(&format!("Operator abort; state at shutdown: {}", summary))?;
        Err(SchedulerError::OperatorAbort)
    }

    fn summary(&self) -> RunSummary {
        let finished = self.finished.iter().filter(|&&f| f).count();
        let failed = self.failed.iter().filter(|&&f| f).count();
        let skipped = (0..self.graph.len())
            .filter(|&j| !self.finished[j] && !self.failed[j] && !self.todo[j] && !self.running[j])
            .count();
        let first_failed_log = (0..self.graph.len())
            .find(|&j| self.failed[j])
            .map(|j| self.logs.log(self.graph.name(j)));
        RunSummary {
            finished,
            failed,
            skipped,
            first_failed_log,
        }
    }
}
