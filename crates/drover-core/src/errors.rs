use crate::model::JobName;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Job '{0}' is declared more than once.")]
    DuplicateJob(JobName),
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Dependency graph is not a DAG. Cycle: {}", format_cycle(.0))]
    Cycle(Vec<JobName>),
}

fn format_cycle(cycle: &[JobName]) -> String {
    let mut names: Vec<&str> = cycle.iter().map(|n| n.as_str()).collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    names.join(" -> ")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "time_between_checks must be a finite number of seconds, got '{0}'. \
         Configuration must be resolved before the loop starts."
    )]
    InvalidInterval(f64),

    #[error("max_buffer must be at least 1")]
    InvalidBuffer,
}

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Could not locate the drover binary: {0}")]
    RunnerNotFound(#[source] std::io::Error),
}
