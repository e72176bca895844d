use crate::error::InitError;
use drover_core::model::{JobDeclaration, JobName, JobRecord};
use drover_core::status::{self, JobStatus};
use drover_core::tags;
use drover_core::{GraphAnalysis, LogDir, Pipeline};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// The canonical on-disk pipeline: declarations plus the analyzed graph.
/// Written deterministically so re-initializing an unchanged pipeline is
/// byte-idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeManifest {
    pub jobs: Vec<JobRecord>,
    pub graph: GraphAnalysis,
}

/// Materialize the analyzed graph to disk and reconcile whatever a
/// previous incarnation left behind.
///
/// Order matters: the graph is analyzed and pre-flighted before the log
/// directory is touched, so a cyclic or unsatisfiable pipeline writes
/// nothing.
pub fn initialize(
    logs: &LogDir,
    pipeline: &Pipeline,
    restart: &[String],
) -> Result<GraphAnalysis, InitError> {
    let graph = GraphAnalysis::analyze(pipeline)?;
    preflight(&graph)?;

    fs_err::create_dir_all(logs.root())?;
    fs_err::create_dir_all(logs.tmp_dir())?;

    if let Some(previous) = load_previous(logs) {
        reconcile(logs, pipeline, &graph, &previous, restart)?;
    }
    cleanup_unfinished(logs, pipeline)?;

    write_manifest(logs, pipeline, &graph)?;
    write_payloads(logs, pipeline)?;

    // A kill request from a past session must not abort this one.
    tags::remove_tag(&logs.kill())?;

    Ok(graph)
}

/// Every input that no job produces must already exist on disk.
fn preflight(graph: &GraphAnalysis) -> Result<(), InitError> {
    for j in 0..graph.len() {
        for file in graph.external_inputs(j) {
            if !Path::new(file).exists() {
                return Err(InitError::MissingInput {
                    job: graph.name(j).clone(),
                    file: file.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn load_previous(logs: &LogDir) -> Option<PipeManifest> {
    let bytes = fs_err::read(logs.manifest()).ok()?;
    match serde_json::from_slice::<PipeManifest>(&bytes) {
        Ok(mut manifest) => {
            manifest.graph.rebuild_index();
            Some(manifest)
        }
        Err(e) => {
            tracing::warn!(
                "Ignoring unreadable manifest at {}: {}",
                logs.manifest().display(),
                e
            );
            None
        }
    }
}

/// Decide which previously-known jobs must run again, and forget jobs
/// that no longer exist.
fn reconcile(
    logs: &LogDir,
    pipeline: &Pipeline,
    graph: &GraphAnalysis,
    previous: &PipeManifest,
    restart: &[String],
) -> Result<(), InitError> {
    let previous_jobs: HashMap<&JobName, &JobDeclaration> = previous
        .jobs
        .iter()
        .map(|record| (&record.name, &record.declaration))
        .collect();

    let mut restart_set: BTreeSet<usize> = BTreeSet::new();
    for (j, name) in graph.list_jobs.iter().enumerate() {
        let declaration = pipeline.get(name).expect("analyzed job must be declared");
        match previous_jobs.get(name) {
            Some(old) if *old == declaration => {}
            // Changed declaration, or a job this manifest has never seen
            // (any tags it carries are of unknown provenance).
            _ => {
                restart_set.insert(j);
            }
        }
    }
    for pattern in restart {
        for (j, name) in graph.list_jobs.iter().enumerate() {
            if name.as_str().contains(pattern.as_str()) {
                restart_set.insert(j);
            }
        }
    }

    // Re-running a producer invalidates all transitive consumers.
    for j in restart_set.clone() {
        for k in graph.descendants(j) {
            restart_set.insert(k);
        }
    }

    for &j in &restart_set {
        let name = graph.name(j);
        tracing::debug!("Restarting job '{}'", name);
        clear_job_files(logs, name)?;
    }

    for record in &previous.jobs {
        if !pipeline.contains(&record.name) {
            tracing::debug!("Dropping orphaned job '{}'", record.name);
            clear_job_files(logs, &record.name)?;
            tags::remove_tag(&logs.payload(&record.name))?;
        }
    }

    Ok(())
}

/// Lifecycle cleanup: a restarting manager retries anything that did not
/// finish. Stale `.running` tags (nobody is running: we hold the lock),
/// `.failed` tags, crash sentinels and old logs all go.
fn cleanup_unfinished(logs: &LogDir, pipeline: &Pipeline) -> Result<(), InitError> {
    for (name, _) in pipeline.iter() {
        if status::read_status(logs, name) == JobStatus::Finished {
            continue;
        }
        clear_job_files(logs, name)?;
    }
    Ok(())
}

fn clear_job_files(logs: &LogDir, job: &JobName) -> Result<(), InitError> {
    for path in [
        logs.running(job),
        logs.finished(job),
        logs.failed(job),
        logs.exit(job),
        logs.kill_tag(job),
        logs.log(job),
        logs.oqsub(job),
        logs.eqsub(job),
        logs.script(job),
    ] {
        tags::remove_tag(&path)?;
    }
    Ok(())
}

fn write_manifest(
    logs: &LogDir,
    pipeline: &Pipeline,
    graph: &GraphAnalysis,
) -> Result<(), InitError> {
    let manifest = PipeManifest {
        jobs: pipeline.to_records(),
        graph: graph.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&manifest)?;
    fs_err::write(logs.manifest(), bytes)?;
    Ok(())
}

fn write_payloads(logs: &LogDir, pipeline: &Pipeline) -> Result<(), InitError> {
    for record in pipeline.to_records() {
        let bytes = serde_json::to_vec_pretty(&record)?;
        fs_err::write(logs.payload(&record.name), bytes)?;
    }
    Ok(())
}
