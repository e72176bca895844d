use drover_core::model::JobName;
use drover_core::{LogDir, Pipeline, RunOptions};
use drover_manager::backend::{Backend, Submission};
use drover_manager::error::{InitError, ManagerError, SchedulerError};
use drover_manager::lock::LockGuard;
use drover_manager::report::{Event, NewsFeedCursor};
use drover_manager::scheduler::Scheduler;
use drover_manager::{init, run_pipeline};
use drover_test_utils::TestContext;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn feed_events(logs: &LogDir) -> Vec<(JobName, Event)> {
    NewsFeedCursor::new(logs).poll().unwrap()
}

#[test]
fn linear_chain_runs_in_order() {
    let ctx = TestContext::new();
    let out_a = ctx.data_file("a.out");
    let out_b = ctx.data_file("b.out");
    let out_c = ctx.data_file("c.out");

    let mut pipeline = Pipeline::new();
    pipeline
        .insert("a", ctx.counting_job("a", &[], &[&out_a]))
        .unwrap();
    pipeline
        .insert("b", ctx.counting_job("b", &[&out_a], &[&out_b]))
        .unwrap();
    pipeline
        .insert("c", ctx.counting_job("c", &[&out_b], &[&out_c]))
        .unwrap();

    let summary = run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();

    assert_eq!(summary.finished, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);

    let expected: Vec<(JobName, Event)> = [
        ("a", Event::Submitted),
        ("a", Event::Finished),
        ("b", Event::Submitted),
        ("b", Event::Finished),
        ("c", Event::Submitted),
        ("c", Event::Finished),
    ]
    .into_iter()
    .map(|(name, event)| (JobName::from(name), event))
    .collect();
    assert_eq!(feed_events(&ctx.logs()), expected);

    // The lock is gone after a clean exit.
    assert!(!ctx.logs().lock().exists());
}

#[test]
fn diamond_with_failure_skips_the_join() {
    let ctx = TestContext::new();
    let out_a = ctx.data_file("a.out");
    let out_b = ctx.data_file("b.out");
    let out_c = ctx.data_file("c.out");
    let out_d = ctx.data_file("d.out");

    let mut pipeline = Pipeline::new();
    pipeline
        .insert("a", ctx.counting_job("a", &[], &[&out_a]))
        .unwrap();
    pipeline
        .insert("b", ctx.failing_job(&[&out_a], &[&out_b]))
        .unwrap();
    pipeline
        .insert("c", ctx.counting_job("c", &[&out_a], &[&out_c]))
        .unwrap();
    pipeline
        .insert("d", ctx.counting_job("d", &[&out_b, &out_c], &[&out_d]))
        .unwrap();

    let summary = run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();

    assert_eq!(summary.finished, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(
        summary.first_failed_log,
        Some(ctx.logs().log(&JobName::from("b")))
    );

    // d was never submitted: no events, no verdict tags.
    let d = JobName::from("d");
    let events = feed_events(&ctx.logs());
    assert!(events.iter().all(|(name, _)| name != &d));
    assert!(!ctx.logs().finished(&d).exists());
    assert!(!ctx.logs().failed(&d).exists());
    assert_eq!(ctx.run_count("d"), 0);
}

/// Test-only backend: every submission becomes a thread that writes the
/// usual tags after a delay, tracking how many are in flight.
struct ThreadBackend {
    active: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
    delay: Duration,
}

impl ThreadBackend {
    fn new(delay: Duration) -> Self {
        ThreadBackend {
            active: Arc::new(AtomicUsize::new(0)),
            max_seen: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

impl Backend for ThreadBackend {
    fn label(&self) -> &'static str {
        "thread"
    }

    fn submit(
        &self,
        logs: &LogDir,
        job: &JobName,
    ) -> Result<Submission, SchedulerError> {
        let logs = logs.clone();
        let job = job.clone();
        let active = self.active.clone();
        let max_seen = self.max_seen.clone();
        let delay = self.delay;

        thread::spawn(move || {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            let _ = drover_core::tags::create_tag(&logs.running(&job));
            thread::sleep(delay);
            let _ = drover_core::tags::remove_tag(&logs.running(&job));
            // Drop out of the in-flight count before the verdict becomes
            // visible, mirroring a runner that exits after its last write.
            active.fetch_sub(1, Ordering::SeqCst);
            let _ = drover_core::tags::create_tag(&logs.finished(&job));
        });

        Ok(Submission::Dispatched)
    }
}

fn scheduler_options() -> RunOptions {
    RunOptions {
        max_queued: Some(2),
        time_between_checks: Some(0.01),
        ..Default::default()
    }
}

#[test]
fn concurrency_cap_is_respected() {
    let ctx = TestContext::new();
    let mut pipeline = Pipeline::new();
    for i in 0..10 {
        pipeline
            .insert(format!("job{}", i), ctx.counting_job(&format!("job{}", i), &[], &[]))
            .unwrap();
    }

    let logs = ctx.logs();
    fs_err::create_dir_all(logs.root()).unwrap();
    let lock = LockGuard::acquire(&logs, false).unwrap();
    let graph = init::initialize(&logs, &pipeline, &[]).unwrap();
    let cfg = scheduler_options().resolve().unwrap();

    let backend = ThreadBackend::new(Duration::from_millis(30));
    let max_seen = backend.max_seen.clone();

    let mut scheduler = Scheduler::new(logs.clone(), graph, cfg, Box::new(backend));
    let summary = scheduler.run(&lock).unwrap();
    lock.release().unwrap();

    assert_eq!(summary.finished, 10);
    assert_eq!(summary.failed, 0);
    assert!(
        max_seen.load(Ordering::SeqCst) <= 2,
        "max in-flight was {}",
        max_seen.load(Ordering::SeqCst)
    );
}

#[test]
fn restart_after_crash_reruns_only_unfinished_work() {
    let ctx = TestContext::new();
    let out_a = ctx.data_file("a.out");
    let out_b = ctx.data_file("b.out");

    let mut pipeline = Pipeline::new();
    pipeline
        .insert("a", ctx.counting_job("a", &[], &[&out_a]))
        .unwrap();
    pipeline
        .insert("b", ctx.counting_job("b", &[&out_a], &[&out_b]))
        .unwrap();

    run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();
    assert_eq!(ctx.run_count("a"), 1);
    assert_eq!(ctx.run_count("b"), 1);

    // Simulate a manager crash mid-run: b never finished and its
    // .running tag went stale.
    let b = JobName::from("b");
    drover_core::tags::remove_tag(&ctx.logs().finished(&b)).unwrap();
    drover_core::tags::create_tag(&ctx.logs().running(&b)).unwrap();

    let summary = run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();

    assert_eq!(summary.finished, 2);
    assert_eq!(ctx.run_count("a"), 1, "finished job must not re-run");
    assert_eq!(ctx.run_count("b"), 2, "stale running job must be resubmitted");
}

#[test]
fn declaration_change_restarts_descendants_only() {
    let ctx = TestContext::new();
    let out_a = ctx.data_file("a.out");
    let out_b = ctx.data_file("b.out");
    let out_c = ctx.data_file("c.out");

    let mut pipeline = Pipeline::new();
    pipeline
        .insert("a", ctx.counting_job("a", &[], &[&out_a]))
        .unwrap();
    pipeline
        .insert("b", ctx.counting_job("b", &[&out_a], &[&out_b]))
        .unwrap();
    pipeline
        .insert("c", ctx.counting_job("c", &[&out_b], &[&out_c]))
        .unwrap();

    run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();

    // Only b's opts change; its consumer c must follow, a must not.
    let mut changed = Pipeline::new();
    changed
        .insert("a", ctx.counting_job("a", &[], &[&out_a]))
        .unwrap();
    let mut b = ctx.counting_job("b", &[&out_a], &[&out_b]);
    b.opts = serde_json::json!({"quality": "high"});
    changed.insert("b", b).unwrap();
    changed
        .insert("c", ctx.counting_job("c", &[&out_b], &[&out_c]))
        .unwrap();

    run_pipeline(
        &changed,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();

    assert_eq!(ctx.run_count("a"), 1);
    assert_eq!(ctx.run_count("b"), 2);
    assert_eq!(ctx.run_count("c"), 2);
}

#[test]
fn rerunning_a_finished_pipeline_is_a_noop() {
    let ctx = TestContext::new();
    let out_a = ctx.data_file("a.out");

    let mut pipeline = Pipeline::new();
    pipeline
        .insert("a", ctx.counting_job("a", &[], &[&out_a]))
        .unwrap();

    run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();
    let summary = run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();

    assert_eq!(summary.finished, 1);
    assert_eq!(ctx.run_count("a"), 1);
    // No second submission was recorded.
    let a = JobName::from("a");
    let submissions = feed_events(&ctx.logs())
        .into_iter()
        .filter(|(name, event)| name == &a && *event == Event::Submitted)
        .count();
    assert_eq!(submissions, 1);
}

#[test]
fn cyclic_pipeline_fails_without_writing() {
    let ctx = TestContext::new();
    let out_a = ctx.data_file("a.out");
    let out_b = ctx.data_file("b.out");

    let mut pipeline = Pipeline::new();
    pipeline
        .insert("a", ctx.counting_job("a", &[&out_b], &[&out_a]))
        .unwrap();
    pipeline
        .insert("b", ctx.counting_job("b", &[&out_a], &[&out_b]))
        .unwrap();

    let err = run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap_err();

    assert!(matches!(err, ManagerError::Init(InitError::Graph(_))));
    assert!(!ctx.logs().manifest().exists());
    assert!(!ctx.logs().lock().exists());
}

#[test]
fn empty_pipeline_terminates_immediately() {
    let ctx = TestContext::new();
    let summary = run_pipeline(
        &Pipeline::new(),
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap();
    assert_eq!(summary.finished, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
}

#[test]
fn removing_the_lock_aborts_the_run() {
    let ctx = TestContext::new();
    let mut pipeline = Pipeline::new();
    pipeline
        .insert("slow", ctx.counting_job("slow", &[], &[]))
        .unwrap();
    pipeline
        .insert("never", ctx.counting_job("never", &[], &[]))
        .unwrap();

    let logs = ctx.logs();
    fs_err::create_dir_all(logs.root()).unwrap();
    let lock = LockGuard::acquire(&logs, false).unwrap();
    let graph = init::initialize(&logs, &pipeline, &[]).unwrap();
    let cfg = RunOptions {
        max_queued: Some(1),
        time_between_checks: Some(0.01),
        ..Default::default()
    }
    .resolve()
    .unwrap();

    // Jobs that outlive the test; only the abort path completes.
    let backend = ThreadBackend::new(Duration::from_secs(2));

    let lock_path = logs.lock();
    let deleter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        let _ = std::fs::remove_file(&lock_path);
    });

    let mut scheduler = Scheduler::new(logs.clone(), graph, cfg, Box::new(backend));
    let err = scheduler.run(&lock).unwrap_err();
    deleter.join().unwrap();

    assert!(matches!(err, SchedulerError::OperatorAbort));
    // The running job was sent a cooperative kill signal.
    assert!(logs.kill_tag(&JobName::from("slow")).exists());
}

#[test]
fn a_second_manager_is_refused() {
    let ctx = TestContext::new();
    let mut pipeline = Pipeline::new();
    pipeline
        .insert("a", ctx.counting_job("a", &[], &[]))
        .unwrap();

    let logs = ctx.logs();
    fs_err::create_dir_all(logs.root()).unwrap();
    let _holder = LockGuard::acquire(&logs, false).unwrap();

    let err = run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        false,
    )
    .unwrap_err();
    assert!(matches!(err, ManagerError::Lock(_)));

    // An operator who confirmed the lock is stale can force through.
    drop(_holder);
    let summary = run_pipeline(
        &pipeline,
        &ctx.logs_root,
        &RunOptions::default(),
        &ctx.env(),
        true,
    )
    .unwrap();
    assert_eq!(summary.finished, 1);
}
