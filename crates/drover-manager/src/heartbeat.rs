use drover_core::tags;
use drover_core::LogDir;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const BEAT_EVERY: Duration = Duration::from_secs(5);
const POLL_STEP: Duration = Duration::from_millis(250);

/// A supervised thread that refreshes the `heartbeat` file while the
/// manager is alive. External monitors use its mtime to detect
/// manager-death. Stops (and joins) when the handle is dropped.
pub struct Heartbeat {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn start(logs: &LogDir) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let path = logs.heartbeat();

        let handle = thread::spawn(move || {
            let steps = (BEAT_EVERY.as_millis() / POLL_STEP.as_millis()).max(1);
            while !flag.load(Ordering::Relaxed) {
                if let Err(e) = tags::touch(&path) {
                    tracing::warn!("Could not refresh heartbeat at {}: {}", path.display(), e);
                }
                for _ in 0..steps {
                    if flag.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::sleep(POLL_STEP);
                }
            }
        });

        Heartbeat {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
