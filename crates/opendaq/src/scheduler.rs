//! Bounded worker pool that runs packet-processing and notification
//! work off the caller's thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size thread pool. Default worker count is
/// [`crate::config::RuntimeConfig::scheduler_workers`].
pub struct Scheduler {
    sender: Sender<Job>,
    accepting: Arc<AtomicBool>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = bounded(4096);
        let accepting = Arc::new(AtomicBool::new(true));
        let handles = (0..workers.max(1))
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("opendaq-worker-{i}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                        debug!(worker = i, "scheduler worker exiting");
                    })
                    .expect("failed to spawn scheduler worker thread")
            })
            .collect();
        Self {
            sender,
            accepting,
            handles,
        }
    }

    /// Queue `job`; dropped silently (with a warning) if the scheduler
    /// has already begun shutting down.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if !self.accepting.load(Ordering::Acquire) {
            warn!("scheduler rejected a job submitted during shutdown");
            return;
        }
        if self.sender.send(Box::new(job)).is_err() {
            warn!("scheduler queue closed, job dropped");
        }
    }

    /// Stop accepting new work, drain what's already queued for up to
    /// `deadline`, then join every worker thread.
    pub fn shutdown(self, deadline: Duration) {
        self.accepting.store(false, Ordering::Release);
        drop(self.sender);
        let start = std::time::Instant::now();
        for handle in self.handles {
            let remaining = deadline.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                warn!("scheduler shutdown deadline exceeded, detaching remaining workers");
                break;
            }
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn submitted_jobs_run_on_worker_threads() {
        let scheduler = Scheduler::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = counter.clone();
            scheduler.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        scheduler.shutdown(Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn submit_after_shutdown_started_is_dropped_not_panicked() {
        let scheduler = Scheduler::new(1);
        scheduler.accepting.store(false, Ordering::Release);
        scheduler.submit(|| panic!("should never run"));
        scheduler.shutdown(Duration::from_secs(1));
    }
}
