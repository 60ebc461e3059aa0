//! # Worker Pool
//!
//! The scheduler talks to workers through the [`WorkerPool`] trait so the
//! embedding application can supply its own pool. [`ThreadPool`] is the
//! in-crate implementation: a bounded crossbeam channel drained by plain
//! OS threads.
//!
//! The pool publishes a pressure ratio (queue depth / capacity) that
//! drives the scheduler's sync-fallback decision.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::debug;

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Abstract worker pool, dependency-injected into the scheduler.
pub trait WorkerPool: Send + Sync {
    /// Submits a task; `false` when the queue is full or shut down.
    fn submit(&self, task: Task) -> bool;
    /// Tasks waiting to run.
    fn queue_size(&self) -> usize;
    /// Worker thread count.
    fn thread_count(&self) -> usize;
    /// True after shutdown began.
    fn is_shutdown(&self) -> bool;
    /// Queue depth over capacity, 0.0 (idle) to 1.0 (saturated).
    fn pressure(&self) -> f32;
}

/// Channel-fed thread pool.
pub struct ThreadPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    queued: Arc<AtomicUsize>,
    capacity: usize,
    shutdown: Arc<AtomicBool>,
}

impl ThreadPool {
    /// Spawns `threads` workers behind a queue of `capacity` tasks.
    ///
    /// Thread count 0 auto-detects from available parallelism.
    #[must_use]
    pub fn new(threads: usize, capacity: usize) -> Self {
        let threads = if threads == 0 {
            std::thread::available_parallelism().map_or(2, |n| n.get().saturating_sub(1).max(1))
        } else {
            threads
        };
        let (tx, rx) = bounded::<Task>(capacity);
        let queued = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..threads)
            .map(|i| {
                let rx = rx.clone();
                let queued = Arc::clone(&queued);
                std::thread::Builder::new()
                    .name(format!("emberwake-worker-{i}"))
                    .spawn(move || {
                        while let Ok(task) = rx.recv() {
                            queued.fetch_sub(1, Ordering::Relaxed);
                            task();
                        }
                    })
                    .expect("worker thread spawn")
            })
            .collect();

        debug!(threads, capacity, "worker pool started");
        Self {
            tx: Some(tx),
            workers,
            queued,
            capacity,
            shutdown,
        }
    }

    /// Signals shutdown and joins every worker. Queued tasks finish first.
    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender lets workers drain and exit.
        self.tx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool shut down");
    }
}

impl WorkerPool for ThreadPool {
    fn submit(&self, task: Task) -> bool {
        if self.shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(task) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }

    fn queue_size(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    fn thread_count(&self) -> usize {
        self.workers.len()
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn pressure(&self) -> f32 {
        if self.capacity == 0 {
            1.0
        } else {
            self.queue_size() as f32 / self.capacity as f32
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
