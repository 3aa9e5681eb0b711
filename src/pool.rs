//! Worker pool for the per-read stages
//!
//! A fixed set of workers drains an unbounded channel, so enqueueing
//! never blocks. `wait` is a barrier on the number of in-flight jobs,
//! which lets a driver submit one batch per reference and join it before
//! building the next index. Shutting down drains queued jobs, joins the
//! workers, and makes further submissions fail deterministically.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

use crate::error::{Result, RiftyError};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    done: Condvar,
}

/// Fixed-size worker pool over an unbounded job queue.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl WorkerPool {
    /// Spawn `n_workers` workers (at least one).
    pub fn new(n_workers: usize) -> WorkerPool {
        let n_workers = n_workers.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let pending = Arc::new(Pending::default());

        let mut workers = Vec::with_capacity(n_workers);
        for _ in 0..n_workers {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);

            workers.push(thread::spawn(move || {
                for job in receiver.iter() {
                    job();

                    let mut count = pending.count.lock().unwrap();
                    *count -= 1;
                    if *count == 0 {
                        pending.done.notify_all();
                    }
                }
            }));
        }

        WorkerPool {
            sender: Some(sender),
            workers,
            pending,
        }
    }

    /// Enqueue a job. Never blocks; fails after shutdown.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| RiftyError::Pool("submit after shutdown".to_string()))?;

        *self.pending.count.lock().unwrap() += 1;
        sender
            .send(Box::new(job))
            .map_err(|_| RiftyError::Pool("worker queue closed".to_string()))
    }

    /// Block until every submitted job has finished.
    pub fn wait(&self) {
        let mut count = self.pending.count.lock().unwrap();
        while *count > 0 {
            count = self.pending.done.wait(count).unwrap();
        }
    }

    /// Drain queued jobs, join the workers, and reject future submits.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pool_runs_all_jobs() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_pool_wait_is_reusable() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for batch in 0..3 {
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
            pool.wait();
            assert_eq!(counter.load(Ordering::SeqCst), (batch + 1) * 10);
        }
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut pool = WorkerPool::new(1);
        pool.execute(|| {}).unwrap();
        pool.shutdown();

        let result = pool.execute(|| {});
        assert!(matches!(result, Err(RiftyError::Pool(_))));
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut pool = WorkerPool::new(1);
            for _ in 0..50 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
            pool.shutdown();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
