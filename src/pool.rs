//! Fixed-size worker pool with a shared FIFO task queue.
//!
//! Submission returns a [`TaskHandle`] the caller waits on for the task's
//! result. Shutdown is cooperative: dropping the pool raises the shutdown
//! flag and wakes every worker, and a worker exits only once it sees the
//! flag *and* an empty queue, so already-queued tasks still run.

use crossbeam::channel::{bounded, Receiver};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolShared {
    queue: Mutex<VecDeque<Job>>,
    work_available: Condvar,
    shutdown: AtomicBool,
}

/// Pool of worker threads consuming tasks in submission order.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

/// Pending result of a submitted task. [`TaskHandle::wait`] blocks until the
/// task has run.
pub struct TaskHandle<T> {
    result: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task completes and returns its result. Panics if the
    /// task itself panicked on a worker thread.
    pub fn wait(self) -> T {
        self.result
            .recv()
            .expect("worker dropped a task before completing it")
    }
}

impl WorkerPool {
    /// Spawns `worker_count` workers. Panics if `worker_count` is zero.
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker pool needs at least one worker");
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            work_available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let workers = (0..worker_count)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("depthbook-worker-{index}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn pool worker")
            })
            .collect();
        Self { shared, workers }
    }

    /// Queues `task` and returns a handle for its result.
    ///
    /// Panics if called after shutdown has begun; the pool stops accepting
    /// work once it is being torn down.
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        assert!(
            !self.shared.shutdown.load(Ordering::Acquire),
            "submit on a worker pool that is shutting down"
        );
        let (sender, result) = bounded(1);
        let job: Job = Box::new(move || {
            // The receiver may be gone if the caller dropped the handle.
            let _ = sender.send(task());
        });
        self.shared.queue.lock().push_back(job);
        self.shared.work_available.notify_one();
        TaskHandle { result }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Raise the flag under the queue lock so no worker is between its
        // shutdown check and the wait when the notification fires.
        {
            let _queue = self.shared.queue.lock();
            self.shared.shutdown.store(true, Ordering::Release);
        }
        self.shared.work_available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool shut down");
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    break job;
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                shared.work_available.wait(&mut queue);
            }
        };
        job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn submitted_tasks_return_their_results() {
        let pool = WorkerPool::new(2);
        let doubled = pool.submit(|| 21 * 2);
        let text = pool.submit(|| "done".to_string());
        assert_eq!(doubled.wait(), 42);
        assert_eq!(text.wait(), "done");
    }

    #[test]
    fn many_tasks_complete_across_workers() {
        let pool = WorkerPool::new(4);
        let handles: Vec<_> = (0..64u64).map(|n| pool.submit(move || n * n)).collect();
        let results: Vec<u64> = handles.into_iter().map(TaskHandle::wait).collect();
        let expected: Vec<u64> = (0..64).map(|n| n * n).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn queued_tasks_drain_on_shutdown() {
        let pool = WorkerPool::new(1);
        let handles: Vec<_> = (0..8u64)
            .map(|n| {
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(5));
                    n
                })
            })
            .collect();
        drop(pool);
        // Every queued task must have run before the workers exited.
        let results: Vec<u64> = handles.into_iter().map(TaskHandle::wait).collect();
        assert_eq!(results, (0..8).collect::<Vec<u64>>());
    }

    #[test]
    fn submissions_from_multiple_threads_all_run() {
        let pool = Arc::new(WorkerPool::new(3));
        let spawners: Vec<_> = (0..4)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let handles: Vec<_> =
                        (0..16u64).map(|n| pool.submit(move || t * 100 + n)).collect();
                    handles.into_iter().map(TaskHandle::wait).sum::<u64>()
                })
            })
            .collect();
        let total: u64 = spawners.into_iter().map(|h| h.join().unwrap()).sum();
        let per_thread: u64 = (0..16).sum();
        assert_eq!(total, (0..4).map(|t| t * 1600 + per_thread).sum::<u64>());
    }
}
