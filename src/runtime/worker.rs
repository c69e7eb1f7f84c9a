// TokioWorkerPool - worker context backed by the tokio blocking pool

use super::{DispatchError, Task, WorkerSpawn};
use tokio::runtime::Handle;

/// Worker-pool context over a [`tokio::runtime::Handle`].
///
/// Step bodies are ordinary blocking closures (they may sleep, wait on
/// latches, run subprocesses), so they go to tokio's blocking pool via
/// [`spawn_blocking`](Handle::spawn_blocking) rather than onto the async
/// reactor threads.
#[derive(Clone)]
pub struct TokioWorkerPool {
    handle: Handle,
}

impl TokioWorkerPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl WorkerSpawn for TokioWorkerPool {
    fn submit(&self, task: Task) -> Result<(), DispatchError> {
        self.handle.spawn_blocking(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_task_runs_off_calling_thread() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let pool = TokioWorkerPool::new(runtime.handle().clone());

        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || {
            tx.send(std::thread::current().id()).unwrap();
        }))
        .unwrap();

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(caller, worker);

        runtime.shutdown_timeout(Duration::from_secs(1));
    }

    #[test]
    fn test_independent_tasks_run_concurrently() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let pool = TokioWorkerPool::new(runtime.handle().clone());

        // Each task unblocks the other; this completes only if both run at once.
        let (a_tx, a_rx) = mpsc::channel::<()>();
        let (b_tx, b_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();
        let done_tx2 = done_tx.clone();

        pool.submit(Box::new(move || {
            b_tx.send(()).unwrap();
            a_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            done_tx.send(()).unwrap();
        }))
        .unwrap();
        pool.submit(Box::new(move || {
            a_tx.send(()).unwrap();
            b_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            done_tx2.send(()).unwrap();
        }))
        .unwrap();

        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        runtime.shutdown_timeout(Duration::from_secs(1));
    }
}
