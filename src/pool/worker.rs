//! # Pool Fijo de Workers
//! src/pool/worker.rs
//!
//! N threads creados una sola vez que sacan tareas de una `TaskQueue`
//! compartida, una a la vez, hasta que la cola se cierra y se vacía.

use crate::config::OverflowPolicy;
use crate::error::DispatchError;
use crate::pool::queue::TaskQueue;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Tarea que ejecuta un worker
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker de larga vida
struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

/// Pool de tamaño fijo
pub struct WorkerPool {
    workers: Vec<Worker>,
    queue: Arc<TaskQueue<Job>>,
}

impl WorkerPool {
    /// Crea el pool e inicia exactamente `size` workers
    ///
    /// `capacity = None` usa una cola sin límite; `Some(n)` acota la cola
    /// y aplica `overflow` cuando se llena.
    pub fn new(
        size: usize,
        capacity: Option<usize>,
        overflow: OverflowPolicy,
    ) -> Result<Self, DispatchError> {
        let size = size.max(1);
        let queue = Arc::new(match capacity {
            Some(capacity) => TaskQueue::bounded(capacity, overflow),
            None => TaskQueue::unbounded(),
        });

        let mut pool = Self {
            workers: Vec::with_capacity(size),
            queue,
        };

        for id in 0..size {
            let queue = Arc::clone(&pool.queue);
            let spawned = thread::Builder::new()
                .name(format!("greet-worker-{}", id))
                .spawn(move || Self::worker_loop(id, queue));

            match spawned {
                Ok(handle) => pool.workers.push(Worker {
                    id,
                    thread: Some(handle),
                }),
                Err(e) => {
                    // Liberar los workers que sí arrancaron
                    pool.shutdown();
                    return Err(DispatchError::Spawn(e));
                }
            }
        }

        Ok(pool)
    }

    /// Loop principal del worker
    fn worker_loop(id: usize, queue: Arc<TaskQueue<Job>>) {
        debug!(worker = id, "worker started");

        while let Some(job) = queue.pop() {
            // Un panic en la tarea no debe matar al worker: el tamaño del pool es fijo
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(worker = id, "task panicked; worker keeps running");
            }
        }

        debug!(worker = id, "worker stopped");
    }

    /// Encola una tarea para el próximo worker libre
    pub fn execute<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(f))
    }

    /// Número de workers (fijo desde la construcción)
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Tareas esperando en la cola
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.queue.capacity()
    }

    /// Deja de aceptar tareas, ejecuta las pendientes y espera a todos los workers
    ///
    /// Llamarlo más de una vez no tiene efecto.
    pub fn shutdown(&mut self) {
        self.queue.close();

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                debug!(worker = worker.id, "joining worker");
                if thread.join().is_err() {
                    error!(worker = worker.id, "worker thread panicked");
                }
            }
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
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_pool_size_is_fixed() {
        let pool = WorkerPool::new(4, None, OverflowPolicy::Block).unwrap();
        assert_eq!(pool.size(), 4);
        assert_eq!(pool.capacity(), None);
    }

    #[test]
    fn test_zero_size_becomes_one() {
        let pool = WorkerPool::new(0, None, OverflowPolicy::Block).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_concurrency_never_exceeds_size() {
        let mut pool = WorkerPool::new(3, None, OverflowPolicy::Block).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.execute(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency was {}", peak);
        assert!(peak >= 1);
    }

    #[test]
    fn test_shutdown_runs_every_queued_task() {
        let mut pool = WorkerPool::new(2, None, OverflowPolicy::Block).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let done = Arc::clone(&done);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(1));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 50);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_single_worker_runs_in_fifo_order() {
        let mut pool = WorkerPool::new(1, None, OverflowPolicy::Block).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            pool.execute(move || order.lock().unwrap().push(i)).unwrap();
        }

        pool.shutdown();
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_execute_after_shutdown_fails() {
        let mut pool = WorkerPool::new(1, None, OverflowPolicy::Block).unwrap();
        pool.shutdown();
        assert!(matches!(pool.execute(|| {}), Err(DispatchError::ShutDown)));
        // Segunda llamada no tiene efecto
        pool.shutdown();
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let mut pool = WorkerPool::new(1, None, OverflowPolicy::Block).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        pool.execute(|| panic!("boom")).unwrap();
        {
            let done = Arc::clone(&done);
            pool.execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bounded_pool_rejects_overflow() {
        let pool = WorkerPool::new(1, Some(1), OverflowPolicy::Reject).unwrap();
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock().unwrap();

        // Ocupa al único worker
        {
            let gate = Arc::clone(&gate);
            pool.execute(move || {
                let _g = gate.lock();
            })
            .unwrap();
        }
        // Esperar a que el worker tome la primera tarea
        while pool.queued() > 0 {
            thread::sleep(Duration::from_millis(1));
        }

        pool.execute(|| {}).unwrap();
        assert!(matches!(
            pool.execute(|| {}),
            Err(DispatchError::QueueFull { capacity: 1 })
        ));

        drop(held);
    }
}
