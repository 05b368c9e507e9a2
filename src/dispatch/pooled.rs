//! # Dispatcher con Pool Fijo
//! src/dispatch/pooled.rs
//!
//! Envuelve cada conexión en una tarea y la encola en un `WorkerPool`.
//! La concurrencia queda limitada a N. Con cola sin límite el acceptor
//! nunca se bloquea; con cola acotada aplica la política de desborde.

use crate::config::OverflowPolicy;
use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::handler::{self, Handler};
use crate::metrics::MetricsCollector;
use crate::pool::WorkerPool;
use crate::server::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Descuenta la conexión al terminar la tarea, incluso con panic
struct Finished(Arc<AtomicUsize>);

impl Drop for Finished {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct PooledDispatcher {
    pool: WorkerPool,
    handler: Arc<dyn Handler>,
    deadline: Option<Duration>,
    metrics: MetricsCollector,
    /// Encoladas + ejecutándose
    in_flight: Arc<AtomicUsize>,
}

impl PooledDispatcher {
    /// Pool de `size` workers con cola sin límite
    pub fn unbounded(
        size: usize,
        handler: Arc<dyn Handler>,
        deadline: Option<Duration>,
        metrics: MetricsCollector,
    ) -> Result<Self, DispatchError> {
        let pool = WorkerPool::new(size, None, OverflowPolicy::Block)?;
        Ok(Self::with_pool(pool, handler, deadline, metrics))
    }

    /// Pool de `size` workers con cola de `capacity` tareas
    pub fn bounded(
        size: usize,
        capacity: usize,
        overflow: OverflowPolicy,
        handler: Arc<dyn Handler>,
        deadline: Option<Duration>,
        metrics: MetricsCollector,
    ) -> Result<Self, DispatchError> {
        let pool = WorkerPool::new(size, Some(capacity), overflow)?;
        Ok(Self::with_pool(pool, handler, deadline, metrics))
    }

    fn with_pool(
        pool: WorkerPool,
        handler: Arc<dyn Handler>,
        deadline: Option<Duration>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            pool,
            handler,
            deadline,
            metrics,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    pub fn queued(&self) -> usize {
        self.pool.queued()
    }
}

impl Dispatcher for PooledDispatcher {
    fn submit(&self, conn: Connection) -> Result<(), DispatchError> {
        let handler = Arc::clone(&self.handler);
        let metrics = self.metrics.clone();
        let deadline = self.deadline;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let finished = Finished(Arc::clone(&self.in_flight));

        // Si la tarea se rechaza, el closure se suelta dentro de `execute`:
        // la conexión se cierra y `finished` descuenta el contador.
        self.pool.execute(move || {
            let _finished = finished;
            handler::serve(&handler, conn, deadline, &metrics);
        })
    }

    fn shutdown(&mut self) {
        debug!(
            queued = self.pool.queued(),
            in_flight = self.in_flight(),
            "draining worker pool"
        );
        self.pool.shutdown();
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        match self.pool.capacity() {
            Some(_) => "bounded",
            None => "pooled",
        }
    }
}
