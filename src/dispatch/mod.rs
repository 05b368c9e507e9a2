//! # Dispatchers
//! src/dispatch/mod.rs
//!
//! Estrategias para decidir qué unidad de ejecución atiende cada conexión.
//! Todas comparten la misma interfaz de envío para que el acceptor no
//! dependa de la estrategia elegida:
//! - `threaded`: un thread por conexión, sin control de admisión
//! - `pooled`: N workers fijos con cola FIFO sin límite
//! - `bounded`: N workers fijos con cola acotada y backpressure

pub mod pooled;
pub mod threaded;

pub use pooled::PooledDispatcher;
pub use threaded::ThreadPerConnection;

use crate::config::{Config, DispatchMode};
use crate::error::DispatchError;
use crate::handler::Handler;
use crate::metrics::MetricsCollector;
use crate::server::Connection;
use std::sync::Arc;

/// Interfaz común de envío
pub trait Dispatcher: Send {
    /// Entrega la conexión sin esperar a que el handler termine
    /// (salvo `bounded` + `block` con la cola llena).
    fn submit(&self, conn: Connection) -> Result<(), DispatchError>;

    /// Deja de aceptar conexiones y espera a las que están en curso
    fn shutdown(&mut self);

    /// Conexiones entregadas que todavía no terminaron
    fn in_flight(&self) -> usize;

    fn name(&self) -> &'static str;
}

/// Construye el dispatcher indicado por la configuración
pub fn build(
    config: &Config,
    handler: Arc<dyn Handler>,
    metrics: MetricsCollector,
) -> Result<Box<dyn Dispatcher>, DispatchError> {
    let deadline = config.connection_timeout();

    let dispatcher: Box<dyn Dispatcher> = match config.mode {
        DispatchMode::Threaded => Box::new(ThreadPerConnection::new(handler, deadline, metrics)),
        DispatchMode::Pooled => Box::new(PooledDispatcher::unbounded(
            config.pool_size,
            handler,
            deadline,
            metrics,
        )?),
        DispatchMode::Bounded => Box::new(PooledDispatcher::bounded(
            config.pool_size,
            config.queue_capacity,
            config.overflow,
            handler,
            deadline,
            metrics,
        )?),
    };

    Ok(dispatcher)
}
