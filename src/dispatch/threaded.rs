//! # Dispatcher Thread-por-Conexión
//! src/dispatch/threaded.rs
//!
//! Cada conexión recibe un thread nuevo e independiente. No hay límite ni
//! backpressure: si las conexiones llegan más rápido de lo que terminan,
//! la cantidad de threads crece sin cota.

use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::handler::{self, Handler};
use crate::metrics::MetricsCollector;
use crate::server::Connection;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Registro de unidades en curso: contador + condvar para esperar a cero
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self) {
        *self.lock() += 1;
    }

    fn leave(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn current(&self) -> usize {
        *self.lock()
    }

    fn wait_idle(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

/// Decrementa el registro al terminar el thread, incluso con panic
struct LeaveOnDrop(Arc<InFlight>);

impl Drop for LeaveOnDrop {
    fn drop(&mut self) {
        self.0.leave();
    }
}

pub struct ThreadPerConnection {
    handler: Arc<dyn Handler>,
    deadline: Option<Duration>,
    metrics: MetricsCollector,
    in_flight: Arc<InFlight>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl ThreadPerConnection {
    pub fn new(
        handler: Arc<dyn Handler>,
        deadline: Option<Duration>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            handler,
            deadline,
            metrics,
            in_flight: Arc::new(InFlight::default()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }
}

impl Dispatcher for ThreadPerConnection {
    fn submit(&self, conn: Connection) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::ShutDown);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handler = Arc::clone(&self.handler);
        let metrics = self.metrics.clone();
        let deadline = self.deadline;

        self.in_flight.enter();
        let guard = LeaveOnDrop(Arc::clone(&self.in_flight));

        let spawned = thread::Builder::new()
            .name(format!("greet-conn-{}", id))
            .spawn(move || {
                let _guard = guard;
                handler::serve(&handler, conn, deadline, &metrics);
            });

        // Si el spawn falla el closure (con el guard y la conexión) se suelta
        // aquí mismo: el registro se decrementa y el socket se cierra.
        spawned.map(|_| ()).map_err(DispatchError::Spawn)
    }

    fn shutdown(&mut self) {
        self.closed.store(true, Ordering::Release);
        debug!(in_flight = self.in_flight.current(), "waiting for connection threads");
        self.in_flight.wait_idle();
    }

    fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    fn name(&self) -> &'static str {
        "threaded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::GreetingHandler;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Handler que se queda esperando hasta que el test lo libere
    struct GateHandler {
        active: AtomicUsize,
        release: AtomicBool,
    }

    impl Handler for GateHandler {
        fn handle(&self, _conn: &mut Connection) -> Result<(), HandlerError> {
            self.active.fetch_add(1, Ordering::SeqCst);
            while !self.release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(2));
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn accept_n(n: usize) -> (Vec<Connection>, Vec<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();
        let mut clients = Vec::with_capacity(n);
        let mut conns = Vec::with_capacity(n);
        for _ in 0..n {
            clients.push(TcpStream::connect(addr).unwrap());
            let (stream, peer) = listener.accept().unwrap();
            conns.push(Connection::new(stream, peer));
        }
        (conns, clients)
    }

    #[test]
    fn test_submit_serves_connection() {
        let (mut conns, mut clients) = accept_n(1);
        let mut dispatcher =
            ThreadPerConnection::new(Arc::new(GreetingHandler), None, MetricsCollector::new());

        dispatcher.submit(conns.remove(0)).unwrap();

        let mut text = String::new();
        clients[0].read_to_string(&mut text).unwrap();
        assert!(text.starts_with("Hello from server "));
        dispatcher.shutdown();
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn test_fifty_connections_run_concurrently() {
        const M: usize = 50;
        let (conns, _clients) = accept_n(M);
        let gate = Arc::new(GateHandler {
            active: AtomicUsize::new(0),
            release: AtomicBool::new(false),
        });
        let metrics = MetricsCollector::new();
        let mut dispatcher = ThreadPerConnection::new(gate.clone(), None, metrics.clone());

        for conn in conns {
            dispatcher.submit(conn).unwrap();
        }

        let start = Instant::now();
        while gate.active.load(Ordering::SeqCst) < M && start.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(gate.active.load(Ordering::SeqCst), M);
        assert_eq!(dispatcher.in_flight(), M);

        gate.release.store(true, Ordering::SeqCst);
        dispatcher.shutdown();
        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(metrics.peak_handlers(), M as u64);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let (mut conns, _clients) = accept_n(1);
        let mut dispatcher =
            ThreadPerConnection::new(Arc::new(GreetingHandler), None, MetricsCollector::new());
        dispatcher.shutdown();

        assert!(matches!(
            dispatcher.submit(conns.remove(0)),
            Err(DispatchError::ShutDown)
        ));
    }
}
