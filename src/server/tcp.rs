//! # Acceptor TCP
//! src/server/tcp.rs
//!
//! Un solo thread acepta conexiones y las entrega al dispatcher, que decide
//! quién las atiende (thread propio o worker del pool). El acceptor nunca
//! espera a que termine un handler.

use crate::config::{AcceptErrorPolicy, Config};
use crate::dispatch::{self, Dispatcher};
use crate::error::{DispatchError, ServerError};
use crate::handler::Handler;
use crate::metrics::MetricsCollector;
use crate::server::Connection;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Cada cuánto se reintenta el accept no bloqueante
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Permite detener el loop de accept desde otro thread
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Servidor: socket de escucha + dispatcher elegido
pub struct Server {
    config: Config,
    listener: TcpListener,
    dispatcher: Box<dyn Dispatcher>,
    metrics: MetricsCollector,
    stop: StopHandle,
}

impl Server {
    /// Valida la configuración, abre el socket de escucha y arranca el dispatcher
    ///
    /// Un fallo de bind es fatal y no se reintenta.
    pub fn bind(config: Config, handler: Arc<dyn Handler>) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        let address = config.address();
        let bind_error = |source| ServerError::Bind {
            addr: address.clone(),
            source,
        };

        let listener = TcpListener::bind(&address).map_err(bind_error)?;
        // El accept se sondea para poder medir la ventana de inactividad
        listener.set_nonblocking(true).map_err(bind_error)?;

        let metrics = MetricsCollector::new();
        let dispatcher = dispatch::build(&config, handler, metrics.clone())?;

        info!(
            address = %listener.local_addr().map(|a| a.to_string()).unwrap_or(address.clone()),
            mode = dispatcher.name(),
            "server is listening"
        );

        Ok(Self {
            config,
            listener,
            dispatcher,
            metrics,
            stop: StopHandle::default(),
        })
    }

    /// Dirección real del socket (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Corre el loop de accept hasta timeout de inactividad, error fatal o stop
    ///
    /// En cualquier salida se libera el socket y se apaga el dispatcher una
    /// sola vez, dejando terminar las conexiones en curso.
    pub fn run(self) -> Result<(), ServerError> {
        let result = self.accept_loop();

        match &result {
            Ok(()) => info!("accept loop stopped"),
            Err(e) if e.is_idle_shutdown() => info!(reason = %e, "idle timeout reached"),
            Err(e) => error!(error = %e, "accept loop failed"),
        }

        let Server {
            listener,
            mut dispatcher,
            metrics,
            ..
        } = self;

        drop(listener);
        dispatcher.shutdown();
        info!(metrics = %metrics.to_json(), "server shut down");

        result
    }

    fn accept_loop(&self) -> Result<(), ServerError> {
        let idle = self.config.accept_timeout();
        let mut last_accept = Instant::now();

        loop {
            if self.stop.is_stopped() {
                return Ok(());
            }

            match self.listener.accept() {
                Ok((stream, peer)) => {
                    last_accept = Instant::now();
                    self.metrics.record_accepted();

                    // En algunas plataformas el socket aceptado hereda el modo no bloqueante
                    if let Err(e) = stream.set_nonblocking(false) {
                        self.metrics.record_rejected();
                        warn!(%peer, error = %e, "could not restore blocking mode; dropping connection");
                        continue;
                    }

                    debug!(%peer, "connection accepted");
                    self.dispatch(Connection::new(stream, peer), peer)?;
                    // Con cola acotada + `block` el submit puede esperar; esa espera
                    // no cuenta como inactividad
                    last_accept = Instant::now();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if let Some(idle) = idle {
                        if last_accept.elapsed() >= idle {
                            return Err(ServerError::AcceptTimeout { idle });
                        }
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    if !keep_accepting(self.config.accept_errors, &e) {
                        return Err(ServerError::Accept(e));
                    }
                    warn!(error = %e, "transient accept failure; continuing");
                }
            }
        }
    }

    fn dispatch(&self, conn: Connection, peer: SocketAddr) -> Result<(), ServerError> {
        match self.dispatcher.submit(conn) {
            Ok(()) => Ok(()),
            Err(DispatchError::QueueFull { capacity }) => {
                self.metrics.record_rejected();
                warn!(%peer, capacity, "queue full; connection rejected");
                Ok(())
            }
            Err(DispatchError::Spawn(e)) => {
                self.metrics.record_rejected();
                error!(%peer, error = %e, "could not spawn handler thread; connection dropped");
                Ok(())
            }
            Err(e @ DispatchError::ShutDown) => Err(e.into()),
        }
    }
}

/// Errores de accept que afectan a una sola conexión pendiente
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}

/// Decide si el loop sigue tras un error de accept que no es timeout
fn keep_accepting(policy: AcceptErrorPolicy, e: &io::Error) -> bool {
    match policy {
        AcceptErrorPolicy::Retry => is_transient(e),
        AcceptErrorPolicy::FailFast => false,
    }
}
