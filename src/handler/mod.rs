//! # Handler de Conexiones
//! src/handler/mod.rs
//!
//! El handler escribe una línea de saludo y la conexión se cierra.
//! `serve` es el único punto de entrada que usan los dispatchers: arma el
//! deadline, corre el handler, registra el resultado y cierra siempre.

use crate::error::HandlerError;
use crate::metrics::MetricsCollector;
use crate::server::Connection;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lógica que sirve una conexión
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError>;
}

/// Escribe `Hello from server <peer>` y termina
#[derive(Debug, Clone, Copy, Default)]
pub struct GreetingHandler;

impl GreetingHandler {
    pub fn greeting(conn: &Connection) -> String {
        format!("Hello from server {}\n", conn.peer())
    }
}

impl Handler for GreetingHandler {
    fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
        let line = Self::greeting(conn);
        let peer = conn.peer();

        conn.write_all(line.as_bytes())
            .and_then(|_| conn.flush())
            .map_err(|source| HandlerError::Write { peer, source })
    }
}

/// Sirve una conexión completa dentro de la unidad de ejecución actual
///
/// Los errores del handler se registran aquí y no salen de esta función.
pub fn serve(
    handler: &Arc<dyn Handler>,
    mut conn: Connection,
    deadline: Option<Duration>,
    metrics: &MetricsCollector,
) {
    let _active = metrics.begin_handler();
    let peer = conn.peer();

    let result = conn
        .apply_deadline(deadline)
        .map_err(|source| HandlerError::Deadline { peer, source })
        .and_then(|_| handler.handle(&mut conn));

    let latency = conn.age();
    match &result {
        Ok(()) => debug!(%peer, latency_us = latency.as_micros() as u64, "connection served"),
        Err(e) => warn!(%peer, error = %e, "connection handler failed"),
    }
    metrics.record_served(latency, result.is_ok());

    conn.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};
    use std::net::{SocketAddr, TcpListener, TcpStream};

    fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        (Connection::new(stream, peer), client)
    }

    struct FailingHandler;

    impl Handler for FailingHandler {
        fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
            Err(HandlerError::Write {
                peer: conn.peer(),
                source: io::Error::from(io::ErrorKind::BrokenPipe),
            })
        }
    }

    #[test]
    fn test_greeting_contains_peer() {
        let (conn, client) = pair();
        let line = GreetingHandler::greeting(&conn);
        assert_eq!(line, format!("Hello from server {}\n", client.local_addr().unwrap()));
    }

    #[test]
    fn test_serve_writes_one_line_and_closes() {
        let (conn, mut client) = pair();
        let handler: Arc<dyn Handler> = Arc::new(GreetingHandler);
        let metrics = MetricsCollector::new();

        serve(&handler, conn, Some(Duration::from_secs(1)), &metrics);

        let mut text = String::new();
        client.read_to_string(&mut text).unwrap();
        let me: SocketAddr = client.local_addr().unwrap();
        assert_eq!(text, format!("Hello from server {}\n", me));
        assert_eq!(text.lines().count(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.served, 1);
        assert_eq!(snapshot.active_handlers, 0);
    }

    #[test]
    fn test_serve_isolates_handler_error() {
        let (conn, mut client) = pair();
        let handler: Arc<dyn Handler> = Arc::new(FailingHandler);
        let metrics = MetricsCollector::new();

        serve(&handler, conn, None, &metrics);

        // El cliente ve la conexión cerrada sin datos
        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).unwrap(), 0);
        assert_eq!(metrics.snapshot().failed, 1);
        assert_eq!(metrics.active_handlers(), 0);
    }
}
