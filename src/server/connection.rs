//! # Conexión Aceptada
//! src/server/connection.rs
//!
//! Un `TcpStream` con su peer. Pertenece a una sola unidad de ejecución a
//! la vez; el socket se cierra una única vez cuando la conexión se consume
//! con `close` o se suelta.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    accepted_at: Instant,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            accepted_at: Instant::now(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Tiempo desde que el acceptor tomó la conexión
    pub fn age(&self) -> Duration {
        self.accepted_at.elapsed()
    }

    /// Arma el deadline de lectura/escritura. `None` lo deshabilita.
    pub fn apply_deadline(&self, deadline: Option<Duration>) -> io::Result<()> {
        self.stream.set_write_timeout(deadline)?;
        self.stream.set_read_timeout(deadline)
    }

    /// Cierra el lado de escritura y suelta el socket
    pub fn close(self) {
        // El peer pudo haber cerrado ya; no hay nada más que hacer
        let _ = self.stream.shutdown(Shutdown::Write);
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        (Connection::new(stream, peer), client)
    }

    #[test]
    fn test_peer_matches_client_address() {
        let (conn, client) = pair();
        assert_eq!(conn.peer(), client.local_addr().unwrap());
    }

    #[test]
    fn test_close_sends_eof() {
        let (mut conn, mut client) = pair();
        conn.write_all(b"hi\n").unwrap();
        conn.close();

        let mut buf = String::new();
        client.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hi\n");
    }

    #[test]
    fn test_drop_also_closes() {
        let (conn, mut client) = pair();
        drop(conn);

        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_apply_deadline() {
        let (conn, _client) = pair();
        conn.apply_deadline(Some(Duration::from_millis(250))).unwrap();
        assert_eq!(conn.stream.write_timeout().unwrap(), Some(Duration::from_millis(250)));
        assert_eq!(conn.stream.read_timeout().unwrap(), Some(Duration::from_millis(250)));

        conn.apply_deadline(None).unwrap();
        assert_eq!(conn.stream.write_timeout().unwrap(), None);
    }
}
