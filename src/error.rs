//! # Errores del Servidor
//! src/error.rs
//!
//! Clasificación tipada de fallos. Cada error sabe a qué alcance pertenece:
//! arranque (bind), loop de accept, o una sola conexión.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Alcance de un error: qué parte del servidor deja de funcionar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// El servidor no llegó a arrancar
    Startup,
    /// El loop de accept terminó
    AcceptLoop,
    /// Solo afecta a una conexión; el resto sigue
    Connection,
}

/// Errores a nivel de servidor (fatales para el acceptor)
#[derive(Debug, Error)]
pub enum ServerError {
    /// No se pudo crear el socket de escucha
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Ninguna conexión llegó dentro de la ventana de inactividad
    #[error("no connection accepted within {}ms", .idle.as_millis())]
    AcceptTimeout { idle: Duration },

    /// Cualquier otro fallo de accept
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// Configuración inválida
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ServerError {
    /// `true` si el servidor se detuvo por inactividad (política deliberada, no un crash)
    pub fn is_idle_shutdown(&self) -> bool {
        matches!(self, ServerError::AcceptTimeout { .. })
    }

    pub fn scope(&self) -> ErrorScope {
        match self {
            ServerError::Bind { .. } | ServerError::Config(_) => ErrorScope::Startup,
            ServerError::Dispatch(DispatchError::Spawn(_)) => ErrorScope::Startup,
            _ => ErrorScope::AcceptLoop,
        }
    }
}

/// Errores al entregar una conexión al dispatcher
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Cola acotada llena con política `reject`
    #[error("task queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    /// El dispatcher ya fue apagado
    #[error("dispatcher is shut down")]
    ShutDown,

    /// El sistema operativo no pudo crear el thread
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errores dentro del handler de una conexión. Nunca salen del worker.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to arm deadline for {peer}: {source}")]
    Deadline {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to write to {peer}: {source}")]
    Write {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl HandlerError {
    pub fn scope(&self) -> ErrorScope {
        ErrorScope::Connection
    }

    pub fn peer(&self) -> SocketAddr {
        match self {
            HandlerError::Deadline { peer, .. } | HandlerError::Write { peer, .. } => *peer,
        }
    }
}
