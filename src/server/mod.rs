//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Este módulo implementa el acceptor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones con una ventana de inactividad
//! 3. Entrega cada conexión al dispatcher sin esperar al handler
//! 4. Al salir apaga el dispatcher y libera el socket

pub mod connection;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use connection::Connection;
pub use tcp::{Server, StopHandle};
