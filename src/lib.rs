//! # Greet Server
//! src/lib.rs
//!
//! Acceptor TCP mínimo que compara dos formas de atender conexiones
//! concurrentes: un thread por conexión (sin límite) y un pool fijo de
//! workers alimentado por una cola compartida. Cada conexión recibe una
//! sola línea, `Hello from server <peer>`, y se cierra.
//!
//! ## Arquitectura
//!
//! - `config`: CLI + variables de entorno
//! - `error`: errores tipados (arranque, loop de accept, conexión)
//! - `server`: socket de escucha, loop de accept, `Connection`
//! - `dispatch`: estrategias de despacho detrás de un trait común
//! - `pool`: cola FIFO + workers de larga vida
//! - `handler`: lógica de cada conexión
//! - `metrics`: contadores, concurrencia pico y latencias
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use greet_server::config::{Config, DispatchMode};
//! use greet_server::handler::GreetingHandler;
//! use greet_server::server::Server;
//! use std::sync::Arc;
//!
//! let mut config = Config::default();
//! config.mode = DispatchMode::Pooled;
//! config.pool_size = 4;
//!
//! let server = Server::bind(config, Arc::new(GreetingHandler)).expect("bind");
//! server.run().ok();
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod pool;
pub mod server;
