//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del acceptor con soporte para argumentos CLI y variables
//! de entorno. Los valores por defecto reproducen las constantes históricas:
//! puerto 8010, timeout de accept de 70 s y pool de 20 workers.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./greet_server --port 9000 --mode bounded \
//!   --pool-size 8 --queue-capacity 32 --overflow reject
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! GREET_PORT=9000 GREET_MODE=threaded ./greet_server
//! ```

use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Estrategia de despacho de conexiones
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatchMode {
    /// Un thread nuevo por conexión, sin límite
    Threaded,
    /// Pool fijo de workers con cola FIFO sin límite
    Pooled,
    /// Pool fijo de workers con cola FIFO acotada (backpressure)
    Bounded,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Threaded => "threaded",
            DispatchMode::Pooled => "pooled",
            DispatchMode::Bounded => "bounded",
        }
    }
}

/// Qué hacer cuando la cola acotada está llena
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverflowPolicy {
    /// Bloquear al acceptor hasta que haya espacio
    Block,
    /// Rechazar la conexión (se cierra sin datos)
    Reject,
}

/// Qué hacer con un error de accept que no es timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AcceptErrorPolicy {
    /// Seguir aceptando si el error es transitorio
    Retry,
    /// Terminar el loop ante cualquier error
    FailFast,
}

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "greet_server")]
#[command(about = "Acceptor TCP concurrente: thread por conexión o pool fijo de workers")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8010", env = "GREET_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "GREET_HOST")]
    pub host: String,

    // === Despacho ===

    /// Estrategia de despacho
    #[arg(short, long, value_enum, default_value = "pooled", env = "GREET_MODE")]
    pub mode: DispatchMode,

    /// Número de workers (modos pooled y bounded)
    #[arg(long = "pool-size", default_value = "20", env = "GREET_POOL_SIZE")]
    pub pool_size: usize,

    /// Capacidad de la cola (solo modo bounded)
    #[arg(long = "queue-capacity", default_value = "64", env = "GREET_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Política cuando la cola acotada está llena
    #[arg(long, value_enum, default_value = "block", env = "GREET_OVERFLOW")]
    pub overflow: OverflowPolicy,

    // === Timeouts ===

    /// Ventana de inactividad del accept en milisegundos (0 = sin límite)
    #[arg(long = "accept-timeout", default_value = "70000", env = "GREET_ACCEPT_TIMEOUT")]
    pub accept_timeout_ms: u64,

    /// Deadline de lectura/escritura por conexión en milisegundos (0 = sin límite)
    #[arg(long = "connection-timeout", default_value = "5000", env = "GREET_CONNECTION_TIMEOUT")]
    pub connection_timeout_ms: u64,

    // === Errores y logging ===

    /// Política ante errores de accept
    #[arg(long = "accept-errors", value_enum, default_value = "retry", env = "GREET_ACCEPT_ERRORS")]
    pub accept_errors: AcceptErrorPolicy,

    /// Filtro de logs (sintaxis de RUST_LOG)
    #[arg(long = "log-level", default_value = "info", env = "GREET_LOG")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use greet_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8010");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ventana de inactividad del accept, `None` si está deshabilitada
    pub fn accept_timeout(&self) -> Option<Duration> {
        (self.accept_timeout_ms > 0).then(|| Duration::from_millis(self.accept_timeout_ms))
    }

    /// Deadline por conexión, `None` si está deshabilitado
    pub fn connection_timeout(&self) -> Option<Duration> {
        (self.connection_timeout_ms > 0).then(|| Duration::from_millis(self.connection_timeout_ms))
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }

        // El tamaño del pool solo importa si hay pool
        if self.mode != DispatchMode::Threaded && self.pool_size == 0 {
            return Err("Pool size must be >= 1".to_string());
        }

        if self.mode == DispatchMode::Bounded && self.queue_capacity == 0 {
            return Err("Queue capacity must be >= 1".to_string());
        }

        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════╗");
        println!("║        Greet Server Configuration            ║");
        println!("╚══════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:         {}", self.address());
        println!("   Accept timeout:  {}", describe_ms(self.accept_timeout_ms));
        println!("   Conn. deadline:  {}", describe_ms(self.connection_timeout_ms));
        println!();
        println!("👷 Dispatch:");
        println!("   Mode:            {}", self.mode.as_str());
        match self.mode {
            DispatchMode::Threaded => {
                println!("   Workers:         one per connection (unbounded)");
            }
            DispatchMode::Pooled => {
                println!("   Workers:         {}", self.pool_size);
                println!("   Queue:           unbounded FIFO");
            }
            DispatchMode::Bounded => {
                println!("   Workers:         {}", self.pool_size);
                println!("   Queue:           {} slots, overflow = {:?}", self.queue_capacity, self.overflow);
            }
        }
        println!("   Accept errors:   {:?}", self.accept_errors);
        println!();
        println!("════════════════════════════════════════════════");
        println!();
    }
}

fn describe_ms(ms: u64) -> String {
    if ms == 0 {
        "disabled".to_string()
    } else {
        format!("{} ms", ms)
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8010,
            host: "0.0.0.0".to_string(),
            mode: DispatchMode::Pooled,
            pool_size: 20,
            queue_capacity: 64,
            overflow: OverflowPolicy::Block,
            accept_timeout_ms: 70_000,
            connection_timeout_ms: 5_000,
            accept_errors: AcceptErrorPolicy::Retry,
            log_level: "info".to_string(),
        }
    }
}
