//! # Greet Server - Entry Point
//! src/main.rs
//!
//! Parsea la configuración, inicializa el logging y corre el acceptor
//! hasta que se cumple la ventana de inactividad o falla algo fatal.

use greet_server::config::Config;
use greet_server::handler::GreetingHandler;
use greet_server::server::Server;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = Config::new();

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();

    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        process::exit(2);
    }

    config.print_summary();

    let server = match Server::bind(config, Arc::new(GreetingHandler)) {
        Ok(server) => server,
        Err(e) => {
            error!("💥 Error fatal: {}", e);
            process::exit(1);
        }
    };

    match server.run() {
        Ok(()) => {}
        Err(e) if e.is_idle_shutdown() => info!("server idle, exiting"),
        Err(e) => {
            error!("💥 Error fatal: {}", e);
            process::exit(1);
        }
    }
}
