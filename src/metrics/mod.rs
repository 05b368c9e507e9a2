//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Recolección de métricas del acceptor:
//! - Conexiones aceptadas / rechazadas / servidas / fallidas
//! - Handlers activos y pico de concurrencia
//! - Latencias (p50, p95, p99)

pub mod collector;

pub use collector::{ActiveGuard, MetricsCollector, MetricsSnapshot};
