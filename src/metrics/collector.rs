//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Contadores de conexiones, concurrencia de handlers (actual y pico)
//! y latencias por conexión.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar para calcular percentiles
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
#[derive(Default)]
struct MetricsData {
    /// Conexiones aceptadas por el acceptor
    accepted: u64,

    /// Conexiones rechazadas por cola llena
    rejected: u64,

    /// Conexiones servidas sin error
    served: u64,

    /// Conexiones cuyo handler falló
    failed: u64,

    /// Handlers ejecutándose ahora mismo
    active_handlers: u64,

    /// Máximo de handlers simultáneos observado
    peak_handlers: u64,

    /// Latencias registradas (en microsegundos)
    latencies: VecDeque<u64>,
}

impl MetricsCollector {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData::default())),
            start_time: Instant::now(),
        }
    }

    fn data(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_accepted(&self) {
        self.data().accepted += 1;
    }

    pub fn record_rejected(&self) {
        self.data().rejected += 1;
    }

    /// Marca el inicio de un handler. El guard lo marca como terminado al soltarse.
    pub fn begin_handler(&self) -> ActiveGuard {
        let mut data = self.data();
        data.active_handlers += 1;
        if data.active_handlers > data.peak_handlers {
            data.peak_handlers = data.active_handlers;
        }
        ActiveGuard { collector: self.clone() }
    }

    fn end_handler(&self) {
        let mut data = self.data();
        if data.active_handlers > 0 {
            data.active_handlers -= 1;
        }
    }

    /// Registra el resultado de una conexión servida
    pub fn record_served(&self, latency: Duration, ok: bool) {
        let mut data = self.data();

        if ok {
            data.served += 1;
        } else {
            data.failed += 1;
        }

        // Si tenemos demasiadas latencias, eliminar las más antiguas
        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);
    }

    pub fn active_handlers(&self) -> u64 {
        self.data().active_handlers
    }

    pub fn peak_handlers(&self) -> u64 {
        self.data().peak_handlers
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.data();
        let (p50, p95, p99, avg) = calculate_percentiles(&data.latencies);

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            accepted: data.accepted,
            rejected: data.rejected,
            served: data.served,
            failed: data.failed,
            active_handlers: data.active_handlers,
            peak_handlers: data.peak_handlers,
            latency_us: LatencySummary {
                p50,
                p95,
                p99,
                avg,
                samples: data.latencies.len(),
            },
        }
    }

    /// Snapshot serializado como JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calcula percentiles de latencia: (p50, p95, p99, avg)
fn calculate_percentiles(latencies: &VecDeque<u64>) -> (u64, u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0, 0);
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let len = sorted.len();
    let p50 = sorted[len * 50 / 100];
    let p95 = sorted[len * 95 / 100];
    let p99 = sorted[len * 99 / 100];

    let sum: u64 = sorted.iter().sum();
    let avg = sum / len as u64;

    (p50, p95, p99, avg)
}

/// Guard de un handler activo
pub struct ActiveGuard {
    collector: MetricsCollector,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.collector.end_handler();
    }
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub served: u64,
    pub failed: u64,
    pub active_handlers: u64,
    pub peak_handlers: u64,
    pub latency_us: LatencySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub avg: u64,
    pub samples: usize,
}
