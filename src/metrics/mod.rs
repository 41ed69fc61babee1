pub mod log;
pub mod model;
pub mod printer;
pub mod storage;

pub use log::{METRICS_CAPACITY, MetricStats, MetricsLog};
pub use model::PerformanceMetric;
pub use storage::MetricsStorage;

use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Where the chain engine sends one row per executed call.
///
/// Recording is best-effort: a sink that fails to persist logs a warning but
/// never fails the run.
pub trait MetricsSink: Send + Sync {
    fn record(&self, metric: PerformanceMetric);
}

/// In-memory log shared between the engine and its callers.
#[derive(Debug, Default)]
pub struct SharedMetricsLog {
    inner: Mutex<MetricsLog>,
}

impl SharedMetricsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsLog {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stats(&self, endpoint: Option<&str>) -> MetricStats {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats(endpoint)
    }
}

impl MetricsSink for SharedMetricsLog {
    fn record(&self, metric: PerformanceMetric) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(metric);
    }
}

impl MetricsSink for MetricsStorage {
    fn record(&self, metric: PerformanceMetric) {
        if let Err(e) = self.append(&metric) {
            warn!("Failed to save performance metric: {}", e);
        }
    }
}
