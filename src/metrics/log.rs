use std::collections::VecDeque;

use serde::Serialize;

use super::model::PerformanceMetric;

/// Maximum number of metrics kept.
pub const METRICS_CAPACITY: usize = 1000;

/// Bounded FIFO log; the oldest entry is evicted once capacity is reached.
#[derive(Debug, Clone)]
pub struct MetricsLog {
    entries: VecDeque<PerformanceMetric>,
    capacity: usize,
}

/// Aggregates over a set of metrics. All zero for an empty set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricStats {
    pub count: usize,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub p50_response_time: f64,
    pub p95_response_time: f64,
    pub success_count: usize,
    /// Percentage, 0-100
    pub success_rate: f64,
}

impl MetricsLog {
    pub fn new() -> Self {
        Self::with_capacity(METRICS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, metric: PerformanceMetric) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(metric);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PerformanceMetric> {
        self.entries.iter()
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<PerformanceMetric> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Statistics over all entries, or only those whose `request_name` equals
    /// `endpoint`.
    pub fn stats(&self, endpoint: Option<&str>) -> MetricStats {
        let selected: Vec<&PerformanceMetric> = self
            .entries
            .iter()
            .filter(|m| endpoint.is_none_or(|e| m.request_name == e))
            .collect();

        if selected.is_empty() {
            return MetricStats::default();
        }

        let mut times: Vec<f64> = selected.iter().map(|m| m.response_time).collect();
        times.sort_by(f64::total_cmp);

        let count = selected.len();
        let success_count = selected.iter().filter(|m| m.is_success()).count();
        let percentile = |p: f64| times[((count as f64 * p) as usize).min(count - 1)];

        MetricStats {
            count,
            avg_response_time: times.iter().sum::<f64>() / count as f64,
            min_response_time: times[0],
            max_response_time: times[count - 1],
            p50_response_time: percentile(0.5),
            p95_response_time: percentile(0.95),
            success_count,
            success_rate: success_count as f64 / count as f64 * 100.0,
        }
    }
}

impl Default for MetricsLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<PerformanceMetric> for MetricsLog {
    fn extend<I: IntoIterator<Item = PerformanceMetric>>(&mut self, iter: I) {
        for metric in iter {
            self.record(metric);
        }
    }
}
