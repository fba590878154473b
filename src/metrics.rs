//! Phase timing histograms (index build, normalize, match, extract, attach,
//! worker queue wait). Samples are kept in fixed-size rings per metric.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Records elapsed time into the registry when finished.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// Record and return elapsed microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            pos: 0,
            count: 0,
        }
    }

    fn push(&mut self, value: f64) {
        let capacity = self.samples.len();
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % capacity;
        self.count = (self.count + 1).min(capacity);
    }

    /// Nearest-rank percentile over the retained samples.
    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted = self.samples[..self.count].to_vec();
        sorted.sort_by(f64::total_cmp);
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    ring_capacity: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(ring_capacity: usize) -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            ring_capacity,
        }
    }

    /// Record a sample in microseconds.
    pub fn record(&self, name: &'static str, value_us: f64) {
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::debug!(metric = name, value_us, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Samples currently retained for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.histograms.lock().get(name).map_or(0, |ring| ring.count)
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.histograms
            .lock()
            .iter()
            .map(|(&name, ring)| {
                (
                    name.to_string(),
                    MetricSummary {
                        p50_us: ring.percentile(50.0),
                        p95_us: ring.percentile(95.0),
                        p99_us: ring.percentile(99.0),
                        count: ring.count,
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

pub mod metric_names {
    pub const INDEX_BUILD: &str = "t_index_build";
    pub const NORMALIZE: &str = "t_normalize";
    pub const MATCH: &str = "t_match";
    pub const EXTRACT: &str = "t_extract";
    pub const ATTACH: &str = "t_attach";
    pub const JOB_QUEUE_WAIT: &str = "job_queue_wait";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_recorded_samples() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record(metric_names::MATCH, v as f64);
        }
        assert_eq!(registry.count(metric_names::MATCH), 100);
        let summary = registry.summary();
        let matched = &summary[metric_names::MATCH];
        assert_eq!(matched.count, 100);
        assert_eq!(matched.p50_us, 51.0);
        assert_eq!(matched.p99_us, 99.0);
        assert!(!summary.contains_key("missing"));
    }

    #[test]
    fn ring_keeps_only_latest_samples() {
        let registry = MetricsRegistry::with_capacity(2);
        for v in [10.0, 20.0, 30.0] {
            registry.record(metric_names::ATTACH, v);
        }
        let summary = registry.summary();
        let attach = &summary[metric_names::ATTACH];
        assert_eq!(attach.count, 2);
        assert_eq!(attach.p50_us, 30.0);
    }

    #[test]
    fn span_records_on_finish() {
        let registry = Arc::new(MetricsRegistry::new());
        let span = registry.span(metric_names::NORMALIZE);
        assert!(span.finish() >= 0.0);
        assert_eq!(registry.count(metric_names::NORMALIZE), 1);
    }
}
