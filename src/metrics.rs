use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding window of flush latencies used for percentile reporting
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    measurements: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a new percentile tracker with a specified window size
    pub fn new(window_size: usize) -> Self {
        Self {
            measurements: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record a measurement (in nanoseconds)
    pub fn record(&self, nanos: u64) {
        let mut measurements = self.measurements.lock();
        if measurements.len() >= self.window_size {
            measurements.pop_front();
        }
        measurements.push_back(nanos);
    }

    pub fn p50_us(&self) -> f64 {
        self.percentile(0.50)
    }

    pub fn p95_us(&self) -> f64 {
        self.percentile(0.95)
    }

    pub fn p99_us(&self) -> f64 {
        self.percentile(0.99)
    }

    fn percentile(&self, p: f64) -> f64 {
        let measurements = self.measurements.lock();
        if measurements.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<_> = measurements.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize).saturating_sub(1);
        sorted[idx] as f64 / 1000.0
    }

    /// Get the count of recorded measurements
    pub fn count(&self) -> usize {
        self.measurements.lock().len()
    }
}

/// Per-stage counters, shared between the stage thread and the pipeline handle
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Values taken from the input channel
    received: Arc<AtomicU64>,
    /// Values sent to the output channel
    emitted: Arc<AtomicU64>,
    /// Values rejected by a filter or overwritten in the ring buffer
    dropped: Arc<AtomicU64>,
    /// Non-empty flushes performed by a buffer stage
    flushes: Arc<AtomicU64>,
    /// Time spent forwarding each flush batch
    flush_latency: PercentileTracker,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            emitted: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            flushes: Arc::new(AtomicU64::new(0)),
            flush_latency: PercentileTracker::new(1000),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a completed flush and how long forwarding it took
    pub fn record_flush(&self, elapsed: Duration) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flush_latency.record(elapsed.as_nanos() as u64);
    }

    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn total_flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Emitted values per second since the stage was created
    pub fn throughput_mps(&self) -> f64 {
        let elapsed = self.start_time.elapsed();
        let total = self.total_emitted();
        if elapsed.as_secs_f64() == 0.0 {
            0.0
        } else {
            total as f64 / elapsed.as_secs_f64()
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_received: self.total_received(),
            total_emitted: self.total_emitted(),
            total_dropped: self.total_dropped(),
            total_flushes: self.total_flushes(),
            throughput_mps: self.throughput_mps(),
            flush_p50_us: self.flush_latency.p50_us(),
            flush_p95_us: self.flush_latency.p95_us(),
            flush_p99_us: self.flush_latency.p99_us(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_received: u64,
    pub total_emitted: u64,
    pub total_dropped: u64,
    pub total_flushes: u64,
    pub throughput_mps: f64,
    pub flush_p50_us: f64,
    pub flush_p95_us: f64,
    pub flush_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Emitted: {}, Dropped: {}, Flushes: {}, Throughput: {:.2} msg/s, \
             Flush P50: {:.2}µs, P95: {:.2}µs, P99: {:.2}µs, Elapsed: {:.2}s",
            self.total_received,
            self.total_emitted,
            self.total_dropped,
            self.total_flushes,
            self.throughput_mps,
            self.flush_p50_us,
            self.flush_p95_us,
            self.flush_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}
