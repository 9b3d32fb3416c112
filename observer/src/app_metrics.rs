//! Application-level instrumentation
//!
//! The host records requests, counters, gauges and timed spans from any
//! thread; `collect_metrics` materializes the current state as metrics for
//! storage. Request and timer statistics are running aggregates, so the
//! lifetime averages the host sees never cost more than a few words of
//! memory per endpoint.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::metrics::{Metric, MetricId, MetricKind};

#[derive(Default)]
struct EndpointStats {
    request_count: u64,
    duration_sum_ms: f64,
    error_count: u64,
}

struct TimerStats {
    count: u64,
    sum_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

struct RecentRequest {
    at: Instant,
}

struct AppState {
    counters: HashMap<MetricId, f64>,
    gauges: HashMap<MetricId, f64>,
    timers: HashMap<MetricId, TimerStats>,
    endpoints: HashMap<String, EndpointStats>,
    // Bounded ring feeding windowed throughput; lifetime stats live in
    // the aggregates above.
    recent_requests: VecDeque<RecentRequest>,
    recent_capacity: usize,
}

/// Instrumentation surface for the host application
pub struct ApplicationMetricsCollector {
    state: Arc<Mutex<AppState>>,
}

impl ApplicationMetricsCollector {
    pub fn new(recent_requests_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState {
                counters: HashMap::new(),
                gauges: HashMap::new(),
                timers: HashMap::new(),
                endpoints: HashMap::new(),
                recent_requests: VecDeque::with_capacity(recent_requests_capacity),
                recent_capacity: recent_requests_capacity,
            })),
        }
    }

    fn lock(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
        match state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record one handled request. Status codes >= 400 count as errors.
    pub fn record_request(&self, endpoint: &str, duration: Duration, status_code: u16) {
        let mut state = Self::lock(&self.state);
        let stats = state.endpoints.entry(endpoint.to_string()).or_default();
        stats.request_count += 1;
        stats.duration_sum_ms += duration.as_secs_f64() * 1000.0;
        if status_code >= 400 {
            stats.error_count += 1;
        }

        if state.recent_requests.len() == state.recent_capacity {
            state.recent_requests.pop_front();
        }
        state.recent_requests.push_back(RecentRequest { at: Instant::now() });
    }

    /// Add `delta` to a named counter
    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)], delta: f64) {
        let id = MetricId::new(name, labels.iter().copied());
        let mut state = Self::lock(&self.state);
        *state.counters.entry(id).or_insert(0.0) += delta;
    }

    /// Set a named gauge to `value`
    pub fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let id = MetricId::new(name, labels.iter().copied());
        let mut state = Self::lock(&self.state);
        state.gauges.insert(id, value);
    }

    /// Start a timed span. Elapsed wall time is recorded when the guard
    /// drops, so every exit path records exactly once.
    pub fn timer(&self, name: &str, labels: &[(&str, &str)]) -> TimerGuard {
        TimerGuard {
            state: self.state.clone(),
            id: MetricId::new(name, labels.iter().copied()),
            started: Instant::now(),
            armed: true,
        }
    }

    /// Materialize all instrumentation state as metrics
    pub fn collect_metrics(&self) -> Vec<Metric> {
        let state = Self::lock(&self.state);
        let mut metrics = Vec::new();

        for (id, value) in &state.counters {
            metrics.push(labeled_metric(id, *value, MetricKind::Counter));
        }

        for (id, value) in &state.gauges {
            metrics.push(labeled_metric(id, *value, MetricKind::Gauge));
        }

        for (id, stats) in &state.timers {
            if stats.count == 0 {
                continue;
            }
            let mean = stats.sum_ms / stats.count as f64;
            metrics.push(labeled_metric(id, mean, MetricKind::Timer).with_unit("ms"));
            metrics.push(
                labeled_metric(id, stats.min_ms, MetricKind::Timer)
                    .with_unit("ms")
                    .with_label("stat", "min"),
            );
            metrics.push(
                labeled_metric(id, stats.max_ms, MetricKind::Timer)
                    .with_unit("ms")
                    .with_label("stat", "max"),
            );
        }

        let mut total_requests: u64 = 0;
        let mut total_errors: u64 = 0;
        for (endpoint, stats) in &state.endpoints {
            total_requests += stats.request_count;
            total_errors += stats.error_count;

            let mean = stats.duration_sum_ms / stats.request_count as f64;
            metrics.push(
                Metric::new("app_request_duration_ms", mean, MetricKind::Timer)
                    .with_label("endpoint", endpoint)
                    .with_unit("ms")
                    .with_description("Lifetime mean request duration"),
            );
            metrics.push(
                Metric::new(
                    "app_request_count",
                    stats.request_count as f64,
                    MetricKind::Counter,
                )
                .with_label("endpoint", endpoint),
            );
            metrics.push(
                Metric::new(
                    "app_request_error_rate",
                    stats.error_count as f64 / stats.request_count as f64 * 100.0,
                    MetricKind::Gauge,
                )
                .with_label("endpoint", endpoint)
                .with_unit("percent"),
            );
        }

        if total_requests > 0 {
            metrics.push(
                Metric::new(
                    "error_rate",
                    total_errors as f64 / total_requests as f64 * 100.0,
                    MetricKind::Gauge,
                )
                .with_unit("percent")
                .with_description("Lifetime request error rate"),
            );
        }

        if let Some(throughput) = windowed_throughput(&state.recent_requests) {
            metrics.push(
                Metric::new("app_requests_per_sec", throughput, MetricKind::Rate)
                    .with_unit("req/s")
                    .with_description("Throughput over the recent request window"),
            );
        }

        metrics
    }
}

fn labeled_metric(id: &MetricId, value: f64, kind: MetricKind) -> Metric {
    let mut labels = BTreeMap::new();
    for (key, val) in id.labels() {
        labels.insert(key.clone(), val.clone());
    }
    let mut metric = Metric::new(id.name(), value, kind);
    metric.labels = labels;
    metric
}

fn windowed_throughput(recent: &VecDeque<RecentRequest>) -> Option<f64> {
    let oldest = recent.front()?;
    if recent.len() < 2 {
        return None;
    }
    let elapsed = oldest.at.elapsed().as_secs_f64();
    if elapsed <= 0.0 {
        return None;
    }
    Some(recent.len() as f64 / elapsed)
}

/// RAII handle for a timed span
pub struct TimerGuard {
    state: Arc<Mutex<AppState>>,
    id: MetricId,
    started: Instant,
    armed: bool,
}

impl TimerGuard {
    /// Drop the measurement without recording it
    pub fn discard(mut self) {
        self.armed = false;
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut state = ApplicationMetricsCollector::lock(&self.state);
        match state.timers.get_mut(&self.id) {
            Some(stats) => {
                stats.count += 1;
                stats.sum_ms += elapsed_ms;
                if elapsed_ms < stats.min_ms {
                    stats.min_ms = elapsed_ms;
                }
                if elapsed_ms > stats.max_ms {
                    stats.max_ms = elapsed_ms;
                }
            }
            None => {
                state.timers.insert(
                    self.id.clone(),
                    TimerStats {
                        count: 1,
                        sum_ms: elapsed_ms,
                        min_ms: elapsed_ms,
                        max_ms: elapsed_ms,
                    },
                );
            }
        }
    }
}
