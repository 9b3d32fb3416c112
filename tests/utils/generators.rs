//! Synthetic workload generators
//!
//! Deterministic shapes where a test asserts exact values, jittered
//! shapes (seeded rand) where only aggregate behavior matters.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pulse_observer::{ApplicationMetricsCollector, MetricKind, MetricsCollector, ResourceUsage};

/// Push a gauge series that ramps linearly from `start` by `step`
pub fn record_ramping_gauge(
    collector: &MetricsCollector,
    name: &str,
    start: f64,
    step: f64,
    count: usize,
) {
    for i in 0..count {
        collector.collect_metric(
            name,
            start + step * i as f64,
            MetricKind::Gauge,
            &[],
            None,
            None,
        );
    }
}

/// Push a flat gauge series at `value`
pub fn record_flat_gauge(collector: &MetricsCollector, name: &str, value: f64, count: usize) {
    record_ramping_gauge(collector, name, value, 0.0, count);
}

/// Record a batch of requests with jittered latency; every
/// `error_every`-th request fails with a 500
pub fn simulate_requests(
    app: &ApplicationMetricsCollector,
    endpoint: &str,
    count: usize,
    error_every: usize,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    for i in 0..count {
        let millis = rng.gen_range(5..50);
        let status = if error_every > 0 && (i + 1) % error_every == 0 {
            500
        } else {
            200
        };
        app.record_request(endpoint, Duration::from_millis(millis), status);
    }
}

/// Process-memory figures doubling over `count` samples, for leak scenarios
pub fn leaking_memory_series(base: u64, count: usize) -> Vec<u64> {
    (0..count)
        .map(|i| base + base * i as u64 / count.max(1) as u64)
        .collect()
}

/// A plausible usage sample with the interesting figures pinned
pub fn synthetic_usage(cpu: f64, memory_percent: f64, process_memory: u64) -> ResourceUsage {
    ResourceUsage {
        timestamp: Utc::now(),
        cpu_percent: cpu,
        per_core_cpu_percent: vec![cpu, cpu],
        load_average_1m: 0.5,
        load_average_5m: 0.4,
        load_average_15m: 0.3,
        memory_total_bytes: 16_000_000_000,
        memory_used_bytes: 8_000_000_000,
        memory_available_bytes: 8_000_000_000,
        memory_percent: Some(memory_percent),
        swap_total_bytes: 0,
        swap_used_bytes: 0,
        swap_percent: None,
        process_cpu_percent: Some(cpu),
        process_memory_bytes: Some(process_memory),
        process_virtual_memory_bytes: None,
        process_thread_count: None,
        process_disk_read_bytes: None,
        process_disk_written_bytes: None,
        disk_total_bytes: 500_000_000_000,
        disk_free_bytes: 250_000_000_000,
        disk_usage_percent: Some(50.0),
        network_rx_bytes: 0,
        network_tx_bytes: 0,
        network_rx_packets: 0,
        network_tx_packets: 0,
        process_count: 120,
        uptime_secs: 3600,
        connection_count: None,
        runtime_object_count: None,
        runtime_collection_counts: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaking_series_grows() {
        let series = leaking_memory_series(1_000_000, 10);
        assert_eq!(series.len(), 10);
        assert!(series.last().unwrap() > &series[0]);
    }

    #[test]
    fn test_simulate_requests_counts_errors() {
        let app = ApplicationMetricsCollector::new(128);
        simulate_requests(&app, "/api/sync", 10, 5, 42);

        let metrics = app.collect_metrics();
        let error_rate = metrics
            .iter()
            .find(|m| m.name == "error_rate")
            .expect("overall error rate present");
        assert!((error_rate.value - 20.0).abs() < 1e-9);
    }
}
