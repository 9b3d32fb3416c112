//! The engine under concurrent writers
//!
//! These tests hammer the shared paths from several threads at once; the
//! assertions are about totals and caps holding, not timing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pulse_observer::{ApplicationMetricsCollector, MetricKind, Observer};

use crate::test_setup;
use crate::utils::generators;

const WRITER_THREADS: usize = 8;
const REQUESTS_PER_THREAD: usize = 250;

#[test]
fn test_concurrent_request_recording_is_lossless() {
    test_setup!();
    let app = Arc::new(ApplicationMetricsCollector::new(4096));

    let handles: Vec<_> = (0..WRITER_THREADS)
        .map(|_| {
            let app = app.clone();
            thread::spawn(move || {
                for i in 0..REQUESTS_PER_THREAD {
                    let status = if i % 10 == 0 { 500 } else { 200 };
                    app.record_request("/api/load", Duration::from_millis(5), status);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = app.collect_metrics();
    let total = metrics
        .iter()
        .find(|m| m.name == "app_request_count")
        .unwrap();
    assert_eq!(
        total.value,
        (WRITER_THREADS * REQUESTS_PER_THREAD) as f64
    );

    let error_rate = metrics.iter().find(|m| m.name == "error_rate").unwrap();
    assert!((error_rate.value - 10.0).abs() < 1e-9);
}

#[test]
fn test_concurrent_counters_accumulate_exactly() {
    test_setup!();
    let app = Arc::new(ApplicationMetricsCollector::new(64));

    let handles: Vec<_> = (0..WRITER_THREADS)
        .map(|_| {
            let app = app.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    app.increment_counter("events_processed", &[], 1.0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = app.collect_metrics();
    let counter = metrics
        .iter()
        .find(|m| m.name == "events_processed")
        .unwrap();
    assert_eq!(counter.value, (WRITER_THREADS * 1000) as f64);
}

#[test]
fn test_storage_survives_parallel_floods() {
    test_setup!();
    let observer = Arc::new(Observer::with_defaults().unwrap());

    let handles: Vec<_> = (0..WRITER_THREADS)
        .map(|writer| {
            let observer = observer.clone();
            thread::spawn(move || {
                let name = format!("stress_gauge_{}", writer);
                for i in 0..500 {
                    observer.collector().collect_metric(
                        &name,
                        i as f64,
                        MetricKind::Gauge,
                        &[],
                        None,
                        None,
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for writer in 0..WRITER_THREADS {
        let name = format!("stress_gauge_{}", writer);
        let series = observer
            .collector()
            .metric_series(&name, &BTreeMap::new())
            .unwrap();
        assert_eq!(series.latest().unwrap().value, 499.0);
        assert!(series.len() <= 1000);
    }
}

#[test]
fn test_monitor_evaluation_interleaved_with_writes() {
    test_setup!();
    let observer = Arc::new(Observer::with_defaults().unwrap());

    let writer = {
        let observer = observer.clone();
        thread::spawn(move || {
            generators::record_ramping_gauge(observer.collector(), "cpu_usage", 10.0, 0.1, 500);
        })
    };
    for _ in 0..50 {
        observer.monitor().evaluate_once();
    }
    writer.join().unwrap();

    observer.monitor().evaluate_once();
    let snapshot = observer.monitor().current_snapshot().unwrap();
    assert!(snapshot.cpu_usage.is_some());
    assert!(observer.monitor().active_alerts().is_empty());
}
