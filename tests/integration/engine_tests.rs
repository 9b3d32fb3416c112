//! Engine lifecycle and data-flow scenarios

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pulse_observer::{Metric, Observer, ObserverConfig, StorageConfig};

use crate::utils::{generators, wait_for_condition};
use crate::{test_setup, DEFAULT_CHECK_INTERVAL, DEFAULT_TEST_TIMEOUT};

fn fast_config() -> ObserverConfig {
    let mut config = ObserverConfig::default();
    config.collection.collection_interval_secs = 1;
    config.monitoring.monitoring_interval_secs = 1;
    config.tracking.tracking_interval_secs = 1;
    config
}

#[test]
fn test_recorded_metrics_flow_into_monitor_snapshots() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();

    generators::record_flat_gauge(observer.collector(), "cpu_usage", 42.0, 3);
    generators::record_flat_gauge(observer.collector(), "memory_usage", 61.5, 3);

    observer.monitor().evaluate_once();
    let snapshot = observer.monitor().current_snapshot().unwrap();
    assert_eq!(snapshot.cpu_usage, Some(42.0));
    assert_eq!(snapshot.memory_usage, Some(61.5));
}

#[test]
fn test_application_metrics_surface_through_collector() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();

    generators::simulate_requests(observer.app_metrics(), "/api/export", 20, 0, 7);
    observer.app_metrics().increment_counter("export_jobs", &[], 3.0);

    // Collection cycles run on a timer; push the app metrics through the
    // shared path by hand instead of waiting one out.
    for metric in observer.app_metrics().collect_metrics() {
        observer.collector().collect_metric(
            &metric.name,
            metric.value,
            metric.kind,
            &[],
            None,
            None,
        );
    }

    let count = observer
        .collector()
        .metric_series("app_request_count", &BTreeMap::new())
        .unwrap();
    assert_eq!(count.latest().unwrap().value, 20.0);
    let jobs = observer
        .collector()
        .metric_series("export_jobs", &BTreeMap::new())
        .unwrap();
    assert_eq!(jobs.latest().unwrap().value, 3.0);
}

#[test]
fn test_erring_callback_never_halts_collection() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();
    let healthy_calls = Arc::new(AtomicUsize::new(0));
    let healthy_clone = healthy_calls.clone();

    observer
        .collector()
        .add_metric_callback(Arc::new(|_m: &Metric| anyhow::bail!("sink offline")));
    observer
        .collector()
        .add_metric_callback(Arc::new(move |_m: &Metric| {
            healthy_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

    generators::record_ramping_gauge(observer.collector(), "frame_time", 16.0, 0.1, 5);

    let series = observer
        .collector()
        .metric_series("frame_time", &BTreeMap::new())
        .unwrap();
    assert_eq!(series.len(), 5);
    assert_eq!(healthy_calls.load(Ordering::SeqCst), 5);
}

#[test]
fn test_storage_caps_hold_under_flood() {
    test_setup!();
    let config = ObserverConfig {
        storage: StorageConfig {
            max_series: 50,
            max_points_per_series: 20,
        },
        ..ObserverConfig::default()
    };
    let observer = Observer::new(config).unwrap();

    for series in 0..200 {
        let name = format!("flood_metric_{}", series);
        generators::record_ramping_gauge(observer.collector(), &name, 0.0, 1.0, 40);
    }

    let all = observer.collector().all_metrics();
    assert_eq!(all.len(), 50);
    for series in &all {
        assert!(series.len() <= 20);
    }
}

#[test]
fn test_export_summary_json_is_complete() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();
    generators::record_flat_gauge(observer.collector(), "cpu_usage", 30.0, 3);
    observer.monitor().evaluate_once();
    observer.tracker().capture_now();

    let exported = observer.export_summary_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&exported).unwrap();

    assert!(parsed["metrics"]["series_count"].as_u64().unwrap() >= 1);
    assert_eq!(parsed["performance"]["sample_count"].as_u64(), Some(1));
    assert_eq!(parsed["resources"]["sample_count"].as_u64(), Some(1));
    assert!(parsed["timestamp"].is_i64());
}

#[test]
fn test_invalid_config_is_rejected() {
    test_setup!();
    let mut config = ObserverConfig::default();
    config.tracking.thresholds.cpu_percent = f64::NAN;
    assert!(Observer::new(config).is_err());
}

#[tokio::test]
async fn test_engine_runs_and_stops_within_bounds() {
    test_setup!();
    let observer = Observer::new(fast_config()).unwrap();
    observer.start_all();

    wait_for_condition(
        || observer.collector().metrics_summary().cycle_count >= 1,
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_CHECK_INTERVAL,
    )
    .await
    .unwrap();

    let summary = observer.collector().metrics_summary();
    assert!(summary.running);
    assert!(summary.series_count > 0);
    assert!(summary.last_collection.is_some());

    let started = Instant::now();
    observer.stop_all().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(!observer.collector().is_running());
    assert!(!observer.monitor().is_running());
    assert!(!observer.tracker().is_running());
}
