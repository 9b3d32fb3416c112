//! Threshold alerting scenarios through the facade

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pulse_observer::{
    AlertSeverity, Observer, PerformanceAlert, PerformanceThreshold, ThresholdComparison,
};

use crate::test_setup;
use crate::utils::generators;

/// One storage write plus one evaluation pass, `cycles` times over
fn feed_cycles(observer: &Observer, metric: &str, value: f64, cycles: usize) {
    for _ in 0..cycles {
        generators::record_flat_gauge(observer.collector(), metric, value, 1);
        observer.monitor().evaluate_once();
    }
}

#[test]
fn test_default_cpu_threshold_raises_then_resolves() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();

    feed_cycles(&observer, "cpu_usage", 85.0, 3);
    let alerts = observer.monitor().active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric_name, "cpu_usage");
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    assert!(!alerts[0].resolved);

    // Still violating, still one alert.
    feed_cycles(&observer, "cpu_usage", 85.0, 2);
    assert_eq!(observer.monitor().active_alerts().len(), 1);

    feed_cycles(&observer, "cpu_usage", 10.0, 3);
    assert!(observer.monitor().active_alerts().is_empty());
}

#[test]
fn test_critical_violation_escalates() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();

    feed_cycles(&observer, "cpu_usage", 95.0, 3);
    let alerts = observer.monitor().active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(alerts[0].threshold_value, 90.0);
}

#[test]
fn test_alert_callback_fires_once_per_raise() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let messages = Arc::new(Mutex::new(Vec::new()));

    let seen_clone = seen.clone();
    let messages_clone = messages.clone();
    observer
        .monitor()
        .add_alert_callback(Arc::new(move |alert: &PerformanceAlert| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            messages_clone.lock().unwrap().push(alert.message.clone());
            Ok(())
        }));

    feed_cycles(&observer, "memory_usage", 85.0, 6);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(messages.lock().unwrap()[0].contains("memory_usage"));
}

#[test]
fn test_custom_low_throughput_threshold() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();
    observer.monitor().add_threshold(PerformanceThreshold {
        metric_name: "throughput_rps".to_string(),
        warning_threshold: 10.0,
        critical_threshold: 1.0,
        comparison: ThresholdComparison::LessThan,
        window_size: 2,
        description: "Request throughput floor".to_string(),
    });

    feed_cycles(&observer, "app_requests_per_sec", 4.0, 2);
    let alerts = observer.monitor().active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric_name, "throughput_rps");
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);

    assert!(observer.monitor().remove_threshold("throughput_rps"));
    assert!(!observer.monitor().remove_threshold("throughput_rps"));
}

#[test]
fn test_no_alert_below_window() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();

    // Default windows need three samples; two violations are not enough.
    feed_cycles(&observer, "cpu_usage", 99.0, 2);
    assert!(observer.monitor().active_alerts().is_empty());
}
