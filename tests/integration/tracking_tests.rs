//! Resource tracking and diagnostics scenarios

use std::sync::Arc;
use std::time::Duration;

use pulse_observer::{
    analyze_resource_efficiency, analyze_resource_trends, detect_memory_leaks, Observer,
    ObserverConfig, ResourceUsage, RuntimeProbe, TrendDirection,
};

use crate::test_setup;
use crate::utils::generators;

#[test]
fn test_capture_now_builds_history() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();

    for _ in 0..3 {
        observer.tracker().capture_now();
    }

    let history = observer.tracker().usage_history();
    assert_eq!(history.len(), 3);
    let usage = &history[2];
    assert!(usage.cpu_percent >= 0.0);
    assert!(usage.memory_total_bytes > 0);
    assert!(usage.process_count > 0);
    assert!(observer.tracker().current_usage().is_some());
}

#[test]
fn test_resource_summary_over_recent_window() {
    test_setup!();
    let observer = Observer::with_defaults().unwrap();

    for _ in 0..5 {
        observer.tracker().capture_now();
    }

    let summary = observer.tracker().resource_summary(Duration::from_secs(60));
    assert_eq!(summary.sample_count, 5);
    assert!(summary.avg_cpu_percent.is_some());
    assert!(summary.peak_cpu_percent.is_some());

    let empty = observer.tracker().resource_summary(Duration::from_secs(0));
    assert_eq!(empty.sample_count, 0);
}

#[test]
fn test_low_memory_threshold_fires_static_rule() {
    test_setup!();
    let mut config = ObserverConfig::default();
    config.tracking.thresholds.memory_percent = 0.01;
    let observer = Observer::new(config).unwrap();

    observer.tracker().capture_now();

    let alerts = observer.tracker().alerts();
    assert!(alerts.iter().any(|a| a.metric_name == "memory_percent"));
}

#[test]
fn test_runtime_probe_feeds_captures() {
    test_setup!();
    struct HostProbe;
    impl RuntimeProbe for HostProbe {
        fn connection_count(&self) -> Option<u64> {
            Some(11)
        }
        fn collection_counts(&self) -> Option<Vec<u64>> {
            Some(vec![4, 2, 0])
        }
    }

    let observer = Observer::with_defaults().unwrap();
    observer.set_runtime_probe(Arc::new(HostProbe));

    let usage = observer.tracker().capture_now();
    assert_eq!(usage.connection_count, Some(11));
    assert_eq!(usage.runtime_collection_counts, Some(vec![4, 2, 0]));
    assert_eq!(usage.runtime_object_count, None);
}

#[test]
fn test_leak_diagnostics_on_growing_history() {
    test_setup!();
    let memory = generators::leaking_memory_series(1_000_000, 12);
    let history: Vec<ResourceUsage> = memory
        .iter()
        .map(|&bytes| generators::synthetic_usage(20.0, 55.0, bytes))
        .collect();

    let assessment = detect_memory_leaks(&history);
    assert!(assessment
        .indicators
        .contains(&"sustained_growth".to_string()));
    assert!(assessment
        .indicators
        .contains(&"significant_growth".to_string()));
    assert!(assessment.leak_probability >= 2.0 / 3.0 - 1e-9);
    assert!(assessment.growth_percent > 50.0);
}

#[test]
fn test_trend_and_efficiency_diagnostics() {
    test_setup!();
    let history: Vec<ResourceUsage> = (0..10)
        .map(|i| generators::synthetic_usage(30.0 + i as f64 * 5.0, 50.0, 1_000_000))
        .collect();

    let trends = analyze_resource_trends(&history, 10);
    assert_eq!(trends.cpu.direction, TrendDirection::Increasing);
    assert_eq!(trends.system_memory.direction, TrendDirection::Stable);

    let efficiency = analyze_resource_efficiency(&history);
    assert!(efficiency.overall_score > 0.0);
    assert!(efficiency
        .per_resource
        .iter()
        .any(|entry| entry.resource == "cpu"));
}
