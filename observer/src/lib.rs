//! Pulse observer engine library
//!
//! This library provides the performance observability engine for the
//! Pulse desktop utility: periodic metrics collection over bounded
//! in-memory storage, threshold-based performance monitoring with
//! stateful alerts, and resource-history tracking with statistical
//! diagnostics.

pub mod analysis;
pub mod app_metrics;
pub mod callbacks;
pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod observer;
pub mod resource_analysis;
pub mod resource_tracker;
pub mod system_metrics;

// Re-export commonly used types
pub use analysis::{
    analyze_trend, calculate_percentiles, detect_anomalies, Percentiles, TrendAnalysis,
    TrendDirection,
};
pub use app_metrics::{ApplicationMetricsCollector, TimerGuard};
pub use callbacks::{AlertCallback, MetricCallback};
pub use collector::{MetricsCollector, MetricsSummary};
pub use config::{
    CollectionConfig, MonitoringConfig, ObserverConfig, ResourceThresholds, StorageConfig,
    TrackingConfig,
};
pub use error::{ObserverError, Result};
pub use metrics::{Metric, MetricId, MetricKind, MetricPoint, MetricSeries, MetricsStorage};
pub use monitor::{
    AlertSeverity, MonitoringSummary, PerformanceAlert, PerformanceMonitor, PerformanceSnapshot,
    PerformanceThreshold, ThresholdComparison,
};
pub use observer::Observer;
pub use resource_analysis::{
    analyze_resource_efficiency, analyze_resource_trends, detect_memory_leaks, LeakAssessment,
    ResourceEfficiency, ResourceEfficiencyEntry, ResourceTrends,
};
pub use resource_tracker::{
    ResourceAlert, ResourceSummary, ResourceTracker, ResourceUsage, RuntimeProbe,
};
pub use system_metrics::SystemMetricsCollector;
