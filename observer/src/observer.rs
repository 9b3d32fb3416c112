//! Engine facade
//!
//! `Observer` owns the storage and the three periodic components, wired
//! per instance from a validated configuration. Hosts that only need one
//! component can still reach it through the accessors; `start_all` and
//! `stop_all` drive the whole engine at once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::app_metrics::ApplicationMetricsCollector;
use crate::collector::MetricsCollector;
use crate::config::ObserverConfig;
use crate::error::Result;
use crate::metrics::MetricsStorage;
use crate::monitor::PerformanceMonitor;
use crate::resource_tracker::{ResourceTracker, RuntimeProbe};
use crate::system_metrics::SystemMetricsCollector;

/// Window used by `export_summary_json` for the performance and resource
/// summaries.
const EXPORT_SUMMARY_WINDOW: Duration = Duration::from_secs(300);

/// Owns and wires the collection, monitoring and tracking components
pub struct Observer {
    storage: Arc<MetricsStorage>,
    app: Arc<ApplicationMetricsCollector>,
    collector: MetricsCollector,
    monitor: PerformanceMonitor,
    tracker: ResourceTracker,
}

impl Observer {
    /// Build the engine from a configuration, validating it first
    pub fn new(config: ObserverConfig) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(MetricsStorage::new(
            config.storage.max_series,
            config.storage.max_points_per_series,
        ));
        let system = Arc::new(SystemMetricsCollector::new());
        let app = Arc::new(ApplicationMetricsCollector::new(
            config.collection.recent_requests_capacity,
        ));

        let collector = MetricsCollector::new(
            config.collection.clone(),
            storage.clone(),
            system,
            app.clone(),
        );
        let monitor = PerformanceMonitor::new(config.monitoring.clone(), storage.clone());
        let tracker = ResourceTracker::new(config.tracking.clone());

        Ok(Self {
            storage,
            app,
            collector,
            monitor,
            tracker,
        })
    }

    /// Build the engine with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(ObserverConfig::default())
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Application-side instrumentation handle, shared with the collector
    pub fn app_metrics(&self) -> &Arc<ApplicationMetricsCollector> {
        &self.app
    }

    pub fn storage(&self) -> &Arc<MetricsStorage> {
        &self.storage
    }

    /// Supply host runtime statistics to the resource tracker
    pub fn set_runtime_probe(&self, probe: Arc<dyn RuntimeProbe>) {
        self.tracker.set_runtime_probe(probe);
    }

    /// Start all three periodic loops
    pub fn start_all(&self) {
        tracing::info!("starting observer engine");
        self.collector.start();
        self.monitor.start();
        self.tracker.start();
    }

    /// Stop all three loops. Every component is asked to stop even when
    /// an earlier one times out; the first error is returned.
    pub async fn stop_all(&self) -> Result<()> {
        tracing::info!("stopping observer engine");
        let results = [
            self.collector.stop().await,
            self.monitor.stop().await,
            self.tracker.stop().await,
        ];
        for result in results {
            result?;
        }
        Ok(())
    }

    /// Combined engine state as pretty-printed JSON
    pub fn export_summary_json(&self) -> Result<String> {
        let combined = serde_json::json!({
            "metrics": self.collector.metrics_summary(),
            "performance": self.monitor.performance_summary(EXPORT_SUMMARY_WINDOW),
            "resources": self.tracker.resource_summary(EXPORT_SUMMARY_WINDOW),
            "timestamp": Utc::now().timestamp(),
        });
        Ok(serde_json::to_string_pretty(&combined)?)
    }
}
