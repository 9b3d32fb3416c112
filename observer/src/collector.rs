//! Periodic metrics collection worker
//!
//! `MetricsCollector` merges the OS queries and the application
//! instrumentation into storage on a fixed interval and fans every metric
//! out to registered callbacks. A failed cycle is logged and the loop
//! carries on; a failed callback never affects the other callbacks or the
//! cycle itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app_metrics::ApplicationMetricsCollector;
use crate::callbacks::MetricCallback;
use crate::config::CollectionConfig;
use crate::error::{ObserverError, Result};
use crate::metrics::{Metric, MetricKind, MetricSeries, MetricsStorage};
use crate::system_metrics::SystemMetricsCollector;

/// Point-in-time summary of collection activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub series_count: usize,
    pub point_count: usize,
    pub cycle_count: u64,
    pub last_collection: Option<DateTime<Utc>>,
    pub running: bool,
}

struct Shared {
    storage: Arc<MetricsStorage>,
    system: Arc<SystemMetricsCollector>,
    app: Arc<ApplicationMetricsCollector>,
    callbacks: Mutex<Vec<Arc<dyn MetricCallback>>>,
    running: AtomicBool,
    cycle_count: AtomicU64,
    last_collection: Mutex<Option<DateTime<Utc>>>,
}

/// Orchestrates periodic collection of system and application metrics
pub struct MetricsCollector {
    config: CollectionConfig,
    shared: Arc<Shared>,
    shutdown: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsCollector {
    pub fn new(
        config: CollectionConfig,
        storage: Arc<MetricsStorage>,
        system: Arc<SystemMetricsCollector>,
        app: Arc<ApplicationMetricsCollector>,
    ) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                storage,
                system,
                app,
                callbacks: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                cycle_count: AtomicU64::new(0),
                last_collection: Mutex::new(None),
            }),
            shutdown: Mutex::new(CancellationToken::new()),
            handle: Mutex::new(None),
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a callback invoked for every collected metric
    pub fn add_metric_callback(&self, callback: Arc<dyn MetricCallback>) {
        Self::lock(&self.shared.callbacks).push(callback);
    }

    /// Spawn the collection loop. Idempotent while running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("metrics collector already running");
            return;
        }

        let token = CancellationToken::new();
        *Self::lock(&self.shutdown) = token.clone();

        let shared = self.shared.clone();
        let interval = Duration::from_secs(self.config.collection_interval_secs);

        let handle = tokio::spawn(async move {
            tracing::debug!(interval_secs = interval.as_secs(), "collection loop started");
            loop {
                Self::run_cycle(&shared);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("collection loop stopped");
        });

        *Self::lock(&self.handle) = Some(handle);
    }

    /// Stop the collection loop, waiting at most the configured timeout
    pub async fn stop(&self) -> Result<()> {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        Self::lock(&self.shutdown).cancel();
        let handle = Self::lock(&self.handle).take();
        if let Some(handle) = handle {
            let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
            if tokio::time::timeout(timeout, handle).await.is_err() {
                return Err(ObserverError::ShutdownTimeout {
                    component: "metrics_collector",
                    timeout_secs: self.config.shutdown_timeout_secs,
                });
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    fn run_cycle(shared: &Shared) {
        let mut metrics = Vec::new();
        metrics.extend(shared.system.collect_cpu_metrics());
        metrics.extend(shared.system.collect_memory_metrics());
        metrics.extend(shared.system.collect_disk_metrics());
        metrics.extend(shared.system.collect_network_metrics());
        metrics.extend(shared.app.collect_metrics());

        let count = metrics.len();
        for metric in metrics {
            Self::store_and_notify(shared, metric);
        }

        shared.cycle_count.fetch_add(1, Ordering::SeqCst);
        *Self::lock(&shared.last_collection) = Some(Utc::now());
        tracing::debug!(metric_count = count, "collection cycle complete");
    }

    fn store_and_notify(shared: &Shared, metric: Metric) {
        shared.storage.store(metric.clone());

        // Snapshot under the lock, invoke outside it.
        let callbacks: Vec<Arc<dyn MetricCallback>> =
            Self::lock(&shared.callbacks).clone();
        for callback in callbacks {
            if let Err(e) = callback.on_metric(&metric) {
                tracing::warn!(metric = %metric.name, error = %e, "metric callback failed");
            }
        }
    }

    /// Push an ad-hoc metric through the same store and fan-out path
    pub fn collect_metric(
        &self,
        name: &str,
        value: f64,
        kind: MetricKind,
        labels: &[(&str, &str)],
        unit: Option<&str>,
        description: Option<&str>,
    ) {
        let mut metric = Metric::new(name, value, kind);
        for (key, val) in labels {
            metric = metric.with_label(*key, *val);
        }
        if let Some(unit) = unit {
            metric = metric.with_unit(unit);
        }
        if let Some(description) = description {
            metric = metric.with_description(description);
        }
        Self::store_and_notify(&self.shared, metric);
    }

    /// Summary of collection activity and storage occupancy
    pub fn metrics_summary(&self) -> MetricsSummary {
        MetricsSummary {
            series_count: self.shared.storage.len(),
            point_count: self.shared.storage.point_count(),
            cycle_count: self.shared.cycle_count.load(Ordering::SeqCst),
            last_collection: *Self::lock(&self.shared.last_collection),
            running: self.is_running(),
        }
    }

    /// Copy of one series by name and label set
    pub fn metric_series(
        &self,
        name: &str,
        labels: &std::collections::BTreeMap<String, String>,
    ) -> Option<MetricSeries> {
        self.shared.storage.series(name, labels)
    }

    /// Copies of every retained series
    pub fn all_metrics(&self) -> Vec<MetricSeries> {
        self.shared.storage.all_series()
    }
}
