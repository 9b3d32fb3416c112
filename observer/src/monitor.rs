//! Threshold-based performance monitoring
//!
//! The monitor periodically assembles a snapshot from the latest stored
//! metrics, keeps bounded rolling histories per snapshot field, and
//! evaluates registered thresholds against windowed averages. Alerts are
//! stateful: at most one active alert per (metric, severity), raised once
//! and resolved when the condition clears.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::{analyze_trend, calculate_percentiles, Percentiles, TrendAnalysis};
use crate::callbacks::AlertCallback;
use crate::config::MonitoringConfig;
use crate::error::{ObserverError, Result};
use crate::metrics::MetricsStorage;

/// Point-in-time view of the metrics the monitor watches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub network_rx_per_sec: Option<f64>,
    pub network_tx_per_sec: Option<f64>,
    /// Lifetime mean latency per endpoint, milliseconds
    pub endpoint_latency_ms: BTreeMap<String, f64>,
    pub connection_count: Option<f64>,
    pub error_rate: Option<f64>,
    pub throughput_rps: Option<f64>,
}

/// How a rolling average is compared against a threshold value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdComparison {
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Equal,
}

impl ThresholdComparison {
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterThanOrEqual => value >= threshold,
            Self::LessThanOrEqual => value <= threshold,
            Self::Equal => value == threshold,
        }
    }
}

impl fmt::Display for ThresholdComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
            Self::Equal => "==",
        };
        f.write_str(symbol)
    }
}

/// A registered monitoring rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceThreshold {
    pub metric_name: String,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub comparison: ThresholdComparison,
    /// Number of recent samples averaged before comparing
    pub window_size: usize,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// A raised threshold violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub metric_name: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

/// Window-filtered summary of monitored performance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSummary {
    pub sample_count: usize,
    pub avg_cpu_usage: Option<f64>,
    pub max_cpu_usage: Option<f64>,
    pub cpu_trend: TrendAnalysis,
    pub cpu_percentiles: Option<Percentiles>,
    pub avg_memory_usage: Option<f64>,
    pub max_memory_usage: Option<f64>,
    pub memory_trend: TrendAnalysis,
    pub memory_percentiles: Option<Percentiles>,
    pub active_alert_count: usize,
}

struct MonitorState {
    snapshots: VecDeque<PerformanceSnapshot>,
    histories: HashMap<String, VecDeque<f64>>,
    thresholds: HashMap<String, PerformanceThreshold>,
    active_alerts: HashMap<(String, AlertSeverity), PerformanceAlert>,
}

struct MonitorShared {
    storage: Arc<MetricsStorage>,
    state: Mutex<MonitorState>,
    callbacks: Mutex<Vec<Arc<dyn AlertCallback>>>,
    running: AtomicBool,
    snapshot_history_size: usize,
    metric_history_size: usize,
}

/// Periodic threshold evaluation over collected metrics
pub struct PerformanceMonitor {
    config: MonitoringConfig,
    shared: Arc<MonitorShared>,
    shutdown: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitoringConfig, storage: Arc<MetricsStorage>) -> Self {
        let mut thresholds = HashMap::new();
        if config.register_default_thresholds {
            for threshold in default_thresholds() {
                thresholds.insert(threshold.metric_name.clone(), threshold);
            }
        }

        Self {
            shared: Arc::new(MonitorShared {
                storage,
                state: Mutex::new(MonitorState {
                    snapshots: VecDeque::new(),
                    histories: HashMap::new(),
                    thresholds,
                    active_alerts: HashMap::new(),
                }),
                callbacks: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                snapshot_history_size: config.snapshot_history_size,
                metric_history_size: config.metric_history_size,
            }),
            config,
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

    /// Register or replace a threshold by metric name
    pub fn add_threshold(&self, threshold: PerformanceThreshold) {
        let mut state = Self::lock(&self.shared.state);
        state
            .thresholds
            .insert(threshold.metric_name.clone(), threshold);
    }

    /// Remove a threshold; `false` when no threshold carries this name
    pub fn remove_threshold(&self, metric_name: &str) -> bool {
        let mut state = Self::lock(&self.shared.state);
        if state.thresholds.remove(metric_name).is_some() {
            true
        } else {
            tracing::warn!(metric = metric_name, "no threshold registered under this name");
            false
        }
    }

    /// Register a callback invoked when an alert is raised
    pub fn add_alert_callback(&self, callback: Arc<dyn AlertCallback>) {
        Self::lock(&self.shared.callbacks).push(callback);
    }

    /// Spawn the monitoring loop. Idempotent while running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("performance monitor already running");
            return;
        }

        let token = CancellationToken::new();
        *Self::lock(&self.shutdown) = token.clone();

        let shared = self.shared.clone();
        let interval = Duration::from_secs(self.config.monitoring_interval_secs);

        let handle = tokio::spawn(async move {
            tracing::debug!(interval_secs = interval.as_secs(), "monitoring loop started");
            loop {
                Self::run_cycle(&shared);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("monitoring loop stopped");
        });

        *Self::lock(&self.handle) = Some(handle);
    }

    /// Stop the monitoring loop, waiting at most the configured timeout
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
                    component: "performance_monitor",
                    timeout_secs: self.config.shutdown_timeout_secs,
                });
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Run one snapshot and evaluation cycle immediately
    pub fn evaluate_once(&self) {
        Self::run_cycle(&self.shared);
    }

    fn run_cycle(shared: &MonitorShared) {
        let snapshot = build_snapshot(&shared.storage);
        let created = {
            let mut state = Self::lock(&shared.state);

            if state.snapshots.len() == shared.snapshot_history_size {
                state.snapshots.pop_front();
            }
            state.snapshots.push_back(snapshot.clone());

            for (name, value) in snapshot.scalar_fields() {
                if let Some(value) = value {
                    let history = state
                        .histories
                        .entry(name.to_string())
                        .or_insert_with(VecDeque::new);
                    if history.len() == shared.metric_history_size {
                        history.pop_front();
                    }
                    history.push_back(value);
                }
            }

            Self::evaluate_thresholds(&mut state)
        };

        if created.is_empty() {
            return;
        }
        let callbacks: Vec<Arc<dyn AlertCallback>> = Self::lock(&shared.callbacks).clone();
        for alert in &created {
            tracing::warn!(
                metric = %alert.metric_name,
                severity = %alert.severity,
                value = alert.current_value,
                "performance alert raised"
            );
            for callback in &callbacks {
                if let Err(e) = callback.on_alert(alert) {
                    tracing::warn!(metric = %alert.metric_name, error = %e, "alert callback failed");
                }
            }
        }
    }

    fn evaluate_thresholds(state: &mut MonitorState) -> Vec<PerformanceAlert> {
        let thresholds: Vec<PerformanceThreshold> = state.thresholds.values().cloned().collect();
        let mut created = Vec::new();

        for threshold in thresholds {
            let Some(history) = state.histories.get(&threshold.metric_name) else {
                continue;
            };
            if threshold.window_size == 0 || history.len() < threshold.window_size {
                continue;
            }

            let avg: f64 = history
                .iter()
                .rev()
                .take(threshold.window_size)
                .sum::<f64>()
                / threshold.window_size as f64;

            if threshold.comparison.evaluate(avg, threshold.warning_threshold) {
                let (severity, threshold_value) = if threshold
                    .comparison
                    .evaluate(avg, threshold.critical_threshold)
                {
                    (AlertSeverity::Critical, threshold.critical_threshold)
                } else {
                    (AlertSeverity::Warning, threshold.warning_threshold)
                };

                let key = (threshold.metric_name.clone(), severity);
                if !state.active_alerts.contains_key(&key) {
                    let alert = PerformanceAlert {
                        metric_name: threshold.metric_name.clone(),
                        current_value: avg,
                        threshold_value,
                        severity,
                        message: format!(
                            "{}: rolling average {:.2} {} {:.2}",
                            threshold.metric_name, avg, threshold.comparison, threshold_value
                        ),
                        timestamp: Utc::now(),
                        resolved: false,
                    };
                    state.active_alerts.insert(key, alert.clone());
                    created.push(alert);
                }
            } else {
                for severity in [AlertSeverity::Warning, AlertSeverity::Critical] {
                    let key = (threshold.metric_name.clone(), severity);
                    if let Some(mut alert) = state.active_alerts.remove(&key) {
                        alert.resolved = true;
                        tracing::info!(
                            metric = %alert.metric_name,
                            severity = %alert.severity,
                            "performance alert resolved"
                        );
                    }
                }
            }
        }

        created
    }

    /// Currently active (unresolved) alerts
    pub fn active_alerts(&self) -> Vec<PerformanceAlert> {
        Self::lock(&self.shared.state)
            .active_alerts
            .values()
            .cloned()
            .collect()
    }

    /// Most recent snapshot, if any cycle has run
    pub fn current_snapshot(&self) -> Option<PerformanceSnapshot> {
        Self::lock(&self.shared.state).snapshots.back().cloned()
    }

    /// Registered thresholds
    pub fn thresholds(&self) -> Vec<PerformanceThreshold> {
        Self::lock(&self.shared.state)
            .thresholds
            .values()
            .cloned()
            .collect()
    }

    /// Summary over snapshots taken within the past `window`
    pub fn performance_summary(&self, window: Duration) -> MonitoringSummary {
        let state = Self::lock(&self.shared.state);
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);

        let recent: Vec<&PerformanceSnapshot> = state
            .snapshots
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .collect();

        let cpu_values: Vec<f64> = recent.iter().filter_map(|s| s.cpu_usage).collect();
        let memory_values: Vec<f64> = recent.iter().filter_map(|s| s.memory_usage).collect();

        let avg = |values: &[f64]| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let max = |values: &[f64]| {
            values
                .iter()
                .copied()
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        };

        MonitoringSummary {
            sample_count: recent.len(),
            avg_cpu_usage: avg(&cpu_values),
            max_cpu_usage: max(&cpu_values),
            cpu_trend: analyze_trend(&cpu_values),
            cpu_percentiles: calculate_percentiles(&cpu_values),
            avg_memory_usage: avg(&memory_values),
            max_memory_usage: max(&memory_values),
            memory_trend: analyze_trend(&memory_values),
            memory_percentiles: calculate_percentiles(&memory_values),
            active_alert_count: state.active_alerts.len(),
        }
    }
}

impl PerformanceSnapshot {
    fn scalar_fields(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("cpu_usage", self.cpu_usage),
            ("memory_usage", self.memory_usage),
            ("disk_usage", self.disk_usage),
            ("network_rx_bytes_per_sec", self.network_rx_per_sec),
            ("network_tx_bytes_per_sec", self.network_tx_per_sec),
            ("connection_count", self.connection_count),
            ("error_rate", self.error_rate),
            ("throughput_rps", self.throughput_rps),
        ]
    }
}

fn build_snapshot(storage: &MetricsStorage) -> PerformanceSnapshot {
    let mut endpoint_latency_ms = BTreeMap::new();
    for (id, value) in storage.latest_labeled("app_request_duration_ms") {
        if let Some((_, endpoint)) = id.labels().iter().find(|(k, _)| k == "endpoint") {
            endpoint_latency_ms.insert(endpoint.clone(), value);
        }
    }

    PerformanceSnapshot {
        timestamp: Utc::now(),
        cpu_usage: storage.latest_value("cpu_usage"),
        memory_usage: storage.latest_value("memory_usage"),
        disk_usage: storage.latest_value("disk_usage"),
        network_rx_per_sec: storage.latest_value("network_rx_bytes_per_sec"),
        network_tx_per_sec: storage.latest_value("network_tx_bytes_per_sec"),
        endpoint_latency_ms,
        connection_count: storage.latest_value("connection_count"),
        error_rate: storage.latest_value("error_rate"),
        throughput_rps: storage.latest_value("app_requests_per_sec"),
    }
}

fn default_thresholds() -> Vec<PerformanceThreshold> {
    vec![
        PerformanceThreshold {
            metric_name: "cpu_usage".to_string(),
            warning_threshold: 70.0,
            critical_threshold: 90.0,
            comparison: ThresholdComparison::GreaterThan,
            window_size: 3,
            description: "Overall CPU usage".to_string(),
        },
        PerformanceThreshold {
            metric_name: "memory_usage".to_string(),
            warning_threshold: 80.0,
            critical_threshold: 95.0,
            comparison: ThresholdComparison::GreaterThan,
            window_size: 3,
            description: "System memory usage".to_string(),
        },
        PerformanceThreshold {
            metric_name: "disk_usage".to_string(),
            warning_threshold: 85.0,
            critical_threshold: 95.0,
            comparison: ThresholdComparison::GreaterThan,
            window_size: 3,
            description: "Disk usage".to_string(),
        },
        PerformanceThreshold {
            metric_name: "error_rate".to_string(),
            warning_threshold: 5.0,
            critical_threshold: 10.0,
            comparison: ThresholdComparison::GreaterThan,
            window_size: 3,
            description: "Request error rate".to_string(),
        },
    ]
}
