//! Periodic resource usage tracking
//!
//! Captures a wide snapshot of OS and process counters on a fixed interval
//! into a bounded ring, then checks a small set of static alert rules.
//! Readings the OS cannot provide are `None`; absent never means zero.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Networks, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ResourceThresholds, TrackingConfig};
use crate::error::{ObserverError, Result};
use crate::monitor::AlertSeverity;
use crate::resource_analysis::{
    analyze_resource_trends, detect_memory_leaks, LeakAssessment, ResourceTrends,
};

/// Host-supplied runtime statistics.
///
/// The engine cannot see into an embedded scripting runtime or the host's
/// connection pools; a probe fills that gap. Every method defaults to
/// `None`, which reads as "not available" rather than zero.
pub trait RuntimeProbe: Send + Sync {
    /// Open connection count, if the host tracks one
    fn connection_count(&self) -> Option<u64> {
        None
    }

    /// Live object count in an embedded runtime
    fn object_count(&self) -> Option<u64> {
        None
    }

    /// Collection counts per runtime generation
    fn collection_counts(&self) -> Option<Vec<u64>> {
        None
    }
}

/// One full capture of resource counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub timestamp: DateTime<Utc>,

    // CPU
    pub cpu_percent: f64,
    pub per_core_cpu_percent: Vec<f64>,
    pub load_average_1m: f64,
    pub load_average_5m: f64,
    pub load_average_15m: f64,

    // System memory
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub memory_available_bytes: u64,
    pub memory_percent: Option<f64>,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_percent: Option<f64>,

    // Our own process
    pub process_cpu_percent: Option<f64>,
    pub process_memory_bytes: Option<u64>,
    pub process_virtual_memory_bytes: Option<u64>,
    pub process_thread_count: Option<usize>,
    pub process_disk_read_bytes: Option<u64>,
    pub process_disk_written_bytes: Option<u64>,

    // Disk
    pub disk_total_bytes: u64,
    pub disk_free_bytes: u64,
    pub disk_usage_percent: Option<f64>,

    // Network
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub network_rx_packets: u64,
    pub network_tx_packets: u64,

    // System-wide
    pub process_count: usize,
    pub uptime_secs: u64,

    // Host-supplied
    pub connection_count: Option<u64>,
    pub runtime_object_count: Option<u64>,
    pub runtime_collection_counts: Option<Vec<u64>>,
}

/// A static resource rule firing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAlert {
    pub resource_type: String,
    pub metric_name: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Window-filtered summary of tracked resource usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub sample_count: usize,
    pub avg_cpu_percent: Option<f64>,
    pub peak_cpu_percent: Option<f64>,
    pub avg_memory_percent: Option<f64>,
    pub peak_memory_percent: Option<f64>,
    pub avg_process_memory_bytes: Option<f64>,
    pub peak_process_memory_bytes: Option<f64>,
    pub trends: ResourceTrends,
    pub leak_assessment: LeakAssessment,
    pub alert_count: usize,
}

struct TrackerState {
    history: VecDeque<ResourceUsage>,
    // Growth is measured against the very first captured sample.
    first_process_memory: Option<u64>,
    alerts: Vec<ResourceAlert>,
}

struct Sampler {
    system: System,
    disks: Disks,
    networks: Networks,
}

struct TrackerShared {
    state: Mutex<TrackerState>,
    sampler: Mutex<Sampler>,
    probe: Mutex<Option<Arc<dyn RuntimeProbe>>>,
    running: AtomicBool,
    history_size: usize,
    thresholds: ResourceThresholds,
}

/// Periodic capture of resource usage with static alert rules
pub struct ResourceTracker {
    config: TrackingConfig,
    shared: Arc<TrackerShared>,
    shutdown: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                state: Mutex::new(TrackerState {
                    history: VecDeque::new(),
                    first_process_memory: None,
                    alerts: Vec::new(),
                }),
                sampler: Mutex::new(Sampler {
                    system: System::new_all(),
                    disks: Disks::new_with_refreshed_list(),
                    networks: Networks::new_with_refreshed_list(),
                }),
                probe: Mutex::new(None),
                running: AtomicBool::new(false),
                history_size: config.usage_history_size,
                thresholds: config.thresholds.clone(),
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

    /// Supply runtime-collector and connection statistics
    pub fn set_runtime_probe(&self, probe: Arc<dyn RuntimeProbe>) {
        *Self::lock(&self.shared.probe) = Some(probe);
    }

    /// Spawn the tracking loop. Idempotent while running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("resource tracker already running");
            return;
        }

        let token = CancellationToken::new();
        *Self::lock(&self.shutdown) = token.clone();

        let shared = self.shared.clone();
        let interval = Duration::from_secs(self.config.tracking_interval_secs);

        let handle = tokio::spawn(async move {
            tracing::debug!(interval_secs = interval.as_secs(), "tracking loop started");
            loop {
                Self::run_cycle(&shared);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("tracking loop stopped");
        });

        *Self::lock(&self.handle) = Some(handle);
    }

    /// Stop the tracking loop, waiting at most the configured timeout
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
                    component: "resource_tracker",
                    timeout_secs: self.config.shutdown_timeout_secs,
                });
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Capture one sample immediately and run the alert rules on it
    pub fn capture_now(&self) -> ResourceUsage {
        Self::run_cycle(&self.shared)
    }

    fn run_cycle(shared: &TrackerShared) -> ResourceUsage {
        let usage = {
            let mut sampler = Self::lock(&shared.sampler);
            let probe = Self::lock(&shared.probe).clone();
            capture(&mut sampler, probe.as_deref())
        };

        let mut state = Self::lock(&shared.state);
        if state.first_process_memory.is_none() {
            state.first_process_memory = usage.process_memory_bytes;
        }

        if state.history.len() == shared.history_size {
            state.history.pop_front();
        }
        state.history.push_back(usage.clone());

        check_static_rules(&mut state, &usage, &shared.thresholds);
        usage
    }

    /// Most recent capture, if any
    pub fn current_usage(&self) -> Option<ResourceUsage> {
        Self::lock(&self.shared.state).history.back().cloned()
    }

    /// Copy of the retained capture history, oldest first
    pub fn usage_history(&self) -> Vec<ResourceUsage> {
        Self::lock(&self.shared.state)
            .history
            .iter()
            .cloned()
            .collect()
    }

    /// Copy of the retained alert log, oldest first
    pub fn alerts(&self) -> Vec<ResourceAlert> {
        Self::lock(&self.shared.state).alerts.clone()
    }

    /// Summary over captures taken within the past `window`
    pub fn resource_summary(&self, window: Duration) -> ResourceSummary {
        let state = Self::lock(&self.shared.state);
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);

        let recent: Vec<ResourceUsage> = state
            .history
            .iter()
            .filter(|u| u.timestamp >= cutoff)
            .cloned()
            .collect();

        let cpu_values: Vec<f64> = recent.iter().map(|u| u.cpu_percent).collect();
        let memory_values: Vec<f64> = recent.iter().filter_map(|u| u.memory_percent).collect();
        let process_memory: Vec<f64> = recent
            .iter()
            .filter_map(|u| u.process_memory_bytes.map(|b| b as f64))
            .collect();

        let avg = |values: &[f64]| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let peak = |values: &[f64]| {
            values
                .iter()
                .copied()
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        };

        ResourceSummary {
            sample_count: recent.len(),
            avg_cpu_percent: avg(&cpu_values),
            peak_cpu_percent: peak(&cpu_values),
            avg_memory_percent: avg(&memory_values),
            peak_memory_percent: peak(&memory_values),
            avg_process_memory_bytes: avg(&process_memory),
            peak_process_memory_bytes: peak(&process_memory),
            trends: analyze_resource_trends(&recent, recent.len()),
            leak_assessment: detect_memory_leaks(&recent),
            alert_count: state.alerts.len(),
        }
    }
}

fn capture(sampler: &mut Sampler, probe: Option<&dyn RuntimeProbe>) -> ResourceUsage {
    let system = &mut sampler.system;
    system.refresh_cpu();
    system.refresh_memory();
    system.refresh_processes();
    sampler.disks.refresh();
    sampler.networks.refresh();

    let load = System::load_average();
    let memory_total = system.total_memory();
    let memory_used = system.used_memory();
    let swap_total = system.total_swap();
    let swap_used = system.used_swap();

    let process = sysinfo::get_current_pid()
        .ok()
        .and_then(|pid| system.process(pid));
    let (
        process_cpu_percent,
        process_memory_bytes,
        process_virtual_memory_bytes,
        process_thread_count,
        process_disk_read_bytes,
        process_disk_written_bytes,
    ) = match process {
        Some(p) => {
            let disk = p.disk_usage();
            (
                Some(p.cpu_usage() as f64),
                Some(p.memory()),
                Some(p.virtual_memory()),
                thread_count(p),
                Some(disk.total_read_bytes),
                Some(disk.total_written_bytes),
            )
        }
        None => {
            tracing::debug!("own process not visible, process readings absent");
            (None, None, None, None, None, None)
        }
    };

    let disk_total: u64 = sampler.disks.iter().map(|d| d.total_space()).sum();
    let disk_free: u64 = sampler.disks.iter().map(|d| d.available_space()).sum();

    let mut network_rx_bytes = 0;
    let mut network_tx_bytes = 0;
    let mut network_rx_packets = 0;
    let mut network_tx_packets = 0;
    for (_name, data) in sampler.networks.iter() {
        network_rx_bytes += data.total_received();
        network_tx_bytes += data.total_transmitted();
        network_rx_packets += data.total_packets_received();
        network_tx_packets += data.total_packets_transmitted();
    }

    let percent = |used: u64, total: u64| {
        if total > 0 {
            Some(used as f64 / total as f64 * 100.0)
        } else {
            None
        }
    };

    ResourceUsage {
        timestamp: Utc::now(),
        cpu_percent: system.global_cpu_info().cpu_usage() as f64,
        per_core_cpu_percent: system.cpus().iter().map(|c| c.cpu_usage() as f64).collect(),
        load_average_1m: load.one,
        load_average_5m: load.five,
        load_average_15m: load.fifteen,
        memory_total_bytes: memory_total,
        memory_used_bytes: memory_used,
        memory_available_bytes: system.available_memory(),
        memory_percent: percent(memory_used, memory_total),
        swap_total_bytes: swap_total,
        swap_used_bytes: swap_used,
        swap_percent: percent(swap_used, swap_total),
        process_cpu_percent,
        process_memory_bytes,
        process_virtual_memory_bytes,
        process_thread_count,
        process_disk_read_bytes,
        process_disk_written_bytes,
        disk_total_bytes: disk_total,
        disk_free_bytes: disk_free,
        disk_usage_percent: percent(disk_total.saturating_sub(disk_free), disk_total),
        network_rx_bytes,
        network_tx_bytes,
        network_rx_packets,
        network_tx_packets,
        process_count: system.processes().len(),
        uptime_secs: System::uptime(),
        connection_count: probe.and_then(|p| p.connection_count()),
        runtime_object_count: probe.and_then(|p| p.object_count()),
        runtime_collection_counts: probe.and_then(|p| p.collection_counts()),
    }
}

#[cfg(target_os = "linux")]
fn thread_count(process: &sysinfo::Process) -> Option<usize> {
    process.tasks().map(|tasks| tasks.len())
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_process: &sysinfo::Process) -> Option<usize> {
    None
}

fn check_static_rules(
    state: &mut TrackerState,
    usage: &ResourceUsage,
    thresholds: &ResourceThresholds,
) {
    let mut firing: Vec<ResourceAlert> = Vec::new();

    if usage.cpu_percent > thresholds.cpu_percent {
        firing.push(rule_alert(
            "cpu",
            "cpu_percent",
            usage.cpu_percent,
            thresholds.cpu_percent,
        ));
    }

    if let Some(memory_percent) = usage.memory_percent {
        if memory_percent > thresholds.memory_percent {
            firing.push(rule_alert(
                "memory",
                "memory_percent",
                memory_percent,
                thresholds.memory_percent,
            ));
        }
    }

    if let Some(disk_percent) = usage.disk_usage_percent {
        if disk_percent > thresholds.disk_percent {
            firing.push(rule_alert(
                "disk",
                "disk_usage_percent",
                disk_percent,
                thresholds.disk_percent,
            ));
        }
    }

    if let (Some(first), Some(current)) = (state.first_process_memory, usage.process_memory_bytes) {
        if first > 0 {
            let growth = (current as f64 - first as f64) / first as f64 * 100.0;
            if growth > thresholds.memory_growth_percent {
                firing.push(rule_alert(
                    "process_memory",
                    "memory_growth_percent",
                    growth,
                    thresholds.memory_growth_percent,
                ));
            }
        }
    }

    for alert in firing {
        tracing::warn!(
            resource = %alert.resource_type,
            value = alert.current_value,
            threshold = alert.threshold_value,
            "resource alert"
        );
        state.alerts.push(alert);
        if state.alerts.len() > 100 {
            let excess = state.alerts.len() - 50;
            state.alerts.drain(..excess);
        }
    }
}

fn rule_alert(resource: &str, metric: &str, value: f64, threshold: f64) -> ResourceAlert {
    ResourceAlert {
        resource_type: resource.to_string(),
        metric_name: metric.to_string(),
        current_value: value,
        threshold_value: threshold,
        severity: AlertSeverity::Warning,
        message: format!("{}: {:.2} above threshold {:.2}", metric, value, threshold),
        timestamp: Utc::now(),
    }
}
