//! OS-level metric collection
//!
//! Wraps `sysinfo` behind a single lock so CPU usage deltas are computed
//! against the previous refresh and network rates against the previous
//! totals. Readings the OS cannot provide are simply not emitted.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use sysinfo::{Disks, Networks, System};

use crate::metrics::{Metric, MetricKind};

struct NetworkSample {
    rx_bytes: u64,
    tx_bytes: u64,
    taken_at: Instant,
}

struct SystemState {
    system: System,
    disks: Disks,
    networks: Networks,
    last_network: Option<NetworkSample>,
}

/// Collects CPU, memory, disk and network metrics on demand
pub struct SystemMetricsCollector {
    state: Mutex<SystemState>,
}

impl SystemMetricsCollector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SystemState {
                system: System::new_all(),
                disks: Disks::new_with_refreshed_list(),
                networks: Networks::new_with_refreshed_list(),
                last_network: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SystemState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Overall CPU usage, core count and load averages
    pub fn collect_cpu_metrics(&self) -> Vec<Metric> {
        let mut state = self.lock();
        state.system.refresh_cpu();

        let mut metrics = Vec::new();

        // Usage is a delta against the previous refresh; the persistent
        // System makes consecutive cycles comparable.
        let usage = state.system.global_cpu_info().cpu_usage();
        if usage.is_finite() {
            metrics.push(
                Metric::new("cpu_usage", usage as f64, MetricKind::Gauge)
                    .with_unit("percent")
                    .with_description("Overall CPU usage"),
            );
        } else {
            tracing::debug!("cpu usage reading unavailable");
        }

        metrics.push(Metric::new(
            "cpu_count",
            state.system.cpus().len() as f64,
            MetricKind::Gauge,
        ));

        let load = System::load_average();
        metrics.push(Metric::new("load_average_1m", load.one, MetricKind::Gauge));
        metrics.push(Metric::new("load_average_5m", load.five, MetricKind::Gauge));
        metrics.push(Metric::new(
            "load_average_15m",
            load.fifteen,
            MetricKind::Gauge,
        ));

        metrics
    }

    /// System memory and swap
    pub fn collect_memory_metrics(&self) -> Vec<Metric> {
        let mut state = self.lock();
        state.system.refresh_memory();

        let total = state.system.total_memory();
        let used = state.system.used_memory();
        let available = state.system.available_memory();

        let mut metrics = Vec::new();

        if total > 0 {
            metrics.push(
                Metric::new(
                    "memory_usage",
                    used as f64 / total as f64 * 100.0,
                    MetricKind::Gauge,
                )
                .with_unit("percent")
                .with_description("System memory usage"),
            );
        } else {
            tracing::debug!("memory totals unavailable");
        }

        metrics.push(
            Metric::new("memory_used_bytes", used as f64, MetricKind::Gauge).with_unit("bytes"),
        );
        metrics.push(
            Metric::new("memory_total_bytes", total as f64, MetricKind::Gauge).with_unit("bytes"),
        );
        metrics.push(
            Metric::new("memory_available_bytes", available as f64, MetricKind::Gauge)
                .with_unit("bytes"),
        );
        metrics.push(
            Metric::new(
                "swap_used_bytes",
                state.system.used_swap() as f64,
                MetricKind::Gauge,
            )
            .with_unit("bytes"),
        );

        metrics
    }

    /// Disk capacity and usage aggregated across mounted disks
    pub fn collect_disk_metrics(&self) -> Vec<Metric> {
        let mut state = self.lock();
        state.disks.refresh();

        let total: u64 = state.disks.iter().map(|d| d.total_space()).sum();
        let available: u64 = state.disks.iter().map(|d| d.available_space()).sum();

        let mut metrics = Vec::new();

        if total > 0 {
            let used = total - available;
            metrics.push(
                Metric::new(
                    "disk_usage",
                    used as f64 / total as f64 * 100.0,
                    MetricKind::Gauge,
                )
                .with_unit("percent")
                .with_description("Disk usage across mounted disks"),
            );
            metrics.push(
                Metric::new("disk_free_bytes", available as f64, MetricKind::Gauge)
                    .with_unit("bytes"),
            );
            metrics.push(
                Metric::new("disk_total_bytes", total as f64, MetricKind::Gauge)
                    .with_unit("bytes"),
            );
        } else {
            tracing::debug!("no disks reported, skipping disk metrics");
        }

        metrics
    }

    /// Network IO totals plus byte rates derived from the previous sample
    pub fn collect_network_metrics(&self) -> Vec<Metric> {
        let mut state = self.lock();
        state.networks.refresh();

        let mut rx_bytes: u64 = 0;
        let mut tx_bytes: u64 = 0;
        let mut rx_packets: u64 = 0;
        let mut tx_packets: u64 = 0;
        for (_name, data) in state.networks.iter() {
            rx_bytes += data.total_received();
            tx_bytes += data.total_transmitted();
            rx_packets += data.total_packets_received();
            tx_packets += data.total_packets_transmitted();
        }

        let now = Instant::now();
        let mut metrics = vec![
            Metric::new("network_rx_bytes_total", rx_bytes as f64, MetricKind::Counter)
                .with_unit("bytes"),
            Metric::new("network_tx_bytes_total", tx_bytes as f64, MetricKind::Counter)
                .with_unit("bytes"),
            Metric::new(
                "network_rx_packets_total",
                rx_packets as f64,
                MetricKind::Counter,
            ),
            Metric::new(
                "network_tx_packets_total",
                tx_packets as f64,
                MetricKind::Counter,
            ),
        ];

        // Rates need a previous sample; the first call only primes it.
        if let Some(last) = &state.last_network {
            let elapsed = now.duration_since(last.taken_at).as_secs_f64();
            if elapsed > 0.0 {
                let rx_rate = rx_bytes.saturating_sub(last.rx_bytes) as f64 / elapsed;
                let tx_rate = tx_bytes.saturating_sub(last.tx_bytes) as f64 / elapsed;
                metrics.push(
                    Metric::new("network_rx_bytes_per_sec", rx_rate, MetricKind::Rate)
                        .with_unit("bytes/s"),
                );
                metrics.push(
                    Metric::new("network_tx_bytes_per_sec", tx_rate, MetricKind::Rate)
                        .with_unit("bytes/s"),
                );
            }
        } else {
            tracing::debug!("first network sample, rates available next cycle");
        }

        state.last_network = Some(NetworkSample {
            rx_bytes,
            tx_bytes,
            taken_at: now,
        });

        metrics
    }
}

impl Default for SystemMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
