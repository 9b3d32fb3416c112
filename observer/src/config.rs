//! Configuration for the Pulse observer engine
//!
//! Configuration is supplied by the host application as plain structs; the
//! engine never reads files or environment variables itself. All intervals
//! and capacities carry working defaults so `ObserverConfig::default()` is a
//! usable starting point.

use serde::{Deserialize, Serialize};

use crate::error::{ObserverError, Result};

/// Top-level configuration for the observer engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Metric storage configuration
    pub storage: StorageConfig,

    /// Metrics collection configuration
    pub collection: CollectionConfig,

    /// Performance monitoring configuration
    pub monitoring: MonitoringConfig,

    /// Resource tracking configuration
    pub tracking: TrackingConfig,
}

/// Metric storage capacity limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Maximum number of distinct metric series kept in memory
    pub max_series: usize,

    /// Maximum number of data points retained per series
    pub max_points_per_series: usize,
}

/// Metrics collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Seconds between collection cycles
    pub collection_interval_secs: u64,

    /// Bound on the recent-request ring used for throughput calculation
    pub recent_requests_capacity: usize,

    /// Seconds to wait for the collection worker to stop
    pub shutdown_timeout_secs: u64,
}

/// Performance monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Seconds between monitoring cycles
    pub monitoring_interval_secs: u64,

    /// Maximum number of performance snapshots retained
    pub snapshot_history_size: usize,

    /// Maximum number of samples per rolling metric history
    pub metric_history_size: usize,

    /// Register the default cpu/memory/disk/error-rate thresholds on startup
    pub register_default_thresholds: bool,

    /// Seconds to wait for the monitoring worker to stop
    pub shutdown_timeout_secs: u64,
}

/// Resource tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Seconds between resource captures
    pub tracking_interval_secs: u64,

    /// Maximum number of resource usage samples retained
    pub usage_history_size: usize,

    /// Static alert thresholds checked after each capture
    pub thresholds: ResourceThresholds,

    /// Seconds to wait for the tracking worker to stop
    pub shutdown_timeout_secs: u64,
}

/// Static thresholds for resource alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceThresholds {
    /// Overall CPU usage percent
    pub cpu_percent: f64,

    /// System memory usage percent
    pub memory_percent: f64,

    /// Disk usage percent
    pub disk_percent: f64,

    /// Process memory growth percent relative to the first captured sample
    pub memory_growth_percent: f64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            collection: CollectionConfig::default(),
            monitoring: MonitoringConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_series: 1000,
            max_points_per_series: 1000,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            collection_interval_secs: 10,
            recent_requests_capacity: 1024,
            shutdown_timeout_secs: 5,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_secs: 30,
            snapshot_history_size: 500,
            metric_history_size: 500,
            register_default_thresholds: true,
            shutdown_timeout_secs: 5,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_interval_secs: 30,
            usage_history_size: 1000,
            thresholds: ResourceThresholds::default(),
            shutdown_timeout_secs: 5,
        }
    }
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 90.0,
            memory_percent: 90.0,
            disk_percent: 95.0,
            memory_growth_percent: 50.0,
        }
    }
}

impl ObserverConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.max_series == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "storage.max_series".to_string(),
                value: "0".to_string(),
            });
        }

        if self.storage.max_points_per_series == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "storage.max_points_per_series".to_string(),
                value: "0".to_string(),
            });
        }

        if self.collection.collection_interval_secs == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "collection.collection_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.collection.recent_requests_capacity == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "collection.recent_requests_capacity".to_string(),
                value: "0".to_string(),
            });
        }

        if self.monitoring.monitoring_interval_secs == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "monitoring.monitoring_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.monitoring.snapshot_history_size == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "monitoring.snapshot_history_size".to_string(),
                value: "0".to_string(),
            });
        }

        if self.tracking.tracking_interval_secs == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "tracking.tracking_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.tracking.usage_history_size == 0 {
            return Err(ObserverError::InvalidConfig {
                field: "tracking.usage_history_size".to_string(),
                value: "0".to_string(),
            });
        }

        let t = &self.tracking.thresholds;
        for (field, value) in [
            ("tracking.thresholds.cpu_percent", t.cpu_percent),
            ("tracking.thresholds.memory_percent", t.memory_percent),
            ("tracking.thresholds.disk_percent", t.disk_percent),
            (
                "tracking.thresholds.memory_growth_percent",
                t.memory_growth_percent,
            ),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ObserverError::InvalidConfig {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }
}
