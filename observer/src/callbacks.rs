//! Host callback interfaces
//!
//! Hosts register observers for collected metrics and raised alerts. The
//! interfaces are typed traits rather than bare closures so implementations
//! are checked at compile time; plain closures still work through the
//! blanket impls. Callback errors are reported to the engine, which logs
//! them and moves on.

use crate::metrics::Metric;
use crate::monitor::PerformanceAlert;

/// Receives every metric as it is collected
pub trait MetricCallback: Send + Sync {
    fn on_metric(&self, metric: &Metric) -> anyhow::Result<()>;
}

/// Receives every performance alert as it is raised
pub trait AlertCallback: Send + Sync {
    fn on_alert(&self, alert: &PerformanceAlert) -> anyhow::Result<()>;
}

impl<F> MetricCallback for F
where
    F: Fn(&Metric) -> anyhow::Result<()> + Send + Sync,
{
    fn on_metric(&self, metric: &Metric) -> anyhow::Result<()> {
        self(metric)
    }
}

impl<F> AlertCallback for F
where
    F: Fn(&PerformanceAlert) -> anyhow::Result<()> + Send + Sync,
{
    fn on_alert(&self, alert: &PerformanceAlert) -> anyhow::Result<()> {
        self(alert)
    }
}
