//! Metric model and in-memory storage for the observer engine
//!
//! Metrics are immutable value objects identified by name plus label set.
//! Storage keeps a bounded history per identity and a bounded number of
//! identities overall, so memory stays flat no matter how long the host runs.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of measurement a metric represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Timer,
    Rate,
}

/// A single observed measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name, e.g. `cpu_usage`
    pub name: String,

    /// Observed value
    pub value: f64,

    /// Kind of measurement
    pub kind: MetricKind,

    /// Dimension labels, e.g. `endpoint=/api/items`
    pub labels: BTreeMap<String, String>,

    /// When the value was observed
    pub timestamp: DateTime<Utc>,

    /// Unit of the value, e.g. `percent`, `bytes`
    pub unit: Option<String>,

    /// Human-readable description
    pub description: Option<String>,
}

impl Metric {
    /// Create a metric observed now, with no labels
    pub fn new(name: impl Into<String>, value: f64, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            value,
            kind,
            labels: BTreeMap::new(),
            timestamp: Utc::now(),
            unit: None,
            description: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Identity of this metric (name + canonical label pairs)
    pub fn id(&self) -> MetricId {
        MetricId::new(&self.name, self.labels.iter())
    }
}

/// Composite series identity: metric name plus sorted label pairs
///
/// Two metrics with the same name and the same labels map to the same series
/// regardless of label insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricId {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricId {
    pub fn new<K, V>(name: &str, labels: impl Iterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(String, String)> = labels
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        pairs.sort();
        Self {
            name: name.to_string(),
            labels: pairs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }
}

/// One (value, timestamp) observation within a series
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricPoint {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Bounded FIFO history of observations for one metric identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSeries {
    id: MetricId,
    kind: MetricKind,
    unit: Option<String>,
    description: Option<String>,
    points: VecDeque<MetricPoint>,
    max_points: usize,
    created_at: DateTime<Utc>,
}

impl MetricSeries {
    fn new(metric: &Metric, max_points: usize) -> Self {
        Self {
            id: metric.id(),
            kind: metric.kind,
            unit: metric.unit.clone(),
            description: metric.description.clone(),
            points: VecDeque::with_capacity(max_points.min(64)),
            max_points,
            created_at: Utc::now(),
        }
    }

    fn push(&mut self, point: MetricPoint) {
        if self.points.len() == self.max_points {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn id(&self) -> &MetricId {
        &self.id
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent observation, if any
    pub fn latest(&self) -> Option<MetricPoint> {
        self.points.back().copied()
    }

    /// All retained values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// All retained points, oldest first
    pub fn points(&self) -> Vec<MetricPoint> {
        self.points.iter().copied().collect()
    }

    /// Mean of the most recent `window` values; `None` when empty
    pub fn average_over(&self, window: usize) -> Option<f64> {
        if self.points.is_empty() || window == 0 {
            return None;
        }
        let take = window.min(self.points.len());
        let sum: f64 = self
            .points
            .iter()
            .rev()
            .take(take)
            .map(|p| p.value)
            .sum();
        Some(sum / take as f64)
    }

    /// Nearest-rank percentile over the most recent `window` values
    pub fn percentile_over(&self, window: usize, percentile: f64) -> Option<f64> {
        if self.points.is_empty() || window == 0 {
            return None;
        }
        let take = window.min(self.points.len());
        let mut values: Vec<f64> = self
            .points
            .iter()
            .rev()
            .take(take)
            .map(|p| p.value)
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let index = ((values.len() as f64 * percentile / 100.0) as usize).min(values.len() - 1);
        Some(values[index])
    }
}

struct StorageInner {
    series: HashMap<MetricId, MetricSeries>,
    // Series creation order; front is the oldest and the first evicted.
    insertion_order: VecDeque<MetricId>,
}

/// Bounded in-memory metric store shared by the engine components
pub struct MetricsStorage {
    inner: Mutex<StorageInner>,
    max_series: usize,
    max_points_per_series: usize,
}

impl MetricsStorage {
    pub fn new(max_series: usize, max_points_per_series: usize) -> Self {
        Self {
            inner: Mutex::new(StorageInner {
                series: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            max_series,
            max_points_per_series,
        }
    }

    // A panic while holding the lock must not take the whole engine down
    // with it; the data is plain values, safe to keep using.
    fn lock(&self) -> MutexGuard<'_, StorageInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append a metric to its series, creating the series on first sight.
    ///
    /// At capacity the oldest-created series is evicted to make room.
    pub fn store(&self, metric: Metric) {
        let id = metric.id();
        let point = MetricPoint {
            value: metric.value,
            timestamp: metric.timestamp,
        };
        let mut inner = self.lock();

        if !inner.series.contains_key(&id) {
            if inner.series.len() == self.max_series {
                if let Some(oldest) = inner.insertion_order.pop_front() {
                    inner.series.remove(&oldest);
                    tracing::debug!(name = oldest.name(), "evicted oldest metric series");
                }
            }
            inner
                .series
                .insert(id.clone(), MetricSeries::new(&metric, self.max_points_per_series));
            inner.insertion_order.push_back(id.clone());
        }

        if let Some(series) = inner.series.get_mut(&id) {
            series.push(point);
        }
    }

    /// Copy of one series, looked up by name and exact label set
    pub fn series(&self, name: &str, labels: &BTreeMap<String, String>) -> Option<MetricSeries> {
        let id = MetricId::new(name, labels.iter());
        self.lock().series.get(&id).cloned()
    }

    /// Copies of every retained series
    pub fn all_series(&self) -> Vec<MetricSeries> {
        self.lock().series.values().cloned().collect()
    }

    /// Latest value of the unlabeled series with this name
    pub fn latest_value(&self, name: &str) -> Option<f64> {
        let id = MetricId::new(name, std::iter::empty::<(&str, &str)>());
        self.lock()
            .series
            .get(&id)
            .and_then(|s| s.latest())
            .map(|p| p.value)
    }

    /// Latest value of every series with this name, labeled or not
    pub fn latest_labeled(&self, name: &str) -> Vec<(MetricId, f64)> {
        self.lock()
            .series
            .values()
            .filter(|s| s.id().name() == name)
            .filter_map(|s| s.latest().map(|p| (s.id().clone(), p.value)))
            .collect()
    }

    /// Number of distinct series
    pub fn len(&self) -> usize {
        self.lock().series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().series.is_empty()
    }

    /// Total number of retained points across all series
    pub fn point_count(&self) -> usize {
        self.lock().series.values().map(|s| s.len()).sum()
    }
}
