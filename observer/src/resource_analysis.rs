//! Resource history diagnostics
//!
//! Stateless analysis over captured resource usage: trends, leak
//! likelihood and an efficiency score. All functions take the history by
//! slice and never mutate tracker state.

use serde::{Deserialize, Serialize};

use crate::analysis::{analyze_trend, TrendAnalysis, TrendDirection};
use crate::resource_tracker::ResourceUsage;

/// Trends of the main resources over a recent sample window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTrends {
    /// Number of samples the trends were computed over
    pub window: usize,
    pub cpu: TrendAnalysis,
    pub system_memory: TrendAnalysis,
    pub process_memory: TrendAnalysis,
}

/// Memory leak likelihood derived from the capture history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakAssessment {
    /// Fraction of leak indicators present, 0.0 to 1.0
    pub leak_probability: f64,
    /// Names of the indicators that fired
    pub indicators: Vec<String>,
    /// First-to-last process memory growth, percent
    pub growth_percent: f64,
    pub trend: TrendAnalysis,
    pub recommendation: String,
}

/// Per-resource usage efficiency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEfficiencyEntry {
    pub resource: String,
    pub average: f64,
    pub peak: f64,
    /// Mean of consistency (avg/peak) and inverse usage (100 - avg)
    pub score: f64,
}

/// Efficiency scoring across resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEfficiency {
    pub overall_score: f64,
    pub per_resource: Vec<ResourceEfficiencyEntry>,
    pub recommendations: Vec<String>,
}

/// Trends of cpu, system memory and process memory over the most recent
/// `window` samples. A history shorter than the window carries no trend.
pub fn analyze_resource_trends(history: &[ResourceUsage], window: usize) -> ResourceTrends {
    if window == 0 || history.len() < window {
        let insufficient = analyze_trend(&[]);
        return ResourceTrends {
            window,
            cpu: insufficient,
            system_memory: insufficient,
            process_memory: insufficient,
        };
    }

    let recent = &history[history.len() - window..];
    let cpu: Vec<f64> = recent.iter().map(|u| u.cpu_percent).collect();
    let system_memory: Vec<f64> = recent.iter().filter_map(|u| u.memory_percent).collect();
    let process_memory: Vec<f64> = recent
        .iter()
        .filter_map(|u| u.process_memory_bytes.map(|b| b as f64))
        .collect();

    ResourceTrends {
        window,
        cpu: analyze_trend(&cpu),
        system_memory: analyze_trend(&system_memory),
        process_memory: analyze_trend(&process_memory),
    }
}

/// Assess memory leak likelihood from the capture history.
///
/// Three independent indicators each contribute a third of the
/// probability: a sustained upward process-memory trend, significant
/// first-to-last growth, and rising runtime-collector activity. Fewer
/// than ten samples cannot support an assessment.
pub fn detect_memory_leaks(history: &[ResourceUsage]) -> LeakAssessment {
    const MIN_SAMPLES: usize = 10;

    let memory_values: Vec<f64> = history
        .iter()
        .filter_map(|u| u.process_memory_bytes.map(|b| b as f64))
        .collect();

    if memory_values.len() < MIN_SAMPLES {
        return LeakAssessment {
            leak_probability: 0.0,
            indicators: Vec::new(),
            growth_percent: 0.0,
            trend: analyze_trend(&[]),
            recommendation: "Not enough samples for a leak assessment".to_string(),
        };
    }

    let trend = analyze_trend(&memory_values);
    let mut indicators = Vec::new();

    if trend.direction == TrendDirection::Increasing && trend.correlation > 0.7 {
        indicators.push("sustained_growth".to_string());
    }

    let first = memory_values[0];
    let last = memory_values[memory_values.len() - 1];
    let growth_percent = if first > 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };
    if growth_percent > 50.0 {
        indicators.push("significant_growth".to_string());
    }

    let collector_activity: Vec<f64> = history
        .iter()
        .filter_map(|u| {
            u.runtime_collection_counts
                .as_ref()
                .map(|counts| counts.iter().sum::<u64>() as f64)
        })
        .collect();
    if collector_activity.len() >= 2
        && analyze_trend(&collector_activity).direction == TrendDirection::Increasing
    {
        indicators.push("increasing_collector_activity".to_string());
    }

    let leak_probability = indicators.len() as f64 / 3.0;
    let recommendation = if leak_probability > 0.7 {
        "High leak probability, inspect allocation paths and caches".to_string()
    } else if leak_probability > 0.4 {
        "Possible leak, keep watching process memory".to_string()
    } else {
        "No strong leak indicators".to_string()
    };

    LeakAssessment {
        leak_probability,
        indicators,
        growth_percent,
        trend,
        recommendation,
    }
}

/// Score how efficiently each resource is used.
///
/// Per resource the score averages consistency (average over peak, as a
/// percent) with inverse usage (100 minus the average); the overall score
/// is the mean across resources. Scores under 50 carry a recommendation.
pub fn analyze_resource_efficiency(history: &[ResourceUsage]) -> ResourceEfficiency {
    let series: [(&str, Vec<f64>); 3] = [
        ("cpu", history.iter().map(|u| u.cpu_percent).collect()),
        (
            "memory",
            history.iter().filter_map(|u| u.memory_percent).collect(),
        ),
        (
            "disk",
            history.iter().filter_map(|u| u.disk_usage_percent).collect(),
        ),
    ];

    let mut per_resource = Vec::new();
    let mut recommendations = Vec::new();

    for (resource, values) in series {
        if values.is_empty() {
            continue;
        }
        let average = values.iter().sum::<f64>() / values.len() as f64;
        let peak = values.iter().copied().fold(f64::MIN, f64::max);
        if peak <= 0.0 {
            continue;
        }

        let consistency = average / peak * 100.0;
        let inverse_usage = 100.0 - average;
        let score = (consistency + inverse_usage) / 2.0;

        if score < 50.0 {
            recommendations.push(format!(
                "{} usage is high or spiky (score {:.0}), consider reducing load",
                resource, score
            ));
        }

        per_resource.push(ResourceEfficiencyEntry {
            resource: resource.to_string(),
            average,
            peak,
            score,
        });
    }

    let overall_score = if per_resource.is_empty() {
        100.0
    } else {
        per_resource.iter().map(|e| e.score).sum::<f64>() / per_resource.len() as f64
    };

    ResourceEfficiency {
        overall_score,
        per_resource,
        recommendations,
    }
}
