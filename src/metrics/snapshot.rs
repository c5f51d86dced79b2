//! The merged telemetry snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::{History, ThroughputSample};
use super::progress::{BenchmarkProgress, ProgressUpdate};
use super::update::MetricsUpdate;

/// One accelerator's reading within a sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuReading {
    /// Utilization in percent.
    pub gpu_utilization: f64,
    /// Memory in use, MiB.
    pub gpu_memory_used: f64,
    /// Total memory, MiB.
    pub gpu_memory_total: f64,
    /// Temperature in °C.
    pub gpu_temp: f64,
    /// Power draw in watts.
    pub power_draw: f64,
}

impl GpuReading {
    pub fn memory_used_percent(&self) -> Option<f64> {
        percent(self.gpu_memory_used, self.gpu_memory_total)
    }
}

/// Per-accelerator benchmark aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuStats {
    pub name: String,
    #[serde(alias = "avgTps")]
    pub avg_tps: f64,
    #[serde(alias = "powerEfficiency")]
    pub power_efficiency: f64,
}

/// The most recently known full state of telemetry for one subscription.
///
/// Every scalar is `None` until a frame sets it. Derived aggregates are
/// computed by the accessor methods and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Incremented once per applied non-empty update.
    pub version: u64,
    pub gpu_metrics: Vec<GpuReading>,
    pub gpu_stats: Vec<GpuStats>,
    pub cpu_usage: Option<f64>,
    pub memory_used: Option<f64>,
    pub memory_total: Option<f64>,
    pub gpu_utilization: Option<f64>,
    pub gpu_memory_used: Option<f64>,
    pub gpu_memory_total: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub uptime: Option<f64>,
    pub tokens_per_second: Option<f64>,
    pub requests_per_second: Option<f64>,
    pub latency: Option<f64>,
    pub power_draw: Option<f64>,
    pub power_efficiency: Option<f64>,
    pub tokens_per_watt: Option<f64>,
    pub pcie_throughput: Option<f64>,
    pub gpu_count: Option<u32>,
    pub ip_address: Option<String>,
    pub benchmark_counts: BTreeMap<String, u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub progress: Option<BenchmarkProgress>,
    /// Local throughput retention, maintained by the stream driver.
    pub history: History,
}

macro_rules! overwrite_present {
    ($dst:expr, $src:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$src.$field {
                $dst.$field = Some(value.clone());
            }
        )+
    };
}

impl MetricsSnapshot {
    /// Empty snapshot retaining at most `capacity` history samples.
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            history: History::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Merge `update` into this snapshot in place.
    ///
    /// Present fields overwrite, absent fields are left untouched, and the
    /// accelerator lists are replaced wholesale since accelerator count can
    /// change between samples.
    pub fn merge(&mut self, update: &MetricsUpdate) {
        if update.is_empty() {
            return;
        }
        if let Some(readings) = &update.gpu_metrics {
            self.gpu_metrics = readings.clone();
        }
        if let Some(stats) = &update.gpu_stats {
            self.gpu_stats = stats.clone();
        }
        if let Some(counts) = &update.benchmark_counts {
            self.benchmark_counts = counts.clone();
        }
        if let Some(series) = &update.historical {
            self.history.replace(series);
        }
        overwrite_present!(self, update;
            cpu_usage,
            memory_used,
            memory_total,
            gpu_utilization,
            gpu_memory_used,
            gpu_memory_total,
            gpu_temp,
            uptime,
            tokens_per_second,
            requests_per_second,
            latency,
            power_draw,
            power_efficiency,
            tokens_per_watt,
            pcie_throughput,
            gpu_count,
            ip_address,
            timestamp,
        );
        self.version += 1;
    }

    /// Merge a partial progress update, creating the progress record on
    /// first use.
    pub fn merge_progress(&mut self, update: &ProgressUpdate) {
        if update.is_empty() {
            return;
        }
        self.progress
            .get_or_insert_with(BenchmarkProgress::default)
            .merge(update);
        self.version += 1;
    }

    /// Append a history sample if `update` carried throughput or latency.
    ///
    /// Uses the merged values so a frame that only sets latency still charts
    /// the last known tokens/sec. Updates that carry a server series are
    /// already reflected by `merge`.
    pub fn record_sample(&mut self, update: &MetricsUpdate, now: DateTime<Utc>) {
        if !update.has_throughput_sample() || update.historical.is_some() {
            return;
        }
        self.history.push(ThroughputSample {
            timestamp: update.timestamp.unwrap_or(now),
            tokens_per_second: self.tokens_per_second,
            latency: self.latency,
        });
    }

    pub fn memory_used_percent(&self) -> Option<f64> {
        percent(self.memory_used?, self.memory_total?)
    }

    pub fn gpu_memory_used_percent(&self) -> Option<f64> {
        percent(self.gpu_memory_used?, self.gpu_memory_total?)
    }

    /// Mean utilization across the current accelerator readings.
    pub fn average_gpu_utilization(&self) -> Option<f64> {
        if self.gpu_metrics.is_empty() {
            return None;
        }
        let sum: f64 = self.gpu_metrics.iter().map(|g| g.gpu_utilization).sum();
        Some(sum / self.gpu_metrics.len() as f64)
    }

    pub fn total_power_draw(&self) -> Option<f64> {
        if self.gpu_metrics.is_empty() {
            return self.power_draw;
        }
        Some(self.gpu_metrics.iter().map(|g| g.power_draw).sum())
    }

    pub fn peak_gpu_temp(&self) -> Option<f64> {
        self.gpu_metrics
            .iter()
            .map(|g| g.gpu_temp)
            .fold(None, |peak: Option<f64>, t| Some(peak.map_or(t, |p| p.max(t))))
            .or(self.gpu_temp)
    }

    pub fn total_benchmark_runs(&self) -> u64 {
        self.benchmark_counts.values().sum()
    }

    /// Number of accelerators, preferring the reported count.
    pub fn accelerator_count(&self) -> usize {
        self.gpu_count
            .map(|n| n as usize)
            .unwrap_or(self.gpu_metrics.len())
    }
}

/// Pure merge: returns `current` with `update` applied.
pub fn apply_update(current: &MetricsSnapshot, update: &MetricsUpdate) -> MetricsSnapshot {
    let mut next = current.clone();
    next.merge(update);
    next
}

fn percent(used: f64, total: f64) -> Option<f64> {
    (total > 0.0).then(|| used / total * 100.0)
}
