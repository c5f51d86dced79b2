//! Partial metrics updates and lenient payload decoding.
//!
//! Each recognized field is decoded on its own. A field of the wrong type, a
//! JSON `null`, or a list containing a malformed reading is treated as absent,
//! so one bad field never rejects the rest of the sample.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::history::ThroughputSample;
use super::snapshot::{GpuReading, GpuStats};

/// Epoch values above this are taken as milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// A partial telemetry reading. `None` means "not present in this frame".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsUpdate {
    pub gpu_metrics: Option<Vec<GpuReading>>,
    pub gpu_stats: Option<Vec<GpuStats>>,
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
    pub benchmark_counts: Option<BTreeMap<String, u64>>,
    /// Server-side throughput series, oldest first.
    pub historical: Option<Vec<ThroughputSample>>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl MetricsUpdate {
    /// Decode the recognized fields of a `metrics_update` payload.
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            gpu_metrics: lenient(obj, "gpu_metrics"),
            gpu_stats: lenient(obj, "gpu_stats"),
            cpu_usage: lenient_f64(obj, "cpu_usage"),
            memory_used: lenient_f64(obj, "memory_used"),
            memory_total: lenient_f64(obj, "memory_total"),
            gpu_utilization: lenient_f64(obj, "gpu_utilization"),
            gpu_memory_used: lenient_f64(obj, "gpu_memory_used")
                .or_else(|| lenient_f64(obj, "gpu_memory")),
            gpu_memory_total: lenient_f64(obj, "gpu_memory_total"),
            gpu_temp: lenient_f64(obj, "gpu_temp"),
            uptime: lenient_f64(obj, "uptime"),
            tokens_per_second: lenient_f64(obj, "tokens_per_second"),
            requests_per_second: lenient_f64(obj, "requests_per_second"),
            latency: lenient_f64(obj, "latency"),
            power_draw: lenient_f64(obj, "power_draw"),
            power_efficiency: lenient_f64(obj, "power_efficiency"),
            tokens_per_watt: lenient_f64(obj, "tokens_per_watt"),
            pcie_throughput: lenient_f64(obj, "pcie_throughput"),
            gpu_count: lenient_u64(obj, "gpu_count").and_then(|n| u32::try_from(n).ok()),
            ip_address: lenient(obj, "ip_address"),
            benchmark_counts: lenient(obj, "benchmark_counts"),
            historical: historical(obj),
            timestamp: obj.get("timestamp").and_then(parse_timestamp),
        }
    }

    /// True when no recognized field is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when the update carries a throughput or latency sample.
    pub fn has_throughput_sample(&self) -> bool {
        self.tokens_per_second.is_some() || self.latency.is_some()
    }
}

/// Decode `key` as `T`, treating missing, `null`, and mistyped values as absent.
pub(crate) fn lenient<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    let value = obj.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            debug!(field = key, error = %e, "ignoring malformed telemetry field");
            None
        }
    }
}

/// Decode the `historical` series element by element. Entries that are not
/// objects or lack a parseable timestamp are skipped.
fn historical(obj: &Map<String, Value>) -> Option<Vec<ThroughputSample>> {
    let entries = obj.get("historical")?.as_array()?;
    let samples: Vec<ThroughputSample> = entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.as_object()?;
            Some(ThroughputSample {
                timestamp: entry.get("timestamp").and_then(parse_timestamp)?,
                tokens_per_second: lenient_f64(entry, "tokens_per_second"),
                latency: lenient_f64(entry, "latency"),
            })
        })
        .collect();
    if samples.len() < entries.len() {
        debug!(
            dropped = entries.len() - samples.len(),
            "ignoring malformed historical samples"
        );
    }
    Some(samples)
}

pub(crate) fn lenient_f64(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key)?.as_f64().filter(|v| v.is_finite())
}

pub(crate) fn lenient_u64(obj: &Map<String, Value>, key: &str) -> Option<u64> {
    let value = obj.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    })
}

/// Parse a frame timestamp.
///
/// Accepts epoch seconds or milliseconds, RFC 3339 strings, and ISO-8601
/// strings without an offset (taken as UTC).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64().filter(|v| v.is_finite() && *v >= 0.0)?;
            let millis = if raw > EPOCH_MILLIS_THRESHOLD {
                raw
            } else {
                raw * 1000.0
            };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        _ => None,
    }
}
