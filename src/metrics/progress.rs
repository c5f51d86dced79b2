//! Benchmark progress carried by `benchmark_progress` frames.

use serde::Serialize;
use serde_json::{Map, Value};

use super::update::{lenient_f64, lenient_u64};

/// Latest known progress of the running benchmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchmarkProgress {
    pub completed: u64,
    pub total: u64,
    /// Tokens per second observed by the benchmark driver.
    pub current_tps: f64,
    /// Seconds until completion as estimated by the server.
    pub estimated_time_remaining: f64,
}

impl BenchmarkProgress {
    /// Completion in percent, 0 when the total is unknown.
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }

    /// Merge a partial progress update. Absent fields keep their value.
    pub fn merge(&mut self, update: &ProgressUpdate) {
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(total) = update.total {
            self.total = total;
        }
        if let Some(tps) = update.current_tps {
            self.current_tps = tps;
        }
        if let Some(eta) = update.estimated_time_remaining {
            self.estimated_time_remaining = eta;
        }
    }
}

/// Partial progress update decoded from a frame payload.
///
/// Both the snake_case keys and the dashboard's camelCase keys
/// (`currentTps`, `estimatedTimeRemaining`) are accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub completed: Option<u64>,
    pub total: Option<u64>,
    pub current_tps: Option<f64>,
    pub estimated_time_remaining: Option<f64>,
}

impl ProgressUpdate {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            completed: lenient_u64(obj, "completed"),
            total: lenient_u64(obj, "total"),
            current_tps: lenient_f64(obj, "current_tps").or_else(|| lenient_f64(obj, "currentTps")),
            estimated_time_remaining: lenient_f64(obj, "estimated_time_remaining")
                .or_else(|| lenient_f64(obj, "estimatedTimeRemaining")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_none()
            && self.total.is_none()
            && self.current_tps.is_none()
            && self.estimated_time_remaining.is_none()
    }
}
