//! Bounded throughput history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of samples kept per subscription.
pub const DEFAULT_HISTORY_CAPACITY: usize = 120;

/// One point of the throughput chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSample {
    pub timestamp: DateTime<Utc>,
    pub tokens_per_second: Option<f64>,
    pub latency: Option<f64>,
}

/// Fixed-capacity FIFO of throughput samples. Oldest samples are evicted
/// first once the capacity is reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct History {
    #[serde(skip)]
    capacity: usize,
    samples: VecDeque<ThroughputSample>,
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: ThroughputSample) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Replace every sample with `samples`, given oldest to newest. Only the
    /// newest `capacity` are kept.
    pub fn replace(&mut self, samples: &[ThroughputSample]) {
        let skip = samples.len().saturating_sub(self.capacity);
        self.samples.clear();
        self.samples.extend(samples[skip..].iter().cloned());
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&ThroughputSample> {
        self.samples.back()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ThroughputSample> {
        self.samples.iter()
    }

    /// Mean tokens/sec over the retained window.
    pub fn average_tokens_per_second(&self) -> Option<f64> {
        mean(self.samples.iter().filter_map(|s| s.tokens_per_second))
    }

    /// Peak tokens/sec over the retained window.
    pub fn peak_tokens_per_second(&self) -> Option<f64> {
        self.samples
            .iter()
            .filter_map(|s| s.tokens_per_second)
            .fold(None, |peak: Option<f64>, v| Some(peak.map_or(v, |p| p.max(v))))
    }

    pub fn average_latency(&self) -> Option<f64> {
        mean(self.samples.iter().filter_map(|s| s.latency))
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secs: i64, tps: f64) -> ThroughputSample {
        ThroughputSample {
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            tokens_per_second: Some(tps),
            latency: None,
        }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = History::with_capacity(3);
        for i in 0..5 {
            history.push(sample(i, i as f64 * 10.0));
        }
        assert_eq!(history.len(), 3);
        let tps: Vec<f64> = history.iter().filter_map(|s| s.tokens_per_second).collect();
        assert_eq!(tps, vec![20.0, 30.0, 40.0]);
        assert_eq!(history.latest().unwrap().tokens_per_second, Some(40.0));
    }

    #[test]
    fn test_replace_keeps_newest() {
        let mut history = History::with_capacity(3);
        history.push(sample(0, 999.0));

        let series: Vec<_> = (1..=5).map(|i| sample(i, i as f64)).collect();
        history.replace(&series);
        let tps: Vec<f64> = history.iter().filter_map(|s| s.tokens_per_second).collect();
        assert_eq!(tps, vec![3.0, 4.0, 5.0]);

        history.replace(&[]);
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = History::with_capacity(0);
        history.push(sample(1, 1.0));
        assert!(history.is_empty());
    }

    #[test]
    fn test_aggregates() {
        let mut history = History::with_capacity(10);
        assert!(history.average_tokens_per_second().is_none());
        history.push(sample(1, 100.0));
        history.push(sample(2, 300.0));
        assert_eq!(history.average_tokens_per_second(), Some(200.0));
        assert_eq!(history.peak_tokens_per_second(), Some(300.0));
        assert!(history.average_latency().is_none());
    }
}
