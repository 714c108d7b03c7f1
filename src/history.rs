// Fixed-capacity FIFO window of recent metric samples

use crate::models::MetricSample;
use std::collections::VecDeque;

/// Ring of the most recent `capacity` samples for one metric series.
/// Insertion order is chronological and is what clients chart; it is
/// never re-sorted.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    buf: VecDeque<MetricSample>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be > 0");
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity),
        }
    }

    /// O(1) append; evicts the oldest sample first when full.
    pub fn push(&mut self, sample: MetricSample) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(sample);
    }

    /// Samples oldest -> newest, length <= capacity.
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.buf.iter()
    }

    /// Just the percentage values, oldest -> newest (chart series).
    pub fn values(&self) -> Vec<f64> {
        self.buf.iter().map(|s| s.value).collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
