use std::collections::VecDeque;

/// One accepted breathing-rate reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePoint {
    /// Capture time in nanoseconds since the Unix epoch
    pub time: u64,
    pub rate: f64,
}

/// Fixed-capacity FIFO buffer. Index 0 is the oldest element.
///
/// Appending to a full window evicts exactly one element, the oldest.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    /// Replace the contents with `capacity` copies of `value`
    pub fn fill(&mut self, value: T) {
        self.data.clear();
        self.data.resize(self.capacity, value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.data.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Copy of the contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

pub trait RateSliceExt {
    fn min_max_time(&self) -> Option<(u64, u64)>;
    fn min_max_rate(&self) -> Option<(f64, f64)>;
}

impl RateSliceExt for [RatePoint] {
    fn min_max_time(&self) -> Option<(u64, u64)> {
        self.iter().fold(None, |acc, point| match acc {
            None => Some((point.time, point.time)),
            Some((min, max)) => Some((min.min(point.time), max.max(point.time))),
        })
    }

    fn min_max_rate(&self) -> Option<(f64, f64)> {
        self.iter().fold(None, |acc, point| match acc {
            None => Some((point.rate, point.rate)),
            Some((min, max)) => Some((min.min(point.rate), max.max(point.rate))),
        })
    }
}
