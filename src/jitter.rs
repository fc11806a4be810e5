use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of cosmetic randomness: notification spacing and suggestion confidence.
pub trait Jitter: Send + Sync {
    /// A value in `[0, upper)`; `upper == 0` yields 0.
    fn sample(&self, upper: u64) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        rand::rng().random_range(0..upper)
    }
}

/// Replays a fixed sequence, wrapping around. Values are reduced modulo `upper`.
#[derive(Debug)]
pub struct SequenceJitter {
    values: Vec<u64>,
    cursor: AtomicUsize,
}

impl SequenceJitter {
    pub fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Jitter for SequenceJitter {
    fn sample(&self, upper: u64) -> u64 {
        if upper == 0 || self.values.is_empty() {
            return 0;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.values.len();
        self.values[index] % upper
    }
}
