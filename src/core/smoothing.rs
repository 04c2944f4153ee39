//! Moving-average smoothing of the per-cycle signal.
//!
//! One filter is kept per channel (CT and BRI). The very first sample fills
//! the whole buffer, so output starts at the first value instead of ramping up
//! from zero. Afterwards each sample replaces the oldest one and the mean of
//! the buffer is returned.

/// Fixed-depth ring buffer returning the mean of the last `depth` samples.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    samples: Vec<f64>,
    index: usize,
    warm: bool,
}

impl MovingAverage {
    /// Create a filter of the given depth; a depth of zero is treated as one.
    pub fn new(depth: usize) -> Self {
        Self {
            samples: vec![0.0; depth.max(1)],
            index: 0,
            warm: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.samples.len()
    }

    /// Whether the filter has received at least one sample.
    pub fn is_warm(&self) -> bool {
        self.warm
    }

    /// Record `value` and return the updated mean.
    pub fn sample(&mut self, value: f64) -> f64 {
        if !self.warm {
            self.samples.fill(value);
            self.warm = true;
        } else {
            self.samples[self.index] = value;
        }
        self.index = (self.index + 1) % self.samples.len();

        self.mean()
    }

    /// Mean of the buffer; `0.0` before the first sample.
    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}
