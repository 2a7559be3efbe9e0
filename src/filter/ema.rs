//! Exponential Moving Average.

use super::Filter;

/// Exponential Moving Average: a weighted moving average whose weights decrease exponentially.
///
/// This is a tunable IIR filter.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f32,
    last: Option<f32>,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// `alpha` is the weight of each new value and must be between 0.0 and 1.0. Values close to
    /// 1.0 follow the input quickly, values close to 0.0 smooth more strongly.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is outside of `0.0..=1.0`.
    pub fn new(alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha));
        Self { alpha, last: None }
    }
}

impl Filter<f32> for Ema {
    fn push(&mut self, value: f32) -> f32 {
        let avg = match self.last {
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
            None => value,
        };
        self.last = Some(avg);
        avg
    }

    fn current(&self) -> Option<f32> {
        self.last
    }

    fn reset(&mut self) {
        self.last = None;
    }
}
