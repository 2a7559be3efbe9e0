//! Moving averages.

use std::collections::VecDeque;

use super::Filter;

/// Moving Average over a fixed window of values (FIR filter).
///
/// All values in the window are weighted equally. Until the window has filled up, the average is
/// taken over the values seen so far.
#[derive(Debug, Clone)]
pub struct MovingAvg {
    window: VecDeque<f32>,
    /// Max. number of values to keep in the window.
    window_len: usize,
}

impl MovingAvg {
    /// Creates a moving average over the last `window_len` values.
    ///
    /// # Panics
    ///
    /// Panics if `window_len` is 0.
    pub fn new(window_len: usize) -> Self {
        assert!(window_len > 0, "moving average window must not be empty");
        Self {
            window: VecDeque::with_capacity(window_len),
            window_len,
        }
    }

    /// Returns `true` once `window_len` values have been pushed.
    pub fn is_full(&self) -> bool {
        self.window.len() == self.window_len
    }
}

impl Filter<f32> for MovingAvg {
    fn push(&mut self, value: f32) -> f32 {
        if self.is_full() {
            self.window.pop_front();
        }
        self.window.push_back(value);

        // Window is never empty here.
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }

    fn current(&self) -> Option<f32> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.window.iter().sum::<f32>() / self.window.len() as f32)
        }
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}
