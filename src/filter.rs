//! Smoothing of noisy per-frame measurements.

mod ema;
mod moving;

pub use ema::Ema;
pub use moving::MovingAvg;

/// A filter for values of type `V`.
pub trait Filter<V> {
    /// Adds a new value to the filter, returning the filtered value.
    fn push(&mut self, value: V) -> V;

    /// Returns the most recent filtered value, or `None` if nothing has been pushed since
    /// construction or the last [`Filter::reset`].
    fn current(&self) -> Option<V>;

    /// Resets the accumulated history and state of the filter to be identical to the state just
    /// after construction.
    fn reset(&mut self);
}
