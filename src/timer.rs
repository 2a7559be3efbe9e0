//! Per-stage timing and frame rate logging.

use std::{
    cell::RefCell,
    fmt,
    time::{Duration, Instant},
};

use itertools::Itertools;

use crate::filter::{Ema, Filter};

const EMA_ALPHA: f32 = 0.3;

/// Measures how long an operation takes, smoothed over recent invocations.
///
/// Displaying a timer with `{}` prints the smoothed time and the number of measurements taken
/// since it was last displayed, then starts a new reporting period.
pub struct Timer {
    name: &'static str,
    state: RefCell<State>,
}

struct State {
    ema: Ema,
    count: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: RefCell::new(State {
                ema: Ema::new(EMA_ALPHA),
                count: 0,
            }),
        }
    }

    /// Invokes `f`, measuring and recording the time it takes.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        f()
    }

    /// Starts timing an operation. The measurement is recorded when the guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&self, elapsed: Duration) {
        let mut state = self.state.borrow_mut();
        state.ema.push(elapsed.as_secs_f32());
        state.count += 1;
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = self.state.borrow_mut();
        let avg_ms = state.ema.current().unwrap_or(0.0) * 1000.0;
        let count = std::mem::replace(&mut state.count, 0);
        state.ema.reset();

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Logs frames per second, once per second, at *debug* level.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame, logging the frame rate and the `timers` if a second has passed.
    pub fn tick_with<'a>(&mut self, timers: impl IntoIterator<Item = &'a Timer>) {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return;
        }

        let timers = timers.into_iter().join(", ");
        if timers.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({})", self.name, self.frames, timers);
        }

        self.frames = 0;
        self.start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets_count() {
        let timer = Timer::new("work");
        timer.time(|| ());
        timer.time(|| ());
        assert!(timer.to_string().starts_with("work: 2x"));
        assert!(timer.to_string().starts_with("work: 0x0.0ms"));
    }
}
