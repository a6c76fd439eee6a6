//! Randomized pause between page fetches.

use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Sleeps a random duration around a configured average between iterations.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    average_ms: u64,
}

impl Pacer {
    pub fn new(average_ms: u64) -> Self {
        Self { average_ms }
    }

    /// Half-open range `[avg - avg/2, avg + avg/2)` the delay is drawn from.
    pub fn bounds(&self) -> (u64, u64) {
        let deviation = self.average_ms / 2;
        (self.average_ms - deviation, self.average_ms + deviation)
    }

    /// Draw a delay using the given RNG. An empty range (average 0 or 1) yields the average.
    pub fn next_delay_with<R: Rng>(&self, rng: &mut R) -> Duration {
        let (low, high) = self.bounds();
        let ms = if low < high {
            rng.random_range(low..high)
        } else {
            self.average_ms
        };
        Duration::from_millis(ms)
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay_with(&mut rand::rng())
    }

    /// Block the current thread for a freshly drawn delay.
    pub fn pause(&self) {
        self.pause_with(std::thread::sleep);
    }

    /// Draw a delay and hand it to `sleep`.
    pub fn pause_with<F: FnOnce(Duration)>(&self, sleep: F) {
        let delay = self.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "Delay before next page");
        sleep(delay);
    }
}
