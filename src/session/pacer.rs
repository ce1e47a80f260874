use std::time::{Duration, Instant};

/// Fixed-rate tick timer for the session loop.
///
/// Deadlines advance by one interval per tick, so short stalls are caught
/// up. When the loop falls more than an interval behind, the schedule
/// restarts from now instead of bursting.
pub struct Pacer {
    interval: Duration,
    next: Instant,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// Tick length for `fps` frames per second; 0 is treated as 1.
    pub fn interval_for_fps(fps: u32) -> Duration {
        Duration::from_secs_f64(1.0 / fps.max(1) as f64)
    }

    /// Block until the next tick.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
    }
}
