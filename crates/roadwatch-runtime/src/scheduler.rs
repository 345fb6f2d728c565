//! [`TickScheduler`] – derives the slow periodic ticks from the 1 s tick.
//!
//! # Example
//!
//! ```rust
//! use roadwatch_runtime::scheduler::TickScheduler;
//!
//! let mut scheduler = TickScheduler::new();
//! for _ in 0..59 {
//!     assert!(!scheduler.advance().minute);
//! }
//! assert!(scheduler.advance().minute);
//! ```

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_DAY: u64 = 86_400;

/// Periodic boundaries crossed by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ticks {
    pub minute: bool,
    pub hour: bool,
    pub day: bool,
}

/// Counts elapsed seconds since start-up.
#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    seconds: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.seconds
    }

    /// Account for one more second and report which boundaries it closed.
    pub fn advance(&mut self) -> Ticks {
        self.seconds += 1;
        Ticks {
            minute: self.seconds % SECONDS_PER_MINUTE == 0,
            hour: self.seconds % SECONDS_PER_HOUR == 0,
            day: self.seconds % SECONDS_PER_DAY == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_fire_at_their_periods() {
        let mut scheduler = TickScheduler::new();
        let mut minutes = 0;
        let mut hours = 0;
        let mut days = 0;
        for _ in 0..SECONDS_PER_DAY {
            let t = scheduler.advance();
            minutes += usize::from(t.minute);
            hours += usize::from(t.hour);
            days += usize::from(t.day);
        }
        assert_eq!((minutes, hours, days), (1_440, 24, 1));
        assert_eq!(scheduler.elapsed_seconds(), SECONDS_PER_DAY);
    }

    #[test]
    fn day_boundary_is_also_hour_and_minute() {
        let mut scheduler = TickScheduler { seconds: SECONDS_PER_DAY - 1 };
        assert_eq!(scheduler.advance(), Ticks { minute: true, hour: true, day: true });
    }
}
