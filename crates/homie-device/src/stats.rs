//! Statistics schedule

use std::time::{Duration, Instant};

/// Deadline of the next statistics publication
#[derive(Debug, Clone, Copy)]
pub struct StatsSchedule {
    period: Duration,
    next: Instant,
}

impl StatsSchedule {
    /// First tick one `period` after `now`
    pub fn new(period: Duration, now: Instant) -> Self {
        let period = period.max(Duration::from_secs(1));
        Self {
            period,
            next: now + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Move to the following tick; missed ticks are skipped, not replayed
    pub fn advance(&mut self, now: Instant) {
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_after_period() {
        let now = Instant::now();
        let schedule = StatsSchedule::new(Duration::from_secs(60), now);
        assert!(!schedule.is_due(now));
        assert!(schedule.is_due(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_advance_keeps_cadence() {
        let now = Instant::now();
        let mut schedule = StatsSchedule::new(Duration::from_secs(10), now);
        schedule.advance(now + Duration::from_secs(11));
        assert_eq!(schedule.next_due(), now + Duration::from_secs(20));
    }

    #[test]
    fn test_advance_skips_missed_ticks() {
        let now = Instant::now();
        let mut schedule = StatsSchedule::new(Duration::from_secs(10), now);
        let late = now + Duration::from_secs(45);
        schedule.advance(late);
        assert_eq!(schedule.next_due(), late + Duration::from_secs(10));
    }

    #[test]
    fn test_zero_period_clamped() {
        let schedule = StatsSchedule::new(Duration::ZERO, Instant::now());
        assert_eq!(schedule.period(), Duration::from_secs(1));
    }
}
