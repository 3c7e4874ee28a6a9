//! Periodic poll timer used by the power-button state machine.
//!
//! The controller never blocks on a timer directly. Instead the owning state
//! machine arms a [`PollTimer`] and the platform dispatcher asks it for the
//! next fire instant, sleeps until then, and calls [`PollTimer::poll`]. Ticks
//! are delivered on the same dispatcher as button edges so handlers never
//! overlap.

use core::ops::Add;
use core::time::Duration;

/// Monotonic clock reading supplied by the platform.
///
/// Deadlines are absolute instants so a late or skipped tick never shifts
/// the schedule of the state machine.
pub trait MonotonicInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(self, earlier: Self) -> Duration;
}

/// Contract for a repeating countdown timer.
///
/// A started timer fires every `interval` until [`PollTimer::stop`] is called.
/// A stopped timer never fires and may be started again with a new interval.
pub trait PollTimer {
    type Instant: Copy + Ord;

    /// Schedules a repeating fire every `interval`, the first one at `now + interval`.
    fn start(&mut self, now: Self::Instant, interval: Duration);

    /// Stops and starts the timer in one step without an intervening fire.
    fn restart(&mut self, now: Self::Instant, interval: Duration) {
        self.stop();
        self.start(now, interval);
    }

    /// Cancels any pending fire.
    fn stop(&mut self);

    /// Returns `true` while the timer is armed.
    fn is_running(&self) -> bool;

    /// Instant of the next scheduled fire, if the timer is armed.
    fn next_fire(&self) -> Option<Self::Instant>;

    /// Consumes a due fire. Returns `true` at most once per call.
    fn poll(&mut self, now: Self::Instant) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Schedule<TInstant> {
    interval: Duration,
    next_fire: TInstant,
}

/// Executor-agnostic [`PollTimer`] backed by an absolute fire instant.
///
/// When the dispatcher falls behind by more than one period, the missed
/// periods coalesce into a single fire and the schedule restarts from `now`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlineTimer<TInstant> {
    schedule: Option<Schedule<TInstant>>,
}

impl<TInstant> DeadlineTimer<TInstant> {
    /// Creates a stopped timer.
    #[must_use]
    pub const fn new() -> Self {
        Self { schedule: None }
    }

    /// Interval of the armed schedule, if any.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.schedule.as_ref().map(|schedule| schedule.interval)
    }
}

impl<TInstant> Default for DeadlineTimer<TInstant> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant> PollTimer for DeadlineTimer<TInstant>
where
    TInstant: MonotonicInstant,
{
    type Instant = TInstant;

    fn start(&mut self, now: TInstant, interval: Duration) {
        self.schedule = Some(Schedule {
            interval,
            next_fire: now + interval,
        });
    }

    fn stop(&mut self) {
        self.schedule = None;
    }

    fn is_running(&self) -> bool {
        self.schedule.is_some()
    }

    fn next_fire(&self) -> Option<TInstant> {
        self.schedule.as_ref().map(|schedule| schedule.next_fire)
    }

    fn poll(&mut self, now: TInstant) -> bool {
        let Some(schedule) = self.schedule.as_mut() else {
            return false;
        };

        if now < schedule.next_fire {
            return false;
        }

        let following = schedule.next_fire + schedule.interval;
        schedule.next_fire = if following > now {
            following
        } else {
            now + schedule.interval
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct Millis(u64);

    impl Add<Duration> for Millis {
        type Output = Millis;

        fn add(self, rhs: Duration) -> Self::Output {
            Millis(self.0 + rhs.as_millis() as u64)
        }
    }

    impl MonotonicInstant for Millis {
        fn saturating_duration_since(self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn fires_once_per_interval() {
        let mut timer = DeadlineTimer::new();
        timer.start(Millis(0), SECOND);

        assert!(!timer.poll(Millis(999)));
        assert!(timer.poll(Millis(1_000)));
        assert!(!timer.poll(Millis(1_000)));
        assert_eq!(timer.next_fire(), Some(Millis(2_000)));
        assert!(timer.poll(Millis(2_010)));
        assert_eq!(timer.next_fire(), Some(Millis(3_000)));
    }

    #[test]
    fn stopped_timer_never_fires() {
        let mut timer = DeadlineTimer::new();
        timer.start(Millis(0), SECOND);
        timer.stop();

        assert!(!timer.is_running());
        assert_eq!(timer.next_fire(), None);
        assert!(!timer.poll(Millis(10_000)));
    }

    #[test]
    fn restart_moves_schedule_without_firing() {
        let mut timer = DeadlineTimer::new();
        timer.start(Millis(0), SECOND);
        timer.restart(Millis(900), Duration::from_millis(500));

        assert!(!timer.poll(Millis(1_000)));
        assert_eq!(timer.interval(), Some(Duration::from_millis(500)));
        assert!(timer.poll(Millis(1_400)));
    }

    #[test]
    fn missed_periods_coalesce() {
        let mut timer = DeadlineTimer::new();
        timer.start(Millis(0), SECOND);

        assert!(timer.poll(Millis(5_500)));
        assert_eq!(timer.next_fire(), Some(Millis(6_500)));
        assert!(!timer.poll(Millis(6_000)));
    }
}
