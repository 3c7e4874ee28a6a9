//! Embassy clock binding for the shared timer contract.

use core::ops::Add;

use button_core::timer::{DeadlineTimer, MonotonicInstant};
use embassy_time::{Duration, Instant};

/// Monotonic instant used by every firmware state machine.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct FirmwareInstant(Instant);

/// Power-button poll timer driven by the Embassy clock.
pub type ButtonTimer = DeadlineTimer<FirmwareInstant>;

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0.as_millis()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = FirmwareInstant;

    fn add(self, rhs: core::time::Duration) -> Self::Output {
        Self(
            self.0
                .checked_add(core_duration_to_embassy(rhs))
                .unwrap_or(Instant::MAX),
        )
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(self, earlier: Self) -> core::time::Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        core::time::Duration::from_micros(elapsed.as_micros())
    }
}

/// Converts a core duration into Embassy ticks, saturating on overflow.
pub fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

#[cfg(test)]
mod tests {
    use button_core::timer::PollTimer;

    use super::*;

    fn millis(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_millis(value))
    }

    #[test]
    fn adds_core_durations() {
        let later = millis(1_000) + core::time::Duration::from_millis(250);
        assert_eq!(later, millis(1_250));
        assert_eq!(
            later.saturating_duration_since(millis(1_000)),
            core::time::Duration::from_millis(250)
        );
        assert_eq!(
            millis(10).saturating_duration_since(millis(20)),
            core::time::Duration::ZERO
        );
    }

    #[test]
    fn button_timer_fires_on_embassy_instants() {
        let mut timer = ButtonTimer::new();
        timer.start(millis(0), core::time::Duration::from_secs(1));

        assert!(!timer.poll(millis(999)));
        assert!(timer.poll(millis(1_000)));
        assert_eq!(timer.next_fire(), Some(millis(2_000)));
        assert_eq!(
            timer.next_fire().map(FirmwareInstant::into_embassy),
            Some(Instant::from_millis(2_000))
        );
    }
}
