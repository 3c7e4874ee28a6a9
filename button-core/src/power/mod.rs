//! Power-button timing state machine.
//!
//! A momentary power switch is classified purely from its press/release
//! timing against a periodic poll timer. Holding the button through the HOLD
//! window starts a delayed power-off (DPO); releasing during DPO opens a
//! separation window that completes a graceful host-off when it expires,
//! while pressing again in that window escalates straight to a forced
//! power-off (FPO). Holding through DPO and FPO ends in a long-press action.
//!
//! Deadlines are absolute instants carried inside the timed phases, so a
//! timed state without a deadline cannot be constructed.

use core::fmt;
use core::time::Duration;

use crate::control::HostTransition;
use crate::timer::{MonotonicInstant, PollTimer};

/// Default time the button must stay pressed before DPO begins.
pub const DEFAULT_HOLD: Duration = Duration::from_secs(4);
/// Default length of the delayed power-off window.
pub const DEFAULT_DPO: Duration = Duration::from_secs(30);
/// Default length of the forced power-off window.
pub const DEFAULT_FPO: Duration = Duration::from_secs(15);
/// Default tick granularity of the poll timer.
pub const DEFAULT_POLL: Duration = Duration::from_secs(1);

/// Externally visible state of a power button instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerOpState {
    ButtonNotPressed,
    ButtonPressed,
    DpoInitiated,
    DpoFpoSeparation,
    FpoInitiated,
}

impl PowerOpState {
    /// Short label used in logs and status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PowerOpState::ButtonNotPressed => "not-pressed",
            PowerOpState::ButtonPressed => "pressed",
            PowerOpState::DpoInitiated => "dpo-initiated",
            PowerOpState::DpoFpoSeparation => "dpo-fpo-separation",
            PowerOpState::FpoInitiated => "fpo-initiated",
        }
    }

    /// Returns `true` for states that carry a deadline.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        !matches!(self, PowerOpState::ButtonNotPressed)
    }
}

impl fmt::Display for PowerOpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies a single timing constant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimingField {
    Hold,
    Dpo,
    Fpo,
    Poll,
}

impl fmt::Display for TimingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimingField::Hold => "hold",
            TimingField::Dpo => "dpo",
            TimingField::Fpo => "fpo",
            TimingField::Poll => "poll",
        })
    }
}

/// Rejected timing configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimingError {
    /// A constant was zero.
    ZeroInterval(TimingField),
    /// The poll interval is coarser than the shortest timeout.
    PollExceedsTimeout { poll: Duration, shortest: Duration },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingError::ZeroInterval(field) => write!(f, "{field} interval must be non-zero"),
            TimingError::PollExceedsTimeout { poll, shortest } => write!(
                f,
                "poll interval {}ms exceeds shortest timeout {}ms",
                poll.as_millis(),
                shortest.as_millis()
            ),
        }
    }
}

/// Timeout and tick constants for the power button.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerButtonTimings {
    pub hold: Duration,
    pub dpo: Duration,
    pub fpo: Duration,
    pub poll: Duration,
}

impl PowerButtonTimings {
    #[must_use]
    pub const fn new(hold: Duration, dpo: Duration, fpo: Duration, poll: Duration) -> Self {
        Self {
            hold,
            dpo,
            fpo,
            poll,
        }
    }

    /// Returns the shortest of the three timeouts.
    #[must_use]
    pub fn shortest_timeout(&self) -> Duration {
        self.hold.min(self.dpo).min(self.fpo)
    }

    /// Checks that every constant is non-zero and `poll` does not exceed any timeout.
    pub fn validate(&self) -> Result<(), TimingError> {
        for (field, value) in [
            (TimingField::Hold, self.hold),
            (TimingField::Dpo, self.dpo),
            (TimingField::Fpo, self.fpo),
            (TimingField::Poll, self.poll),
        ] {
            if value.is_zero() {
                return Err(TimingError::ZeroInterval(field));
            }
        }

        let shortest = self.shortest_timeout();
        if self.poll > shortest {
            return Err(TimingError::PollExceedsTimeout {
                poll: self.poll,
                shortest,
            });
        }

        Ok(())
    }
}

impl Default for PowerButtonTimings {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD, DEFAULT_DPO, DEFAULT_FPO, DEFAULT_POLL)
    }
}

/// Intent produced by a single state-machine step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonAction {
    None,
    /// Request a host-level transition (graceful off at the end of separation).
    RequestHostTransition(HostTransition),
    /// The button was held through DPO and FPO.
    LongPress,
}

/// Result of feeding one event into the state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerStep {
    pub from: PowerOpState,
    pub to: PowerOpState,
    pub action: ButtonAction,
}

impl PowerStep {
    const fn unchanged(state: PowerOpState) -> Self {
        Self {
            from: state,
            to: state,
            action: ButtonAction::None,
        }
    }

    /// Returns `true` when the step moved the machine to a different state.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase<TInstant> {
    Idle,
    Pressed { deadline: TInstant },
    Dpo { deadline: TInstant },
    Separation { deadline: TInstant },
    Fpo { deadline: TInstant },
}

impl<TInstant: Copy> Phase<TInstant> {
    const fn state(&self) -> PowerOpState {
        match self {
            Phase::Idle => PowerOpState::ButtonNotPressed,
            Phase::Pressed { .. } => PowerOpState::ButtonPressed,
            Phase::Dpo { .. } => PowerOpState::DpoInitiated,
            Phase::Separation { .. } => PowerOpState::DpoFpoSeparation,
            Phase::Fpo { .. } => PowerOpState::FpoInitiated,
        }
    }

    const fn deadline(&self) -> Option<TInstant> {
        match self {
            Phase::Idle => None,
            Phase::Pressed { deadline }
            | Phase::Dpo { deadline }
            | Phase::Separation { deadline }
            | Phase::Fpo { deadline } => Some(*deadline),
        }
    }
}

/// Power-button state machine owning its poll timer.
pub struct PowerButtonStateMachine<T>
where
    T: PollTimer,
{
    timings: PowerButtonTimings,
    timer: T,
    phase: Phase<T::Instant>,
}

impl<T> PowerButtonStateMachine<T>
where
    T: PollTimer,
    T::Instant: MonotonicInstant,
{
    /// Creates an idle state machine after validating `timings`.
    pub fn new(timings: PowerButtonTimings, mut timer: T) -> Result<Self, TimingError> {
        timings.validate()?;
        timer.stop();
        Ok(Self {
            timings,
            timer,
            phase: Phase::Idle,
        })
    }

    /// Current externally visible state.
    #[must_use]
    pub fn state(&self) -> PowerOpState {
        self.phase.state()
    }

    /// Absolute deadline of the current timed state, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<T::Instant> {
        self.phase.deadline()
    }

    /// Time left before the current deadline expires.
    #[must_use]
    pub fn remaining(&self, now: T::Instant) -> Option<Duration> {
        self.phase
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    #[must_use]
    pub fn timings(&self) -> &PowerButtonTimings {
        &self.timings
    }

    /// Read access to the owned poll timer.
    #[must_use]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Consumes a due timer fire. Returns `true` when the caller should deliver a tick.
    pub fn poll_timer(&mut self, now: T::Instant) -> bool {
        self.timer.poll(now)
    }

    /// Handles a debounced press edge.
    pub fn on_press(&mut self, now: T::Instant) -> PowerStep {
        let from = self.state();
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Pressed {
                    deadline: now + self.timings.hold,
                };
                self.timer.restart(now, self.timings.poll);
            }
            Phase::Separation { .. } => {
                self.phase = Phase::Fpo {
                    deadline: now + self.timings.fpo,
                };
                self.timer.restart(now, self.timings.poll);
            }
            Phase::Pressed { .. } | Phase::Dpo { .. } | Phase::Fpo { .. } => {
                return PowerStep::unchanged(from);
            }
        }

        self.step(from, ButtonAction::None)
    }

    /// Handles a debounced release edge.
    pub fn on_release(&mut self, _now: T::Instant) -> PowerStep {
        let from = self.state();
        match self.phase {
            Phase::Pressed { .. } => {
                self.phase = Phase::Idle;
                self.timer.stop();
            }
            Phase::Dpo { deadline } => {
                self.phase = Phase::Separation { deadline };
            }
            Phase::Idle | Phase::Separation { .. } | Phase::Fpo { .. } => {
                return PowerStep::unchanged(from);
            }
        }

        self.step(from, ButtonAction::None)
    }

    /// Handles a poll-timer tick. Nothing happens until `now` is strictly past the deadline.
    pub fn on_tick(&mut self, now: T::Instant) -> PowerStep {
        let from = self.state();
        let Some(deadline) = self.phase.deadline() else {
            return PowerStep::unchanged(from);
        };
        if now <= deadline {
            return PowerStep::unchanged(from);
        }

        let action = match self.phase {
            Phase::Pressed { .. } => {
                self.phase = Phase::Dpo {
                    deadline: now + self.timings.dpo,
                };
                ButtonAction::None
            }
            Phase::Dpo { .. } => {
                self.phase = Phase::Fpo {
                    deadline: now + self.timings.fpo,
                };
                ButtonAction::None
            }
            Phase::Separation { .. } => {
                self.phase = Phase::Idle;
                self.timer.stop();
                ButtonAction::RequestHostTransition(HostTransition::Off)
            }
            Phase::Fpo { .. } => {
                self.phase = Phase::Idle;
                self.timer.stop();
                ButtonAction::LongPress
            }
            Phase::Idle => ButtonAction::None,
        };

        self.step(from, action)
    }

    fn step(&self, from: PowerOpState, action: ButtonAction) -> PowerStep {
        PowerStep {
            from,
            to: self.state(),
            action,
        }
    }
}
