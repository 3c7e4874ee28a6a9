//! Strap pulses that carry chassis requests to the host carrier board.
//!
//! The button dispatcher must never block on a multi-second strap hold, so
//! [`StrapRequester`] only enqueues a [`StrapPulse`]; the strap task drains the
//! queue and drives the open-drain outputs.

use button_core::control::{ChassisTransition, HostTransition};
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use embassy_time::Duration;

use crate::events::TaskMutex;

/// Depth of the strap pulse queue.
pub const STRAP_QUEUE_DEPTH: usize = 4;

/// Short PWR* press used for power-on and graceful power-off.
pub const POWER_TAP: Duration = Duration::from_millis(200);
/// PWR* hold long enough to trip the carrier's forced power-off.
pub const POWER_OVERRIDE_HOLD: Duration = Duration::from_secs(6);
/// RESET* pulse width.
pub const RESET_PULSE: Duration = Duration::from_millis(100);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StrapLine {
    Power,
    Reset,
}

impl StrapLine {
    pub const fn label(self) -> &'static str {
        match self {
            StrapLine::Power => "PWR*",
            StrapLine::Reset => "RESET*",
        }
    }
}

/// One assert-hold-release cycle on a strap line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StrapPulse {
    pub line: StrapLine,
    pub hold: Duration,
}

impl StrapPulse {
    pub const fn for_host(transition: HostTransition) -> Self {
        match transition {
            HostTransition::On | HostTransition::Off => Self {
                line: StrapLine::Power,
                hold: POWER_TAP,
            },
            HostTransition::Reboot => Self {
                line: StrapLine::Reset,
                hold: RESET_PULSE,
            },
        }
    }

    pub const fn for_chassis(transition: ChassisTransition) -> Self {
        match transition {
            ChassisTransition::Off => Self {
                line: StrapLine::Power,
                hold: POWER_OVERRIDE_HOLD,
            },
        }
    }
}

pub type StrapQueue = Channel<TaskMutex, StrapPulse, STRAP_QUEUE_DEPTH>;

pub type StrapSender<'a> = Sender<'a, TaskMutex, StrapPulse, STRAP_QUEUE_DEPTH>;

pub type StrapReceiver<'a> = Receiver<'a, TaskMutex, StrapPulse, STRAP_QUEUE_DEPTH>;

/// Chassis control failures surfaced to the button handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChassisError {
    /// A previous pulse is still queued; the request was dropped.
    StrapBusy(StrapLine),
}

/// Non-blocking front end of the strap queue.
pub struct StrapRequester<'a> {
    sender: StrapSender<'a>,
}

impl<'a> StrapRequester<'a> {
    pub fn new(sender: StrapSender<'a>) -> Self {
        Self { sender }
    }

    pub fn host(&self, transition: HostTransition) -> Result<(), ChassisError> {
        self.submit(StrapPulse::for_host(transition))
    }

    pub fn chassis(&self, transition: ChassisTransition) -> Result<(), ChassisError> {
        self.submit(StrapPulse::for_chassis(transition))
    }

    fn submit(&self, pulse: StrapPulse) -> Result<(), ChassisError> {
        self.sender
            .try_send(pulse)
            .map_err(|TrySendError::Full(pulse)| ChassisError::StrapBusy(pulse.line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_map_to_pulses() {
        assert_eq!(
            StrapPulse::for_host(HostTransition::On),
            StrapPulse {
                line: StrapLine::Power,
                hold: POWER_TAP,
            }
        );
        assert_eq!(
            StrapPulse::for_host(HostTransition::Reboot).line,
            StrapLine::Reset
        );
        assert_eq!(
            StrapPulse::for_chassis(ChassisTransition::Off).hold,
            POWER_OVERRIDE_HOLD
        );
    }

    #[test]
    fn full_queue_reports_busy_line() {
        let queue = StrapQueue::new();
        let requester = StrapRequester::new(queue.sender());

        for _ in 0..STRAP_QUEUE_DEPTH {
            requester
                .host(HostTransition::Off)
                .expect("queue has room");
        }
        assert_eq!(
            requester.host(HostTransition::Reboot),
            Err(ChassisError::StrapBusy(StrapLine::Reset))
        );

        let receiver = queue.receiver();
        assert_eq!(
            receiver.try_receive().ok(),
            Some(StrapPulse::for_host(HostTransition::Off))
        );
    }
}
