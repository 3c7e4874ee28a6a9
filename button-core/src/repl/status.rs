//! Shared status surface for the console.
//!
//! The firmware and emulator build a [`StatusSnapshot`] from their live
//! handler and decoder, and [`StatusFormatter`] keeps the textual rendering
//! consistent across front-ends.

use core::fmt;
use core::time::Duration;

use crate::control::PowerState;
use crate::handler::ButtonChannel;
use crate::power::PowerOpState;
use crate::selector::{HostSelection, HostSelectorPosition};

/// Power-button portion of the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerButtonSnapshot {
    pub state: PowerOpState,
    /// Time left before the current deadline, `None` when idle.
    pub remaining: Option<Duration>,
}

/// Selector portion of the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectorSnapshot {
    pub lines: usize,
    pub position: HostSelectorPosition,
    pub selection: HostSelection,
}

/// Snapshot of reusable status information surfaced by the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// `None` when the power button is not registered.
    pub power_button: Option<PowerButtonSnapshot>,
    pub registered: [(ButtonChannel, bool); 3],
    pub chassis: Option<PowerState>,
    /// `None` when no selector lines are configured.
    pub selector: Option<SelectorSnapshot>,
}

impl StatusSnapshot {
    /// Builds a snapshot with nothing registered or known.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            power_button: None,
            registered: [
                (ButtonChannel::Power, false),
                (ButtonChannel::Reset, false),
                (ButtonChannel::Id, false),
            ],
            chassis: None,
            selector: None,
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the power-button line (e.g. `power-button state=pressed remaining=+3.0s`).
    pub fn write_power_button_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("power-button state=")?;
        match self.snapshot.power_button {
            Some(button) => {
                writer.write_str(button.state.label())?;
                writer.write_str(" remaining=")?;
                write_duration(writer, button.remaining)
            }
            None => writer.write_str("absent"),
        }
    }

    /// Writes the channel registration line (e.g. `channels power=registered reset=absent id=registered`).
    pub fn write_channels_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("channels")?;
        for (channel, registered) in &self.snapshot.registered {
            let state = if *registered { "registered" } else { "absent" };
            write!(writer, " {channel}={state}")?;
        }
        Ok(())
    }

    /// Writes the chassis line (e.g. `chassis power=on`).
    pub fn write_chassis_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("chassis power=")?;
        match self.snapshot.chassis {
            Some(state) => write!(writer, "{state}"),
            None => writer.write_str("unknown"),
        }
    }

    /// Writes the selector line (e.g. `selector lines=3 position=0b001 host=2`).
    pub fn write_selector_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        match self.snapshot.selector {
            Some(selector) => {
                write!(writer, "selector lines={} position=0b", selector.lines)?;
                for bit in (0..selector.lines.max(1)).rev() {
                    let set = selector.position & (1u8 << bit) != 0;
                    writer.write_char(if set { '1' } else { '0' })?;
                }
                write!(writer, " host={}", selector.selection)
            }
            None => writer.write_str("selector lines=0 host=n/a"),
        }
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}
