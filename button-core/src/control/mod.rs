//! Chassis control surface consumed by the button handlers.
//!
//! Platforms implement [`ChassisControl`] on top of whatever actually moves
//! the host: strap outputs on the firmware, a simulated chassis in the
//! emulator, mocks in tests. Every call may fail; the handlers log the failure
//! and leave their own state untouched.

use core::fmt;

/// Current chassis power state as reported by the platform.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// Returns `true` when the chassis is powered.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, PowerState::On)
    }

    /// Helper converting a boolean power-good flag into a [`PowerState`].
    #[must_use]
    pub const fn from_powered(powered: bool) -> Self {
        if powered {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        })
    }
}

/// Host-level transitions the controller may request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostTransition {
    On,
    Off,
    Reboot,
}

impl fmt::Display for HostTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HostTransition::On => "host-on",
            HostTransition::Off => "host-off",
            HostTransition::Reboot => "host-reboot",
        })
    }
}

/// Chassis-level transitions the controller may request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChassisTransition {
    Off,
}

impl fmt::Display for ChassisTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChassisTransition::Off => f.write_str("chassis-off"),
        }
    }
}

/// Platform hooks for querying and changing the managed chassis.
pub trait ChassisControl {
    type Error: fmt::Debug;

    /// Reads the current chassis power state.
    fn current_power_state(&mut self) -> Result<PowerState, Self::Error>;

    /// Returns `true` once the management side can accept a power-on request.
    fn is_ready(&mut self) -> Result<bool, Self::Error>;

    /// Requests a host-level transition.
    fn request_host_transition(&mut self, transition: HostTransition) -> Result<(), Self::Error>;

    /// Requests a chassis-level transition.
    fn request_chassis_transition(
        &mut self,
        transition: ChassisTransition,
    ) -> Result<(), Self::Error>;

    /// Flips the identify indicator and returns the new asserted state.
    fn toggle_identify(&mut self) -> Result<bool, Self::Error>;
}
