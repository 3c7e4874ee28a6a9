//! Single dispatch entry point for the chassis buttons.
//!
//! One [`ButtonHandler`] owns an optional instance per button channel plus
//! the platform [`ChassisControl`] handle. Channels that the startup probe
//! does not find are simply left unregistered. Every dispatched event returns
//! a [`DispatchReport`] describing what happened so the platform can log it;
//! collaborator failures are reported, never retried, and never roll the
//! state machine back.

use core::fmt;

use crate::control::{ChassisControl, ChassisTransition, HostTransition, PowerState};
use crate::power::{
    ButtonAction, PowerButtonStateMachine, PowerButtonTimings, PowerOpState, PowerStep,
    TimingError,
};
use crate::timer::{MonotonicInstant, PollTimer};

/// Physical button channels known to the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonChannel {
    Power,
    Reset,
    Id,
}

impl ButtonChannel {
    /// All channels in probe order.
    pub const ALL: [ButtonChannel; 3] = [
        ButtonChannel::Power,
        ButtonChannel::Reset,
        ButtonChannel::Id,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ButtonChannel::Power => "power",
            ButtonChannel::Reset => "reset",
            ButtonChannel::Id => "id",
        }
    }
}

impl fmt::Display for ButtonChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Event delivered by the platform dispatcher.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonEvent {
    Pressed(ButtonChannel),
    Released(ButtonChannel),
    /// Poll-timer fire for the power button.
    Tick,
}

impl ButtonEvent {
    /// Channel the event belongs to.
    #[must_use]
    pub const fn channel(self) -> ButtonChannel {
        match self {
            ButtonEvent::Pressed(channel) | ButtonEvent::Released(channel) => channel,
            ButtonEvent::Tick => ButtonChannel::Power,
        }
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonEvent::Pressed(channel) => write!(f, "{channel} pressed"),
            ButtonEvent::Released(channel) => write!(f, "{channel} released"),
            ButtonEvent::Tick => f.write_str("tick"),
        }
    }
}

/// Startup probe deciding which channels exist on this platform.
pub trait PresenceProbe {
    fn is_present(&mut self, channel: ButtonChannel) -> bool;
}

/// Static presence table, typically derived from board wiring.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ButtonPresence {
    pub power: bool,
    pub reset: bool,
    pub id: bool,
}

impl ButtonPresence {
    /// Every channel present.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            power: true,
            reset: true,
            id: true,
        }
    }
}

impl PresenceProbe for ButtonPresence {
    fn is_present(&mut self, channel: ButtonChannel) -> bool {
        match channel {
            ButtonChannel::Power => self.power,
            ButtonChannel::Reset => self.reset,
            ButtonChannel::Id => self.id,
        }
    }
}

/// Request successfully handed to the chassis control.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlRequest {
    Host(HostTransition),
    Chassis(ChassisTransition),
    Identify { asserted: bool },
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRequest::Host(transition) => transition.fmt(f),
            ControlRequest::Chassis(transition) => transition.fmt(f),
            ControlRequest::Identify { asserted } => {
                write!(f, "identify asserted={asserted}")
            }
        }
    }
}

/// Why an intended request was dropped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Management side is not ready for a power-on request.
    NotReady,
    /// Chassis is already off.
    PoweredOff,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NotReady => "not-ready",
            SkipReason::PoweredOff => "powered-off",
        })
    }
}

/// Chassis control call that failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlOperation {
    QueryPowerState,
    QueryReadiness,
    RequestHost(HostTransition),
    RequestChassis(ChassisTransition),
    ToggleIdentify,
}

impl fmt::Display for ControlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlOperation::QueryPowerState => f.write_str("query-power-state"),
            ControlOperation::QueryReadiness => f.write_str("query-readiness"),
            ControlOperation::RequestHost(transition) => write!(f, "request {transition}"),
            ControlOperation::RequestChassis(transition) => write!(f, "request {transition}"),
            ControlOperation::ToggleIdentify => f.write_str("toggle-identify"),
        }
    }
}

/// Failed chassis control call with the platform error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControlFailure<E> {
    pub operation: ControlOperation,
    pub error: E,
}

/// What a dispatched event did beyond any state change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DispatchOutcome<E> {
    None,
    Requested(ControlRequest),
    Skipped(SkipReason),
    Failed(ControlFailure<E>),
    /// Event for a channel that is not present on this platform.
    Unregistered,
}

/// Power-button state change caused by an event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StateChange {
    pub from: PowerOpState,
    pub to: PowerOpState,
}

/// Summary of a single dispatched event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DispatchReport<E> {
    pub event: ButtonEvent,
    pub state_change: Option<StateChange>,
    pub outcome: DispatchOutcome<E>,
}

impl<E> DispatchReport<E> {
    const fn new(event: ButtonEvent, outcome: DispatchOutcome<E>) -> Self {
        Self {
            event,
            state_change: None,
            outcome,
        }
    }

    fn with_step(mut self, step: &PowerStep) -> Self {
        if step.changed() {
            self.state_change = Some(StateChange {
                from: step.from,
                to: step.to,
            });
        }
        self
    }

    /// Returns `true` when nothing observable happened (countdown ticks, bounces).
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.state_change.is_none() && matches!(self.outcome, DispatchOutcome::None)
    }
}

/// Reset button: requests a host reboot on release while the chassis is on.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ResetButton;

impl ResetButton {
    fn on_release<C: ChassisControl>(self, control: &mut C) -> DispatchOutcome<C::Error> {
        match control.current_power_state() {
            Ok(PowerState::On) => request_host(control, HostTransition::Reboot),
            Ok(PowerState::Off) => DispatchOutcome::Skipped(SkipReason::PoweredOff),
            Err(error) => failed(ControlOperation::QueryPowerState, error),
        }
    }
}

/// Identify button: toggles the identify indicator on release.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IdButton;

impl IdButton {
    fn on_release<C: ChassisControl>(self, control: &mut C) -> DispatchOutcome<C::Error> {
        match control.toggle_identify() {
            Ok(asserted) => DispatchOutcome::Requested(ControlRequest::Identify { asserted }),
            Err(error) => failed(ControlOperation::ToggleIdentify, error),
        }
    }
}

/// Aggregates the per-channel button instances behind one dispatch entry point.
pub struct ButtonHandler<C, T>
where
    C: ChassisControl,
    T: PollTimer,
{
    control: C,
    power: Option<PowerButtonStateMachine<T>>,
    reset: Option<ResetButton>,
    id: Option<IdButton>,
}

impl<C, T> ButtonHandler<C, T>
where
    C: ChassisControl,
    T: PollTimer,
    T::Instant: MonotonicInstant,
{
    /// Creates a handler with no channels registered.
    #[must_use]
    pub fn new(control: C) -> Self {
        Self {
            control,
            power: None,
            reset: None,
            id: None,
        }
    }

    /// Registers every channel the probe reports as present.
    pub fn probe<P: PresenceProbe>(
        control: C,
        probe: &mut P,
        timings: PowerButtonTimings,
        timer: T,
    ) -> Result<Self, TimingError> {
        let mut handler = Self::new(control);
        if probe.is_present(ButtonChannel::Power) {
            handler = handler.with_power(timings, timer)?;
        }
        if probe.is_present(ButtonChannel::Reset) {
            handler = handler.with_reset();
        }
        if probe.is_present(ButtonChannel::Id) {
            handler = handler.with_id();
        }
        Ok(handler)
    }

    /// Registers the power button.
    pub fn with_power(mut self, timings: PowerButtonTimings, timer: T) -> Result<Self, TimingError> {
        self.power = Some(PowerButtonStateMachine::new(timings, timer)?);
        Ok(self)
    }

    /// Registers the reset button.
    #[must_use]
    pub fn with_reset(mut self) -> Self {
        self.reset = Some(ResetButton);
        self
    }

    /// Registers the identify button.
    #[must_use]
    pub fn with_id(mut self) -> Self {
        self.id = Some(IdButton);
        self
    }

    #[must_use]
    pub fn is_registered(&self, channel: ButtonChannel) -> bool {
        match channel {
            ButtonChannel::Power => self.power.is_some(),
            ButtonChannel::Reset => self.reset.is_some(),
            ButtonChannel::Id => self.id.is_some(),
        }
    }

    /// Power-button state, if the channel is registered.
    #[must_use]
    pub fn power_state(&self) -> Option<PowerOpState> {
        self.power.as_ref().map(PowerButtonStateMachine::state)
    }

    #[must_use]
    pub fn power_machine(&self) -> Option<&PowerButtonStateMachine<T>> {
        self.power.as_ref()
    }

    /// Next instant at which [`ButtonHandler::poll_timer`] has work to do.
    #[must_use]
    pub fn next_fire(&self) -> Option<T::Instant> {
        self.power
            .as_ref()
            .and_then(|machine| machine.timer().next_fire())
    }

    #[must_use]
    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut C {
        &mut self.control
    }

    /// Delivers a tick if the power-button timer is due.
    pub fn poll_timer(&mut self, now: T::Instant) -> Option<DispatchReport<C::Error>> {
        let machine = self.power.as_mut()?;
        if machine.poll_timer(now) {
            Some(self.dispatch(ButtonEvent::Tick, now))
        } else {
            None
        }
    }

    /// Routes one event to its channel.
    pub fn dispatch(&mut self, event: ButtonEvent, now: T::Instant) -> DispatchReport<C::Error> {
        match event {
            ButtonEvent::Pressed(ButtonChannel::Power) => self.power_pressed(event, now),
            ButtonEvent::Released(ButtonChannel::Power) => self.power_released(event, now),
            ButtonEvent::Tick => self.power_tick(event, now),
            ButtonEvent::Released(ButtonChannel::Reset) => {
                let outcome = match self.reset {
                    Some(button) => button.on_release(&mut self.control),
                    None => DispatchOutcome::Unregistered,
                };
                DispatchReport::new(event, outcome)
            }
            ButtonEvent::Released(ButtonChannel::Id) => {
                let outcome = match self.id {
                    Some(button) => button.on_release(&mut self.control),
                    None => DispatchOutcome::Unregistered,
                };
                DispatchReport::new(event, outcome)
            }
            ButtonEvent::Pressed(channel @ (ButtonChannel::Reset | ButtonChannel::Id)) => {
                let outcome = if self.is_registered(channel) {
                    DispatchOutcome::None
                } else {
                    DispatchOutcome::Unregistered
                };
                DispatchReport::new(event, outcome)
            }
        }
    }

    fn power_pressed(&mut self, event: ButtonEvent, now: T::Instant) -> DispatchReport<C::Error> {
        let Some(machine) = self.power.as_mut() else {
            return DispatchReport::new(event, DispatchOutcome::Unregistered);
        };

        // The toggle only applies to a fresh press; a press mid-sequence belongs to the machine.
        if machine.state() != PowerOpState::ButtonNotPressed {
            let step = machine.on_press(now);
            return DispatchReport::new(event, DispatchOutcome::None).with_step(&step);
        }

        match self.control.current_power_state() {
            Err(error) => {
                DispatchReport::new(event, failed(ControlOperation::QueryPowerState, error))
            }
            Ok(PowerState::Off) => DispatchReport::new(event, power_on(&mut self.control)),
            Ok(PowerState::On) => {
                let step = machine.on_press(now);
                DispatchReport::new(event, DispatchOutcome::None).with_step(&step)
            }
        }
    }

    fn power_released(&mut self, event: ButtonEvent, now: T::Instant) -> DispatchReport<C::Error> {
        let Some(machine) = self.power.as_mut() else {
            return DispatchReport::new(event, DispatchOutcome::Unregistered);
        };

        let step = machine.on_release(now);
        DispatchReport::new(event, DispatchOutcome::None).with_step(&step)
    }

    fn power_tick(&mut self, event: ButtonEvent, now: T::Instant) -> DispatchReport<C::Error> {
        let Some(machine) = self.power.as_mut() else {
            return DispatchReport::new(event, DispatchOutcome::Unregistered);
        };

        let step = machine.on_tick(now);
        let outcome = match step.action {
            ButtonAction::None => DispatchOutcome::None,
            ButtonAction::RequestHostTransition(transition) => {
                request_host(&mut self.control, transition)
            }
            ButtonAction::LongPress => long_press(&mut self.control),
        };
        DispatchReport::new(event, outcome).with_step(&step)
    }
}

fn power_on<C: ChassisControl>(control: &mut C) -> DispatchOutcome<C::Error> {
    match control.is_ready() {
        Ok(true) => request_host(control, HostTransition::On),
        Ok(false) => DispatchOutcome::Skipped(SkipReason::NotReady),
        Err(error) => failed(ControlOperation::QueryReadiness, error),
    }
}

fn long_press<C: ChassisControl>(control: &mut C) -> DispatchOutcome<C::Error> {
    match control.current_power_state() {
        Ok(PowerState::On) => {
            let transition = ChassisTransition::Off;
            match control.request_chassis_transition(transition) {
                Ok(()) => DispatchOutcome::Requested(ControlRequest::Chassis(transition)),
                Err(error) => failed(ControlOperation::RequestChassis(transition), error),
            }
        }
        Ok(PowerState::Off) => DispatchOutcome::Skipped(SkipReason::PoweredOff),
        Err(error) => failed(ControlOperation::QueryPowerState, error),
    }
}

fn request_host<C: ChassisControl>(
    control: &mut C,
    transition: HostTransition,
) -> DispatchOutcome<C::Error> {
    match control.request_host_transition(transition) {
        Ok(()) => DispatchOutcome::Requested(ControlRequest::Host(transition)),
        Err(error) => failed(ControlOperation::RequestHost(transition), error),
    }
}

const fn failed<E>(operation: ControlOperation, error: E) -> DispatchOutcome<E> {
    DispatchOutcome::Failed(ControlFailure { operation, error })
}
