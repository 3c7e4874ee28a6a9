//! STM32G0 board bindings for the chassis buttons.
//!
//! Buttons and selector lines are active-low EXTI inputs with pull-ups. The
//! carrier exposes a power-good sense line and a management-ready line, and
//! takes PWR*/RESET* requests on open-drain straps.

use button_core::control::{ChassisControl, ChassisTransition, HostTransition, PowerState};
use button_core::handler::ButtonPresence;
use button_core::selector::{LineLevel, LineReader};
use embassy_futures::select::select_array;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Output, OutputOpenDrain};

use crate::straps::{ChassisError, StrapLine, StrapRequester};

/// Buttons wired on this board revision.
pub const BOARD_BUTTONS: ButtonPresence = ButtonPresence::all();

/// Host selector lines wired on this board revision.
pub const SELECTOR_LINES: usize = 3;

/// Raw selector position to host index table.
pub const SELECTOR_MAP: &str = "1=0,2=1,4=2";

/// Chassis control backed by GPIO sense lines and the strap queue.
pub struct BoardChassis<'d> {
    power_good: Input<'d>,
    ready: Input<'d>,
    identify_led: Output<'d>,
    straps: StrapRequester<'static>,
}

impl<'d> BoardChassis<'d> {
    pub fn new(
        power_good: Input<'d>,
        ready: Input<'d>,
        identify_led: Output<'d>,
        straps: StrapRequester<'static>,
    ) -> Self {
        Self {
            power_good,
            ready,
            identify_led,
            straps,
        }
    }
}

impl ChassisControl for BoardChassis<'_> {
    type Error = ChassisError;

    fn current_power_state(&mut self) -> Result<PowerState, ChassisError> {
        Ok(PowerState::from_powered(self.power_good.is_high()))
    }

    fn is_ready(&mut self) -> Result<bool, ChassisError> {
        Ok(self.ready.is_high())
    }

    fn request_host_transition(&mut self, transition: HostTransition) -> Result<(), ChassisError> {
        self.straps.host(transition)
    }

    fn request_chassis_transition(
        &mut self,
        transition: ChassisTransition,
    ) -> Result<(), ChassisError> {
        self.straps.chassis(transition)
    }

    fn toggle_identify(&mut self) -> Result<bool, ChassisError> {
        self.identify_led.toggle();
        Ok(self.identify_led.is_set_high())
    }
}

/// Open-drain strap outputs, released (high) when idle.
pub struct StrapOutputs<'d> {
    power: OutputOpenDrain<'d>,
    reset: OutputOpenDrain<'d>,
}

impl<'d> StrapOutputs<'d> {
    pub fn new(power: OutputOpenDrain<'d>, reset: OutputOpenDrain<'d>) -> Self {
        Self { power, reset }
    }

    fn output_mut(&mut self, line: StrapLine) -> &mut OutputOpenDrain<'d> {
        match line {
            StrapLine::Power => &mut self.power,
            StrapLine::Reset => &mut self.reset,
        }
    }

    pub fn assert(&mut self, line: StrapLine) {
        self.output_mut(line).set_low();
    }

    pub fn release(&mut self, line: StrapLine) {
        self.output_mut(line).set_high();
    }
}

/// Selector inputs; a low pin reads as an asserted line.
pub struct SelectorPins<'d, const N: usize> {
    pins: [ExtiInput<'d>; N],
}

impl<'d, const N: usize> SelectorPins<'d, N> {
    pub fn new(pins: [ExtiInput<'d>; N]) -> Self {
        Self { pins }
    }

    /// Waits for an edge on any line and returns its index.
    pub async fn wait_for_edge(&mut self) -> usize {
        let edges = self.pins.each_mut().map(|pin| pin.wait_for_any_edge());
        let ((), line) = select_array(edges).await;
        line
    }
}

impl<const N: usize> LineReader for SelectorPins<'_, N> {
    type Error = core::convert::Infallible;

    fn line_count(&self) -> usize {
        N
    }

    fn read_level(&mut self, line: usize) -> Result<LineLevel, Self::Error> {
        Ok(LineLevel::from_asserted(self.pins[line].is_low()))
    }
}
