use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, OutputOpenDrain, Pull, Speed};

use button_core::handler::{ButtonChannel, ButtonHandler};
use button_core::power::PowerButtonTimings;

use crate::clock::ButtonTimer;
use crate::events::{ButtonQueue, SelectorCell};
use crate::hw::{self, BoardChassis, SelectorPins, StrapOutputs};
use crate::straps::{StrapQueue, StrapRequester};

mod button_task;
mod dispatch_task;
mod selector_task;
mod strap_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static BUTTON_QUEUE: ButtonQueue = ButtonQueue::new();
pub(super) static STRAP_QUEUE: StrapQueue = StrapQueue::new();
pub(super) static SELECTOR_STATE: SelectorCell = SelectorCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA3,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PB3,
        PB4,
        PB5,
        EXTI0,
        EXTI1,
        EXTI3,
        EXTI4,
        EXTI5,
        EXTI6,
        ..
    } = hal::init(config);

    let straps = StrapOutputs::new(
        OutputOpenDrain::new(PA4, Level::High, Speed::Low),
        OutputOpenDrain::new(PA3, Level::High, Speed::Low),
    );
    spawner
        .spawn(strap_task::run(straps, STRAP_QUEUE.receiver()))
        .expect("failed to spawn strap task");

    let chassis = BoardChassis::new(
        Input::new(PA7, Pull::Down),
        Input::new(PA8, Pull::Down),
        Output::new(PA5, Level::Low, Speed::Low),
        StrapRequester::new(STRAP_QUEUE.sender()),
    );
    let mut presence = hw::BOARD_BUTTONS;
    let handler = ButtonHandler::probe(
        chassis,
        &mut presence,
        PowerButtonTimings::default(),
        ButtonTimer::new(),
    )
    .expect("power button timings are valid");

    spawner
        .spawn(dispatch_task::run(handler, BUTTON_QUEUE.receiver()))
        .expect("failed to spawn dispatch task");

    if presence.power {
        spawner
            .spawn(button_task::run(
                ButtonChannel::Power,
                ExtiInput::new(PA0, EXTI0, Pull::Up),
                BUTTON_QUEUE.sender(),
            ))
            .expect("failed to spawn power button task");
    }
    if presence.reset {
        spawner
            .spawn(button_task::run(
                ButtonChannel::Reset,
                ExtiInput::new(PA1, EXTI1, Pull::Up),
                BUTTON_QUEUE.sender(),
            ))
            .expect("failed to spawn reset button task");
    }
    if presence.id {
        spawner
            .spawn(button_task::run(
                ButtonChannel::Id,
                ExtiInput::new(PA6, EXTI6, Pull::Up),
                BUTTON_QUEUE.sender(),
            ))
            .expect("failed to spawn id button task");
    }

    let selector = SelectorPins::<{ hw::SELECTOR_LINES }>::new([
        ExtiInput::new(PB3, EXTI3, Pull::Up),
        ExtiInput::new(PB4, EXTI4, Pull::Up),
        ExtiInput::new(PB5, EXTI5, Pull::Up),
    ]);
    spawner
        .spawn(selector_task::run(selector, &SELECTOR_STATE))
        .expect("failed to spawn selector task");

    core::future::pending::<()>().await;
}
