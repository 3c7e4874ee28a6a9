use button_core::handler::ButtonChannel;
use embassy_stm32::exti::ExtiInput;
use embassy_time::Timer;

use crate::events::{ButtonDebouncer, ButtonSender};

const DEBOUNCE_MS: u64 = 30;

/// Forwards debounced press/release edges of one active-low button to the dispatcher.
#[embassy_executor::task(pool_size = 3)]
pub async fn run(
    channel: ButtonChannel,
    mut pin: ExtiInput<'static>,
    sender: ButtonSender<'static>,
) -> ! {
    let mut debouncer = ButtonDebouncer::new(channel);
    loop {
        pin.wait_for_any_edge().await;
        Timer::after_millis(DEBOUNCE_MS).await;
        if let Some(event) = debouncer.settle(pin.is_low()) {
            sender.send(event).await;
        }
    }
}
