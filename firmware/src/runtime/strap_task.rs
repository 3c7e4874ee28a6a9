use embassy_time::Timer;

use crate::hw::StrapOutputs;
use crate::straps::StrapReceiver;
use crate::telemetry;

#[embassy_executor::task]
pub async fn run(mut outputs: StrapOutputs<'static>, receiver: StrapReceiver<'static>) -> ! {
    loop {
        let pulse = receiver.receive().await;
        telemetry::log_strap_pulse(pulse);
        outputs.assert(pulse.line);
        Timer::after(pulse.hold).await;
        outputs.release(pulse.line);
    }
}
