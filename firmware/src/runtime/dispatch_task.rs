use button_core::control::ChassisControl;
use button_core::handler::ButtonHandler;
use button_core::repl::status::{PowerButtonSnapshot, SelectorSnapshot, StatusSnapshot};
use button_core::selector::HostSelection;
use embassy_futures::select::{Either, select};
use embassy_time::Timer;

use super::SELECTOR_STATE;
use crate::clock::{ButtonTimer, FirmwareInstant};
use crate::events::ButtonReceiver;
use crate::hw::{self, BoardChassis};
use crate::telemetry::{self, FirmwareTelemetry};

pub type BoardHandler = ButtonHandler<BoardChassis<'static>, ButtonTimer>;

/// Single consumer of button edges and power-button timer fires.
#[embassy_executor::task]
pub async fn run(mut handler: BoardHandler, receiver: ButtonReceiver<'static>) -> ! {
    let mut telemetry = FirmwareTelemetry::new();

    loop {
        let event = match handler.next_fire() {
            Some(fire) => match select(receiver.receive(), Timer::at(fire.into_embassy())).await {
                Either::First(event) => Some(event),
                Either::Second(()) => None,
            },
            None => Some(receiver.receive().await),
        };

        let now = FirmwareInstant::now();
        let report = match event {
            Some(event) => Some(handler.dispatch(event, now)),
            None => handler.poll_timer(now),
        };

        if let Some(report) = report.filter(|report| !report.is_quiet()) {
            telemetry.record_dispatch(&report, now);
            if report.state_change.is_some() {
                telemetry::log_status(&snapshot(&mut handler, now));
            }
        }
    }
}

fn snapshot(handler: &mut BoardHandler, now: FirmwareInstant) -> StatusSnapshot {
    let mut snapshot = StatusSnapshot::unknown();
    snapshot.power_button = handler.power_machine().map(|machine| PowerButtonSnapshot {
        state: machine.state(),
        remaining: machine.remaining(now),
    });
    for (channel, registered) in &mut snapshot.registered {
        *registered = handler.is_registered(*channel);
    }
    snapshot.chassis = handler.control_mut().current_power_state().ok();
    snapshot.selector = Some(SelectorSnapshot {
        lines: hw::SELECTOR_LINES,
        position: SELECTOR_STATE.position(),
        selection: SELECTOR_STATE.published().unwrap_or(HostSelection::NoRemap),
    });
    snapshot
}
