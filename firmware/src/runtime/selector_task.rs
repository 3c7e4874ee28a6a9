use button_core::config::parse_position_map;
use button_core::telemetry::TelemetryEventKind;

use crate::clock::FirmwareInstant;
use crate::events::{self, SelectorCell};
use crate::hw::{self, SelectorPins};
use crate::telemetry::FirmwareTelemetry;

/// Owns the selector pins: publishes the start-up position, then one update per edge.
#[embassy_executor::task]
pub async fn run(
    pins: SelectorPins<'static, { hw::SELECTOR_LINES }>,
    state: &'static SelectorCell,
) -> ! {
    let map = parse_position_map(hw::SELECTOR_MAP).expect("selector map is well formed");
    let (mut decoder, selection) = events::start_selector(pins, state, map);

    let mut telemetry = FirmwareTelemetry::new();
    telemetry.record(
        TelemetryEventKind::SelectorInitialized {
            position: decoder.position(),
            selection,
        },
        FirmwareInstant::now(),
    );

    loop {
        let line = decoder.reader_mut().wait_for_edge().await;
        let outcome = decoder.on_line_event(line);
        state.store_position(decoder.position());
        telemetry.record_selector_edge(&outcome, FirmwareInstant::now());
    }
}
