//! Telemetry ring and logging helpers.
//!
//! Wraps the shared [`TelemetryRecorder`] with the firmware clock and mirrors
//! every recorded event to defmt on the target (stdout on host builds) so
//! button activity is visible over RTT during bring-up.

use core::fmt::Write as _;

use button_core::handler::DispatchReport;
use button_core::repl::status::{StatusFormatter, StatusSnapshot};
use button_core::selector::{EdgeOutcome, HostSelection, SelectorError};
use button_core::telemetry::{EventId, TelemetryEventKind, TelemetryRecorder};
use heapless::String;

use crate::clock::FirmwareInstant;
use crate::straps::StrapPulse;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

const STATUS_LINE_CAPACITY: usize = 96;

/// Records button and selector telemetry and logs each entry as it lands.
pub struct FirmwareTelemetry {
    recorder: TelemetryRecorder<FirmwareInstant, TELEMETRY_RING_CAPACITY>,
}

impl FirmwareTelemetry {
    pub const fn new() -> Self {
        Self {
            recorder: TelemetryRecorder::new(),
        }
    }

    pub fn recorder(&self) -> &TelemetryRecorder<FirmwareInstant, TELEMETRY_RING_CAPACITY> {
        &self.recorder
    }

    pub fn record(&mut self, event: TelemetryEventKind, timestamp: FirmwareInstant) -> EventId {
        let id = self.recorder.record(event, timestamp);
        log_event(id, timestamp, event);
        id
    }

    /// Records a dispatch report; quiet reports leave no trace.
    pub fn record_dispatch<E>(&mut self, report: &DispatchReport<E>, timestamp: FirmwareInstant) {
        let written = self.recorder.record_dispatch(report, timestamp);
        self.log_latest(written);
    }

    pub fn record_selector_edge<E>(&mut self, outcome: &EdgeOutcome<E>, timestamp: FirmwareInstant) {
        self.recorder.record_selector_edge(outcome, timestamp);
        self.log_latest(1);
    }

    fn log_latest(&self, count: usize) {
        let skip = self.recorder.len().saturating_sub(count);
        for record in self.recorder.oldest_first().skip(skip) {
            log_event(record.id, record.timestamp, record.event);
        }
    }
}

impl Default for FirmwareTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs the four status lines for `snapshot`.
pub fn log_status(snapshot: &StatusSnapshot) {
    let formatter = StatusFormatter::new(snapshot);
    let mut line: String<STATUS_LINE_CAPACITY> = String::new();

    let result = formatter.write_power_button_line(&mut line);
    flush_status(&mut line, result);
    let result = formatter.write_channels_line(&mut line);
    flush_status(&mut line, result);
    let result = formatter.write_chassis_line(&mut line);
    flush_status(&mut line, result);
    let result = formatter.write_selector_line(&mut line);
    flush_status(&mut line, result);
}

fn flush_status(line: &mut String<STATUS_LINE_CAPACITY>, result: core::fmt::Result) {
    if result.is_err() {
        let _ = line.push_str("...");
    }
    emit_status(line.as_str());
    line.clear();
}

pub fn log_host_published(selection: HostSelection) {
    let mut line: String<32> = String::new();
    let _ = write!(line, "{selection}");
    emit_published(line.as_str());
}

pub fn log_selector_failure<E: core::fmt::Debug>(error: &SelectorError<E>) {
    match error {
        SelectorError::TooManyLines { count } => emit_selector_failure("too-many-lines", *count),
        SelectorError::Read { line, .. } => emit_selector_failure("read-failed", *line),
    }
}

pub fn log_strap_pulse(pulse: StrapPulse) {
    emit_strap_pulse(pulse.line.label(), pulse.hold.as_millis());
}

fn log_event(id: EventId, timestamp: FirmwareInstant, event: TelemetryEventKind) {
    let mut line: String<STATUS_LINE_CAPACITY> = String::new();
    if write!(line, "{event}").is_err() {
        let _ = line.push_str("...");
    }
    emit_event(id, timestamp.as_millis(), line.as_str());
}

#[cfg(target_os = "none")]
fn emit_event(id: EventId, timestamp_ms: u64, event: &str) {
    defmt::info!("telemetry #{} t={}ms {}", id, timestamp_ms, event);
}

#[cfg(not(target_os = "none"))]
fn emit_event(id: EventId, timestamp_ms: u64, event: &str) {
    println!("telemetry #{id} t={timestamp_ms}ms {event}");
}

#[cfg(target_os = "none")]
fn emit_status(line: &str) {
    defmt::info!("status: {}", line);
}

#[cfg(not(target_os = "none"))]
fn emit_status(line: &str) {
    println!("status: {line}");
}

#[cfg(target_os = "none")]
fn emit_published(selection: &str) {
    defmt::info!("selector: published host={}", selection);
}

#[cfg(not(target_os = "none"))]
fn emit_published(selection: &str) {
    println!("selector: published host={selection}");
}

#[cfg(target_os = "none")]
fn emit_selector_failure(reason: &str, value: usize) {
    defmt::error!("selector: startup failed {} ({})", reason, value);
}

#[cfg(not(target_os = "none"))]
fn emit_selector_failure(reason: &str, value: usize) {
    println!("selector: startup failed {reason} ({value})");
}

#[cfg(target_os = "none")]
fn emit_strap_pulse(line: &str, hold_ms: u64) {
    defmt::info!("straps: pulse {} hold={}ms", line, hold_ms);
}

#[cfg(not(target_os = "none"))]
fn emit_strap_pulse(line: &str, hold_ms: u64) {
    println!("straps: pulse {line} hold={hold_ms}ms");
}
