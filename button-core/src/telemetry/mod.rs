//! Telemetry ring shared by firmware and host targets.
//!
//! Dispatch reports and selector outcomes are flattened into
//! [`TelemetryEventKind`] records and kept in a fixed-capacity
//! [`HistoryBuf`], so the most recent activity can be inspected from the
//! console without any allocation.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::handler::{
    ButtonChannel, ButtonEvent, ControlOperation, ControlRequest, DispatchOutcome,
    DispatchReport, SkipReason,
};
use crate::power::PowerOpState;
use crate::selector::{EdgeOutcome, HostSelection, HostSelectorPosition};

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Monotonic identifier assigned to each record; wraps on overflow.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    ButtonPressed(ButtonChannel),
    ButtonReleased(ButtonChannel),
    PowerStateChanged {
        from: PowerOpState,
        to: PowerOpState,
    },
    RequestIssued(ControlRequest),
    RequestSkipped(SkipReason),
    ControlFailed(ControlOperation),
    UnregisteredChannel(ButtonChannel),
    SelectorInitialized {
        position: HostSelectorPosition,
        selection: HostSelection,
    },
    SelectorPublished {
        position: HostSelectorPosition,
        host: usize,
    },
    SelectorUnmapped {
        position: HostSelectorPosition,
    },
    SelectorReadFailed {
        line: usize,
    },
    SelectorUnknownLine {
        line: usize,
    },
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::ButtonPressed(channel) => write!(f, "button-pressed {channel}"),
            TelemetryEventKind::ButtonReleased(channel) => write!(f, "button-released {channel}"),
            TelemetryEventKind::PowerStateChanged { from, to } => {
                write!(f, "power-state {from} -> {to}")
            }
            TelemetryEventKind::RequestIssued(request) => write!(f, "request-issued {request}"),
            TelemetryEventKind::RequestSkipped(reason) => write!(f, "request-skipped {reason}"),
            TelemetryEventKind::ControlFailed(operation) => {
                write!(f, "control-failed {operation}")
            }
            TelemetryEventKind::UnregisteredChannel(channel) => {
                write!(f, "unregistered-channel {channel}")
            }
            TelemetryEventKind::SelectorInitialized {
                position,
                selection,
            } => write!(f, "selector-initialized position={position:#010b} host={selection}"),
            TelemetryEventKind::SelectorPublished { position, host } => {
                write!(f, "selector-published position={position:#010b} host={host}")
            }
            TelemetryEventKind::SelectorUnmapped { position } => {
                write!(f, "selector-unmapped position={position:#010b}")
            }
            TelemetryEventKind::SelectorReadFailed { line } => {
                write!(f, "selector-read-failed line={line}")
            }
            TelemetryEventKind::SelectorUnknownLine { line } => {
                write!(f, "selector-unknown-line line={line}")
            }
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });

        id
    }

    /// Records the edge, state change, and outcome of a dispatch. Quiet ticks record nothing.
    ///
    /// Returns the number of records written.
    pub fn record_dispatch<E>(&mut self, report: &DispatchReport<E>, timestamp: TInstant) -> usize {
        let edge = match report.event {
            ButtonEvent::Pressed(channel) => Some(TelemetryEventKind::ButtonPressed(channel)),
            ButtonEvent::Released(channel) => Some(TelemetryEventKind::ButtonReleased(channel)),
            ButtonEvent::Tick => None,
        };

        let change = report
            .state_change
            .map(|change| TelemetryEventKind::PowerStateChanged {
                from: change.from,
                to: change.to,
            });

        let outcome = match &report.outcome {
            DispatchOutcome::None => None,
            DispatchOutcome::Requested(request) => Some(TelemetryEventKind::RequestIssued(*request)),
            DispatchOutcome::Skipped(reason) => Some(TelemetryEventKind::RequestSkipped(*reason)),
            DispatchOutcome::Failed(failure) => {
                Some(TelemetryEventKind::ControlFailed(failure.operation))
            }
            DispatchOutcome::Unregistered => Some(TelemetryEventKind::UnregisteredChannel(
                report.event.channel(),
            )),
        };

        let mut written = 0;
        for event in [edge, change, outcome].into_iter().flatten() {
            self.record(event, timestamp);
            written += 1;
        }
        written
    }

    /// Records a runtime selector edge outcome.
    pub fn record_selector_edge<E>(&mut self, outcome: &EdgeOutcome<E>, timestamp: TInstant) -> EventId {
        let event = match outcome {
            EdgeOutcome::Published { position, host } => TelemetryEventKind::SelectorPublished {
                position: *position,
                host: *host,
            },
            EdgeOutcome::Unmapped { position } => TelemetryEventKind::SelectorUnmapped {
                position: *position,
            },
            EdgeOutcome::UnknownLine { line } => {
                TelemetryEventKind::SelectorUnknownLine { line: *line }
            }
            EdgeOutcome::ReadFailed { line, .. } => {
                TelemetryEventKind::SelectorReadFailed { line: *line }
            }
        };
        self.record(event, timestamp)
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
