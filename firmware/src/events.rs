//! Queues and shared cells linking the firmware tasks.

use button_core::handler::{ButtonChannel, ButtonEvent};
use button_core::selector::{
    HostSelection, HostSelectorDecoder, HostSelectorPosition, LineReader, PositionMap,
    SelectionPublisher,
};
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use portable_atomic::{AtomicU8, AtomicU32, Ordering};

use crate::telemetry;

/// Depth of the edge queue between the button tasks and the dispatcher.
pub const BUTTON_QUEUE_DEPTH: usize = 8;

#[cfg(target_os = "none")]
pub type TaskMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type TaskMutex = NoopRawMutex;

/// Queue carrying button edges to the dispatcher.
pub type ButtonQueue = Channel<TaskMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;

pub type ButtonSender<'a> = Sender<'a, TaskMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;

pub type ButtonReceiver<'a> = Receiver<'a, TaskMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;

const UNSET: u32 = u32::MAX;
const NO_REMAP: u32 = u32::MAX - 1;

/// Last selector position and published host, shared with the dispatcher's status line.
pub struct SelectorCell {
    position: AtomicU8,
    published: AtomicU32,
}

impl SelectorCell {
    pub const fn new() -> Self {
        Self {
            position: AtomicU8::new(0),
            published: AtomicU32::new(UNSET),
        }
    }

    pub fn store_position(&self, position: HostSelectorPosition) {
        self.position.store(position, Ordering::Relaxed);
    }

    pub fn position(&self) -> HostSelectorPosition {
        self.position.load(Ordering::Relaxed)
    }

    pub fn store_published(&self, selection: HostSelection) {
        let code = match selection {
            HostSelection::Host(index) => u32::try_from(index).unwrap_or(NO_REMAP).min(NO_REMAP),
            HostSelection::NoRemap => NO_REMAP,
        };
        self.published.store(code, Ordering::Relaxed);
    }

    /// Most recently published selection, `None` before the first publication.
    pub fn published(&self) -> Option<HostSelection> {
        match self.published.load(Ordering::Relaxed) {
            UNSET => None,
            NO_REMAP => Some(HostSelection::NoRemap),
            code => usize::try_from(code).ok().map(HostSelection::Host),
        }
    }
}

impl Default for SelectorCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes selections into a [`SelectorCell`] and logs them.
pub struct SelectionLatch<'a> {
    cell: &'a SelectorCell,
}

impl<'a> SelectionLatch<'a> {
    pub const fn new(cell: &'a SelectorCell) -> Self {
        Self { cell }
    }
}

impl SelectionPublisher for SelectionLatch<'_> {
    fn publish(&mut self, selection: HostSelection) {
        self.cell.store_published(selection);
        telemetry::log_host_published(selection);
    }
}

/// Turns pin levels sampled after the debounce delay into press/release edges.
///
/// A sample equal to the last reported level is bounce and produces nothing.
pub struct ButtonDebouncer {
    channel: ButtonChannel,
    pressed: bool,
}

impl ButtonDebouncer {
    pub const fn new(channel: ButtonChannel) -> Self {
        Self {
            channel,
            pressed: false,
        }
    }

    pub fn settle(&mut self, pressed: bool) -> Option<ButtonEvent> {
        if pressed == self.pressed {
            return None;
        }
        self.pressed = pressed;
        Some(if pressed {
            ButtonEvent::Pressed(self.channel)
        } else {
            ButtonEvent::Released(self.channel)
        })
    }
}

/// Builds the selector decoder and publishes the start-up position.
///
/// # Panics
///
/// Panics after logging when the wiring is rejected or a line cannot be read,
/// since no safe default position exists.
pub fn start_selector<R>(
    reader: R,
    cell: &SelectorCell,
    map: PositionMap,
) -> (HostSelectorDecoder<R, SelectionLatch<'_>>, HostSelection)
where
    R: LineReader,
    R::Error: core::fmt::Debug,
{
    let mut decoder = match HostSelectorDecoder::new(reader, SelectionLatch::new(cell), map) {
        Ok(decoder) => decoder,
        Err(error) => {
            telemetry::log_selector_failure(&error);
            panic!("selector decoder rejected board wiring");
        }
    };

    match decoder.initialize() {
        Ok(selection) => {
            cell.store_position(decoder.position());
            (decoder, selection)
        }
        Err(error) => {
            telemetry::log_selector_failure(&error);
            panic!("selector lines unreadable at start-up");
        }
    }
}
