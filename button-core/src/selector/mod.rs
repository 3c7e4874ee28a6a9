//! Host selector decoder.
//!
//! Each selector line contributes one bit of a position code. Lines change
//! independently, so the decoder keeps the aggregate position and updates a
//! single bit per edge. After every update the position is looked up in a
//! [`PositionMap`] keyed by its decimal form; hits are published as the
//! selected host, misses fall back to the platform default.

use core::fmt::{self, Write as _};

use heapless::{LinearMap, String};

/// Maximum number of selector lines; one bit each in a `u8` position.
pub const MAX_SELECTOR_LINES: usize = 8;
/// Maximum number of position map entries.
pub const MAX_MAP_ENTRIES: usize = 16;
/// Maximum length of a position key (`"255"`).
pub const MAX_KEY_LEN: usize = 3;

/// Aggregate bit pattern read from the selector lines.
pub type HostSelectorPosition = u8;

/// Logical level reported for a selector line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineLevel {
    Assert,
    Deassert,
}

impl LineLevel {
    /// Returns `true` when the line is asserted.
    #[must_use]
    pub const fn is_asserted(self) -> bool {
        matches!(self, LineLevel::Assert)
    }

    /// Helper converting a boolean asserted flag into a [`LineLevel`].
    #[must_use]
    pub const fn from_asserted(asserted: bool) -> Self {
        if asserted {
            LineLevel::Assert
        } else {
            LineLevel::Deassert
        }
    }
}

impl fmt::Display for LineLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LineLevel::Assert => "assert",
            LineLevel::Deassert => "deassert",
        })
    }
}

/// Outcome of mapping a position through the [`PositionMap`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostSelection {
    /// Adjusted host index.
    Host(usize),
    /// No explicit mapping; the platform keeps its default host.
    NoRemap,
}

impl fmt::Display for HostSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostSelection::Host(index) => write!(f, "{index}"),
            HostSelection::NoRemap => f.write_str("no-remap"),
        }
    }
}

/// Errors raised while building a [`PositionMap`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PositionMapError {
    /// Keys must be non-empty decimal strings.
    InvalidKey,
    /// Key longer than [`MAX_KEY_LEN`].
    KeyTooLong,
    /// Key already present.
    DuplicateKey,
    /// Map holds [`MAX_MAP_ENTRIES`] entries already.
    Full,
}

impl fmt::Display for PositionMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionMapError::InvalidKey => f.write_str("position key must be decimal digits"),
            PositionMapError::KeyTooLong => {
                write!(f, "position key longer than {MAX_KEY_LEN} digits")
            }
            PositionMapError::DuplicateKey => f.write_str("duplicate position key"),
            PositionMapError::Full => write!(f, "position map holds {MAX_MAP_ENTRIES} entries"),
        }
    }
}

/// Raw position string to adjusted host index table.
#[derive(Clone, Debug, Default)]
pub struct PositionMap {
    entries: LinearMap<String<MAX_KEY_LEN>, usize, MAX_MAP_ENTRIES>,
}

impl PositionMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: LinearMap::new(),
        }
    }

    /// Adds a mapping from the decimal key to `index`.
    pub fn insert(&mut self, key: &str, index: usize) -> Result<(), PositionMapError> {
        if key.is_empty() || !key.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(PositionMapError::InvalidKey);
        }

        let mut owned = String::new();
        owned
            .push_str(key)
            .map_err(|_| PositionMapError::KeyTooLong)?;

        if self.entries.contains_key(&owned) {
            return Err(PositionMapError::DuplicateKey);
        }

        self.entries
            .insert(owned, index)
            .map(|_| ())
            .map_err(|_| PositionMapError::Full)
    }

    /// Adds a mapping for a numeric position.
    pub fn insert_position(
        &mut self,
        position: HostSelectorPosition,
        index: usize,
    ) -> Result<(), PositionMapError> {
        let key = position_key(position).ok_or(PositionMapError::KeyTooLong)?;
        self.insert(&key, index)
    }

    /// Looks up `position` by its decimal form.
    #[must_use]
    pub fn lookup(&self, position: HostSelectorPosition) -> HostSelection {
        position_key(position)
            .and_then(|key| self.entries.get(&key).copied())
            .map_or(HostSelection::NoRemap, HostSelection::Host)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, index)` pairs.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(key, index)| (key.as_str(), *index))
    }
}

fn position_key(position: HostSelectorPosition) -> Option<String<MAX_KEY_LEN>> {
    let mut key = String::new();
    write!(key, "{position}").ok()?;
    Some(key)
}

/// Platform access to the selector lines.
pub trait LineReader {
    type Error: fmt::Debug;

    /// Number of lines wired on this platform.
    fn line_count(&self) -> usize;

    /// Reads the current level of `line`.
    fn read_level(&mut self, line: usize) -> Result<LineLevel, Self::Error>;
}

/// Receiver of host selection changes.
pub trait SelectionPublisher {
    fn publish(&mut self, selection: HostSelection);
}

/// Selector setup and initialization failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SelectorError<E> {
    /// Reader exposes more lines than fit in the position.
    TooManyLines { count: usize },
    /// A line could not be read during initialization.
    Read { line: usize, error: E },
}

impl<E: fmt::Debug> fmt::Display for SelectorError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::TooManyLines { count } => write!(
                f,
                "{count} selector lines configured, at most {MAX_SELECTOR_LINES} supported"
            ),
            SelectorError::Read { line, error } => {
                write!(f, "selector line {line} read failed: {error:?}")
            }
        }
    }
}

/// Result of processing a single line edge at runtime.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeOutcome<E> {
    /// Position mapped to a host index, which was published.
    Published {
        position: HostSelectorPosition,
        host: usize,
    },
    /// Position has no mapping; nothing was published.
    Unmapped { position: HostSelectorPosition },
    /// Edge referenced a line outside the configured range.
    UnknownLine { line: usize },
    /// Reading the line failed; the previous bit is kept.
    ReadFailed { line: usize, error: E },
}

/// Incrementally decodes selector lines into a published host selection.
pub struct HostSelectorDecoder<R, P> {
    reader: R,
    publisher: P,
    map: PositionMap,
    position: HostSelectorPosition,
}

impl<R, P> HostSelectorDecoder<R, P>
where
    R: LineReader,
    P: SelectionPublisher,
{
    /// Creates a decoder with an all-zero position.
    pub fn new(reader: R, publisher: P, map: PositionMap) -> Result<Self, SelectorError<R::Error>> {
        let count = reader.line_count();
        if count > MAX_SELECTOR_LINES {
            return Err(SelectorError::TooManyLines { count });
        }

        Ok(Self {
            reader,
            publisher,
            map,
            position: 0,
        })
    }

    /// Reads every line once and publishes the result even when it is unmapped.
    ///
    /// A read failure aborts initialization because no safe default position exists.
    pub fn initialize(&mut self) -> Result<HostSelection, SelectorError<R::Error>> {
        let mut position = 0;
        for line in 0..self.reader.line_count() {
            let level = self
                .reader
                .read_level(line)
                .map_err(|error| SelectorError::Read { line, error })?;
            position = apply_level(position, line, level);
        }

        self.position = position;
        let selection = self.map.lookup(position);
        self.publisher.publish(selection);
        Ok(selection)
    }

    /// Applies an edge with a known level.
    pub fn on_line_edge(&mut self, line: usize, level: LineLevel) -> EdgeOutcome<R::Error> {
        if line >= self.reader.line_count() {
            return EdgeOutcome::UnknownLine { line };
        }

        self.position = apply_level(self.position, line, level);
        match self.map.lookup(self.position) {
            HostSelection::Host(host) => {
                self.publisher.publish(HostSelection::Host(host));
                EdgeOutcome::Published {
                    position: self.position,
                    host,
                }
            }
            HostSelection::NoRemap => EdgeOutcome::Unmapped {
                position: self.position,
            },
        }
    }

    /// Reads the current level of `line` and applies it.
    pub fn on_line_event(&mut self, line: usize) -> EdgeOutcome<R::Error> {
        if line >= self.reader.line_count() {
            return EdgeOutcome::UnknownLine { line };
        }

        match self.reader.read_level(line) {
            Ok(level) => self.on_line_edge(line, level),
            Err(error) => EdgeOutcome::ReadFailed { line, error },
        }
    }

    /// Current aggregate position.
    #[must_use]
    pub fn position(&self) -> HostSelectorPosition {
        self.position
    }

    /// Mapping of the current position.
    #[must_use]
    pub fn selection(&self) -> HostSelection {
        self.map.lookup(self.position)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.reader.line_count()
    }

    #[must_use]
    pub fn map(&self) -> &PositionMap {
        &self.map
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    #[must_use]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

fn apply_level(
    position: HostSelectorPosition,
    line: usize,
    level: LineLevel,
) -> HostSelectorPosition {
    let mask = 1u8 << line;
    match level {
        LineLevel::Assert => position | mask,
        LineLevel::Deassert => position & !mask,
    }
}
