//! Controller configuration and the compact position-map syntax.
//!
//! The map is written as comma-separated `<raw>=<index>` pairs, for example
//! `"0=0, 1=2, 3=1"`. Whitespace around tokens is ignored and an empty string
//! yields an empty map.

use core::fmt;

use winnow::ascii::{dec_uint, digit1, space0};
use winnow::combinator::{delimited, separated_pair};
use winnow::error::{ContextError, ErrMode, ModalResult};
use winnow::prelude::*;

use crate::power::{PowerButtonTimings, TimingError};
use crate::selector::{MAX_SELECTOR_LINES, PositionMap, PositionMapError};

/// Configuration errors, with byte offsets into the source text where relevant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Position map text is malformed at `offset`.
    Syntax { offset: usize },
    /// Position map entry at `offset` was rejected.
    Map {
        offset: usize,
        error: PositionMapError,
    },
    Timing(TimingError),
    TooManyLines { count: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Syntax { offset } => {
                write!(f, "position map syntax error at byte {offset}")
            }
            ConfigError::Map { offset, error } => {
                write!(f, "position map entry at byte {offset}: {error}")
            }
            ConfigError::Timing(error) => error.fmt(f),
            ConfigError::TooManyLines { count } => write!(
                f,
                "{count} selector lines configured, at most {MAX_SELECTOR_LINES} supported"
            ),
        }
    }
}

impl From<TimingError> for ConfigError {
    fn from(error: TimingError) -> Self {
        ConfigError::Timing(error)
    }
}

/// Runtime configuration for the button handler and selector decoder.
#[derive(Clone, Debug, Default)]
pub struct ButtonConfig {
    pub timings: PowerButtonTimings,
    pub selector_lines: usize,
    pub position_map: PositionMap,
}

impl ButtonConfig {
    /// Default timings, no selector lines, and an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timings(mut self, timings: PowerButtonTimings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn with_selector_lines(mut self, lines: usize) -> Self {
        self.selector_lines = lines;
        self
    }

    #[must_use]
    pub fn with_position_map(mut self, map: PositionMap) -> Self {
        self.position_map = map;
        self
    }

    /// Checks the timing constants and the selector line count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timings.validate()?;
        if self.selector_lines > MAX_SELECTOR_LINES {
            return Err(ConfigError::TooManyLines {
                count: self.selector_lines,
            });
        }
        Ok(())
    }
}

/// Parses the compact `<raw>=<index>,...` position-map syntax.
pub fn parse_position_map(text: &str) -> Result<PositionMap, ConfigError> {
    let mut input = text;
    let mut map = PositionMap::new();

    skip_space(&mut input);
    if input.is_empty() {
        return Ok(map);
    }

    loop {
        let entry_offset = offset_of(text, input);
        let (key, index) = entry.parse_next(&mut input).map_err(|_| ConfigError::Syntax {
            offset: offset_of(text, input),
        })?;
        map.insert(key, index).map_err(|error| ConfigError::Map {
            offset: entry_offset,
            error,
        })?;

        if input.is_empty() {
            return Ok(map);
        }

        ','.parse_next(&mut input)
            .map_err(|_: ErrMode<ContextError>| ConfigError::Syntax {
                offset: offset_of(text, input),
            })?;
    }
}

fn entry<'i>(input: &mut &'i str) -> ModalResult<(&'i str, usize)> {
    separated_pair(
        delimited(space0, digit1, space0),
        '=',
        delimited(space0, dec_uint::<_, usize, _>, space0),
    )
    .parse_next(input)
}

fn skip_space(input: &mut &str) {
    let _: ModalResult<&str> = space0.parse_next(input);
}

fn offset_of(source: &str, rest: &str) -> usize {
    source.len() - rest.len()
}
