//! Lexer and parser for the controller console.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` parsers over those tokens to build structured command
//! values. Keywords are matched case-insensitively.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::error::ErrMode;
use winnow::prelude::*;

use crate::control::PowerState;
use crate::handler::ButtonChannel;
use crate::selector::LineLevel;

/// Maximum number of tokens produced per console line. Commands remain short and bounded.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

type GrammarResult<'src, T> = Result<T, ErrMode<GrammarError<'src>>>;

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Press edge on a button channel.
    Press(ButtonChannel),
    /// Release edge on a button channel.
    Release(ButtonChannel),
    /// Move the clock forward.
    Advance(Duration),
    /// Drive a selector line.
    Line(LineCommand),
    /// Force the reported chassis power state.
    Chassis(PowerState),
    /// Set the management readiness flag.
    Ready(bool),
    Status,
    History,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineCommand {
    pub index: u8,
    pub level: LineLevel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CommandTag {
    Press,
    Release,
    Advance,
    Line,
    Chassis,
    Ready,
    Status,
    History,
    Help,
}

const COMMANDS: &[(&str, CommandTag)] = &[
    ("press", CommandTag::Press),
    ("release", CommandTag::Release),
    ("advance", CommandTag::Advance),
    ("line", CommandTag::Line),
    ("chassis", CommandTag::Chassis),
    ("ready", CommandTag::Ready),
    ("status", CommandTag::Status),
    ("history", CommandTag::History),
    ("help", CommandTag::Help),
];

const CHANNELS: &[(&str, ButtonChannel)] = &[
    ("power", ButtonChannel::Power),
    ("reset", ButtonChannel::Reset),
    ("id", ButtonChannel::Id),
];

const LEVELS: &[(&str, LineLevel)] = &[
    ("assert", LineLevel::Assert),
    ("deassert", LineLevel::Deassert),
];

const POWER_STATES: &[(&str, PowerState)] = &[("on", PowerState::On), ("off", PowerState::Off)];

const READINESS: &[(&str, bool)] = &[("yes", true), ("no", false)];

/// Command keywords accepted by the console, in help order.
#[must_use]
pub fn command_keywords() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|(name, _)| *name)
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(&mut buffer, record.token, lexeme, span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, span)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::TooManyTokens {
            processed: buffer.len() + 1,
        })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let mut rest = tokens.as_slice();
    let command = match command.parse_next(&mut rest) {
        Ok(command) => command,
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => {
            return Err(ParseError::Grammar(err));
        }
        Err(ErrMode::Incomplete(_)) => {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "token",
                rest.first(),
            )));
        }
    };

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src>(input: &mut Input<'src, '_>) -> GrammarResult<'src, Command<'src>> {
    let tag = keyword(COMMANDS, "command keyword").parse_next(input)?;

    match tag {
        CommandTag::Press => keyword(CHANNELS, "power, reset, or id")
            .map(Command::Press)
            .parse_next(input),
        CommandTag::Release => keyword(CHANNELS, "power, reset, or id")
            .map(Command::Release)
            .parse_next(input),
        CommandTag::Advance => {
            let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
            parse_duration(&token)
                .map(Command::Advance)
                .map_err(ErrMode::Cut)
        }
        CommandTag::Line => {
            let token = expect_kind(TokenKind::Integer, "line index").parse_next(input)?;
            let index = parse_integer(&token).map_err(ErrMode::Cut)?;
            let level = keyword(LEVELS, "assert or deassert").parse_next(input)?;
            Ok(Command::Line(LineCommand { index, level }))
        }
        CommandTag::Chassis => keyword(POWER_STATES, "on or off")
            .map(Command::Chassis)
            .parse_next(input),
        CommandTag::Ready => keyword(READINESS, "yes or no")
            .map(Command::Ready)
            .parse_next(input),
        CommandTag::Status => Ok(Command::Status),
        CommandTag::History => Ok(Command::History),
        CommandTag::Help => Ok(Command::Help(HelpCommand {
            topic: help_topic(input)?,
        })),
    }
}

fn help_topic<'src>(input: &mut Input<'src, '_>) -> GrammarResult<'src, Option<&'src str>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            Ok(Some(token.lexeme))
        }
        Some((token, _)) if token.kind == TokenKind::Eol => Ok(None),
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "identifier",
            Some(token),
        ))),
        None => Ok(None),
    }
}

fn keyword<'src, 'slice, T: Copy>(
    choices: &'static [(&'static str, T)],
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, T, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            match choices
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(token.lexeme))
            {
                Some((_, value)) => {
                    *input = rest;
                    Ok(*value)
                }
                None => Err(ErrMode::Cut(GrammarError::unexpected(label, Some(token)))),
            }
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_integer<'a>(token: &Token<'a>) -> Result<u8, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u8>()
        .map_err(|_| GrammarError::invalid_integer(token))
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_button_edges() {
        assert_eq!(parse_ok("press power"), Command::Press(ButtonChannel::Power));
        assert_eq!(parse_ok("release reset"), Command::Release(ButtonChannel::Reset));
        assert_eq!(parse_ok("press id\n"), Command::Press(ButtonChannel::Id));
    }

    #[test]
    fn parses_advance_durations() {
        assert_eq!(
            parse_ok("advance 250ms"),
            Command::Advance(Duration::from_millis(250))
        );
        assert_eq!(parse_ok("advance 34s"), Command::Advance(Duration::from_secs(34)));
    }

    #[test]
    fn parses_line_levels() {
        assert_eq!(
            parse_ok("line 2 assert"),
            Command::Line(LineCommand {
                index: 2,
                level: LineLevel::Assert,
            })
        );
        assert_eq!(
            parse_ok("line 0 deassert"),
            Command::Line(LineCommand {
                index: 0,
                level: LineLevel::Deassert,
            })
        );
    }

    #[test]
    fn parses_chassis_and_readiness() {
        assert_eq!(parse_ok("chassis on"), Command::Chassis(PowerState::On));
        assert_eq!(parse_ok("ready no"), Command::Ready(false));
        assert_eq!(parse_ok("status"), Command::Status);
        assert_eq!(parse_ok("history"), Command::History);
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help press"),
            Command::Help(HelpCommand {
                topic: Some("press"),
            })
        );
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
    }

    #[test]
    fn supports_case_insensitive_keywords() {
        assert_eq!(parse_ok("PrEsS PoWeR"), Command::Press(ButtonChannel::Power));
    }

    #[test]
    fn rejects_unknown_channel() {
        match parse("press eject") {
            Err(ParseError::Grammar(err)) => assert!(matches!(
                err.kind,
                GrammarErrorKind::UnexpectedToken {
                    expected: "power, reset, or id",
                    ..
                }
            )),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_argument_and_trailing_tokens() {
        assert!(matches!(
            parse("advance"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedEnd {
                    expected: "duration"
                }
            }))
        ));
        assert!(matches!(
            parse("status now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken {
                    expected: "end of command",
                    ..
                }
            }))
        ));
    }

    #[test]
    fn rejects_oversized_line_index() {
        match parse("line 300 assert") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidInteger { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("press power$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("status$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }
}
