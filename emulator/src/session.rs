use std::convert::Infallible;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::time::Duration;

use button_core::config::{ButtonConfig, ConfigError};
use button_core::control::{ChassisControl, ChassisTransition, HostTransition, PowerState};
use button_core::handler::{
    ButtonEvent, ButtonHandler, ButtonPresence, DispatchOutcome, DispatchReport,
};
use button_core::repl::grammar::{self, Command, LineCommand};
use button_core::repl::status::{
    PowerButtonSnapshot, SelectorSnapshot, StatusFormatter, StatusSnapshot,
};
use button_core::selector::{
    EdgeOutcome, HostSelection, HostSelectorDecoder, LineLevel, LineReader, MAX_SELECTOR_LINES,
    SelectionPublisher,
};
use button_core::telemetry::{TelemetryEventKind, TelemetryRecorder};
use button_core::timer::{DeadlineTimer, MonotonicInstant};

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "press",
        "press <power|reset|id>           - deliver a press edge",
    ),
    (
        "release",
        "release <power|reset|id>         - deliver a release edge",
    ),
    (
        "advance",
        "advance <N>ms|<N>s               - move the virtual clock forward",
    ),
    (
        "line",
        "line <index> <assert|deassert>   - drive a host selector line",
    ),
    (
        "chassis",
        "chassis <on|off>                 - force the simulated chassis power state",
    ),
    (
        "ready",
        "ready <yes|no>                   - set management readiness for power-on",
    ),
    (
        "status",
        "status                           - display button and selector state",
    ),
    (
        "history",
        "history                          - list recorded telemetry",
    ),
    (
        "help",
        "help [topic]                     - show help for a command",
    ),
];

/// Virtual clock reading, measured from session start.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct VirtualInstant(Duration);

impl VirtualInstant {
    pub const ZERO: VirtualInstant = VirtualInstant(Duration::ZERO);

    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for VirtualInstant {
    type Output = VirtualInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        VirtualInstant(self.0 + rhs)
    }
}

impl MonotonicInstant for VirtualInstant {
    fn saturating_duration_since(self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for VirtualInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}ms", self.0.as_millis())
    }
}

/// Chassis stand-in whose power follows the requests it receives.
#[derive(Debug)]
pub struct SimulatedChassis {
    power: PowerState,
    ready: bool,
    identify: bool,
}

impl SimulatedChassis {
    fn new() -> Self {
        Self {
            power: PowerState::Off,
            ready: true,
            identify: false,
        }
    }
}

impl ChassisControl for SimulatedChassis {
    type Error = Infallible;

    fn current_power_state(&mut self) -> Result<PowerState, Infallible> {
        Ok(self.power)
    }

    fn is_ready(&mut self) -> Result<bool, Infallible> {
        Ok(self.ready)
    }

    fn request_host_transition(&mut self, transition: HostTransition) -> Result<(), Infallible> {
        match transition {
            HostTransition::On | HostTransition::Reboot => self.power = PowerState::On,
            HostTransition::Off => self.power = PowerState::Off,
        }
        Ok(())
    }

    fn request_chassis_transition(
        &mut self,
        transition: ChassisTransition,
    ) -> Result<(), Infallible> {
        match transition {
            ChassisTransition::Off => self.power = PowerState::Off,
        }
        Ok(())
    }

    fn toggle_identify(&mut self) -> Result<bool, Infallible> {
        self.identify = !self.identify;
        Ok(self.identify)
    }
}

/// Selector lines driven from the console.
#[derive(Debug)]
pub struct SimulatedLines {
    levels: [LineLevel; MAX_SELECTOR_LINES],
    count: usize,
}

impl SimulatedLines {
    fn new(count: usize) -> Self {
        Self {
            levels: [LineLevel::Deassert; MAX_SELECTOR_LINES],
            count,
        }
    }

    fn drive(&mut self, line: usize, level: LineLevel) {
        if line < self.count {
            self.levels[line] = level;
        }
    }
}

impl LineReader for SimulatedLines {
    type Error = Infallible;

    fn line_count(&self) -> usize {
        self.count
    }

    fn read_level(&mut self, line: usize) -> Result<LineLevel, Infallible> {
        Ok(self.levels[line])
    }
}

/// Keeps every published selection so the session can echo the latest one.
#[derive(Debug, Default)]
pub struct SelectionLog {
    published: Vec<HostSelection>,
}

impl SelectionLog {
    pub fn latest(&self) -> Option<HostSelection> {
        self.published.last().copied()
    }

    pub fn count(&self) -> usize {
        self.published.len()
    }
}

impl SelectionPublisher for SelectionLog {
    fn publish(&mut self, selection: HostSelection) {
        self.published.push(selection);
    }
}

type EmulatedHandler = ButtonHandler<SimulatedChassis, DeadlineTimer<VirtualInstant>>;
type EmulatedDecoder = HostSelectorDecoder<SimulatedLines, SelectionLog>;

/// Start-up parameters collected from the command line.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub config: ButtonConfig,
    pub presence: ButtonPresence,
    pub initial_power: Option<PowerState>,
}

impl SessionOptions {
    pub fn new(config: ButtonConfig) -> Self {
        Self {
            config,
            presence: ButtonPresence::all(),
            initial_power: None,
        }
    }
}

pub struct Session {
    handler: EmulatedHandler,
    decoder: EmulatedDecoder,
    telemetry: TelemetryRecorder<VirtualInstant>,
    clock: VirtualInstant,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(mut options: SessionOptions) -> io::Result<Self> {
        options.config.validate().map_err(invalid_config)?;

        let mut chassis = SimulatedChassis::new();
        if let Some(power) = options.initial_power {
            chassis.power = power;
        }

        let handler = ButtonHandler::probe(
            chassis,
            &mut options.presence,
            options.config.timings,
            DeadlineTimer::new(),
        )
        .map_err(|error| invalid_config(ConfigError::from(error)))?;

        let lines = SimulatedLines::new(options.config.selector_lines);
        let mut decoder = HostSelectorDecoder::new(
            lines,
            SelectionLog::default(),
            options.config.position_map,
        )
        .map_err(|error| io::Error::other(format!("selector rejected: {error}")))?;
        let selection = decoder
            .initialize()
            .map_err(|error| io::Error::other(format!("selector initialization failed: {error}")))?;

        let mut telemetry = TelemetryRecorder::new();
        telemetry.record(
            TelemetryEventKind::SelectorInitialized {
                position: decoder.position(),
                selection,
            },
            VirtualInstant::ZERO,
        );

        Ok(Self {
            handler,
            decoder,
            telemetry,
            clock: VirtualInstant::ZERO,
            transcript: None,
        })
    }

    /// Mirrors every exchange into a transcript file at `path`.
    pub fn with_transcript(mut self, path: &Path, header: &str) -> io::Result<Self> {
        self.transcript = Some(TranscriptLogger::new(path, header)?);
        Ok(self)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.clock.since_start();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let lines = match grammar::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        if let Some(transcript) = self.transcript.as_mut() {
            for line in &lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Press(channel) => self.deliver(ButtonEvent::Pressed(channel)),
            Command::Release(channel) => self.deliver(ButtonEvent::Released(channel)),
            Command::Advance(duration) => self.advance(duration),
            Command::Line(line) => self.drive_line(line),
            Command::Chassis(power) => {
                self.handler.control_mut().power = power;
                vec![format!("OK chassis power={power}")]
            }
            Command::Ready(ready) => {
                self.handler.control_mut().ready = ready;
                let label = if ready { "yes" } else { "no" };
                vec![format!("OK ready={label}")]
            }
            Command::Status => self.status(),
            Command::History => self.history(),
            Command::Help(help) => help_lines(help.topic),
        }
    }

    fn deliver(&mut self, event: ButtonEvent) -> Vec<String> {
        let now = self.clock;
        let report = self.handler.dispatch(event, now);
        self.telemetry.record_dispatch(&report, now);

        let mut lines = describe_report(&report);
        if lines.is_empty() {
            lines.push(format!("OK {event}"));
        }
        lines
    }

    /// Moves the clock to `now + duration`, delivering every timer fire on the way.
    fn advance(&mut self, duration: Duration) -> Vec<String> {
        let target = self.clock + duration;
        let mut lines = Vec::new();

        while let Some(fire) = self.handler.next_fire() {
            if fire > target {
                break;
            }
            self.clock = fire;
            let Some(report) = self.handler.poll_timer(fire) else {
                continue;
            };
            if report.is_quiet() {
                continue;
            }
            self.telemetry.record_dispatch(&report, fire);
            for line in describe_report(&report) {
                lines.push(format!("[{fire}] {line}"));
            }
        }

        self.clock = target;
        lines.push(format!("OK clock={}", self.clock));
        lines
    }

    fn drive_line(&mut self, command: LineCommand) -> Vec<String> {
        let line = usize::from(command.index);
        self.decoder.reader_mut().drive(line, command.level);

        let outcome = self.decoder.on_line_event(line);
        self.telemetry.record_selector_edge(&outcome, self.clock);

        let message = match outcome {
            EdgeOutcome::Published { position, host } => {
                format!("OK selector position={position:#010b} published host={host}")
            }
            EdgeOutcome::Unmapped { position } => {
                format!("OK selector position={position:#010b} unmapped")
            }
            EdgeOutcome::UnknownLine { line } => format!("ERR selector unknown line {line}"),
            EdgeOutcome::ReadFailed { error, .. } => match error {},
        };
        vec![message]
    }

    fn snapshot(&self) -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::unknown();
        snapshot.power_button = self.handler.power_machine().map(|machine| PowerButtonSnapshot {
            state: machine.state(),
            remaining: machine.remaining(self.clock),
        });
        for (channel, registered) in &mut snapshot.registered {
            *registered = self.handler.is_registered(*channel);
        }
        snapshot.chassis = Some(self.handler.control().power);
        if self.decoder.line_count() > 0 {
            snapshot.selector = Some(SelectorSnapshot {
                lines: self.decoder.line_count(),
                position: self.decoder.position(),
                selection: self.decoder.selection(),
            });
        }
        snapshot
    }

    fn status(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let formatter = StatusFormatter::new(&snapshot);
        let mut lines = vec![String::new(); 4];

        // Writing into a String cannot fail.
        let _ = formatter.write_power_button_line(&mut lines[0]);
        let _ = formatter.write_channels_line(&mut lines[1]);
        let _ = formatter.write_chassis_line(&mut lines[2]);
        let _ = formatter.write_selector_line(&mut lines[3]);

        let identify = if self.handler.control().identify {
            "on"
        } else {
            "off"
        };
        lines.push(format!(
            "identify={identify} ready={} published={} clock={}",
            self.handler.control().ready,
            self.decoder.publisher().count(),
            self.clock
        ));
        if let Some(selection) = self.decoder.publisher().latest() {
            lines.push(format!("last-published host={selection}"));
        }
        lines
    }

    fn history(&self) -> Vec<String> {
        if self.telemetry.is_empty() {
            return vec!["history empty".to_string()];
        }
        self.telemetry
            .oldest_first()
            .map(|record| format!("#{:<4} {} {}", record.id, record.timestamp, record.event))
            .collect()
    }
}

fn describe_report<E: fmt::Debug>(report: &DispatchReport<E>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(change) = report.state_change {
        lines.push(format!("power-button {} -> {}", change.from, change.to));
    }
    match &report.outcome {
        DispatchOutcome::None => {}
        DispatchOutcome::Requested(request) => lines.push(format!("request {request}")),
        DispatchOutcome::Skipped(reason) => lines.push(format!("skipped {reason}")),
        DispatchOutcome::Failed(failure) => lines.push(format!(
            "ERR {} failed: {:?}",
            failure.operation, failure.error
        )),
        DispatchOutcome::Unregistered => lines.push(format!(
            "ignored {}: channel not registered",
            report.event.channel()
        )),
    }
    lines
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) if !target.is_empty() => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        _ => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn invalid_config(error: ConfigError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid configuration: {error}"))
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use button_core::config::parse_position_map;

    use super::*;

    fn session(power: PowerState) -> Session {
        let mut options = SessionOptions::new(ButtonConfig::new());
        options.initial_power = Some(power);
        Session::new(options).expect("session starts")
    }

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("command runs")
    }

    #[test]
    fn every_command_keyword_has_help() {
        for keyword in grammar::command_keywords() {
            assert!(
                HELP_TOPICS.iter().any(|(name, _)| *name == keyword),
                "missing help for {keyword}"
            );
        }
    }

    #[test]
    fn short_press_while_off_powers_on() {
        let mut session = session(PowerState::Off);

        let lines = run(&mut session, "press power");
        assert_eq!(lines, vec!["request host-on".to_string()]);
        assert_eq!(run(&mut session, "release power"), vec!["OK power released"]);

        let status = run(&mut session, "status");
        assert_eq!(status[0], "power-button state=not-pressed remaining=n/a");
        assert_eq!(status[2], "chassis power=on");
    }

    #[test]
    fn held_button_forces_chassis_off() {
        let mut session = session(PowerState::On);
        run(&mut session, "press power");

        let lines = run(&mut session, "advance 60s");
        assert_eq!(
            lines,
            vec![
                "[+5000ms] power-button pressed -> dpo-initiated".to_string(),
                "[+36000ms] power-button dpo-initiated -> fpo-initiated".to_string(),
                "[+52000ms] power-button fpo-initiated -> not-pressed".to_string(),
                "[+52000ms] request chassis-off".to_string(),
                "OK clock=+60000ms".to_string(),
            ]
        );
        assert_eq!(session.handler.control().power, PowerState::Off);
    }

    #[test]
    fn selector_lines_publish_mapped_hosts() {
        let map = parse_position_map("1=4,2=5").expect("map parses");
        let config = ButtonConfig::new()
            .with_selector_lines(2)
            .with_position_map(map);
        let mut session = Session::new(SessionOptions::new(config)).expect("session starts");

        assert_eq!(
            run(&mut session, "line 0 assert"),
            vec!["OK selector position=0b00000001 published host=4"]
        );
        assert_eq!(
            run(&mut session, "line 1 assert"),
            vec!["OK selector position=0b00000011 unmapped"]
        );
        assert_eq!(
            run(&mut session, "line 4 assert"),
            vec!["ERR selector unknown line 4"]
        );
        assert_eq!(session.decoder.publisher().latest(), Some(HostSelection::Host(4)));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut session = session(PowerState::On);
        let lines = run(&mut session, "press lever");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR syntax"), "{lines:?}");
    }
}
