mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use button_core::config::{ButtonConfig, parse_position_map};
use button_core::control::PowerState;

use session::{Session, SessionOptions};

const USAGE: &str = "Usage: button-emulator [--lines <n>] [--map <raw=index,...>] \
[--power <on|off>] [--absent <power|reset|id>]... [--transcript <path>]";

struct Args {
    options: SessionOptions,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let args = parse_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(args.options)?;
    if let Some(path) = args.transcript.as_deref() {
        session = session.with_transcript(path, "Chassis button emulator transcript")?;
    }
    let mut line = String::new();

    writeln!(
        writer,
        "Chassis button emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut options = SessionOptions::new(ButtonConfig::new());
    let mut transcript = None;

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--lines" => {
                let raw = value()?;
                let lines = raw
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid line count `{raw}`"))?;
                options.config.selector_lines = lines;
            }
            "--map" => {
                let raw = value()?;
                let map = parse_position_map(&raw).map_err(|err| format!("Invalid map `{raw}`: {err}"))?;
                options.config.position_map = map;
            }
            "--power" => {
                let raw = value()?;
                options.initial_power = Some(match raw.to_ascii_lowercase().as_str() {
                    "on" => PowerState::On,
                    "off" => PowerState::Off,
                    _ => return Err(format!("Unknown power state `{raw}`")),
                });
            }
            "--absent" => {
                let raw = value()?;
                match raw.to_ascii_lowercase().as_str() {
                    "power" => options.presence.power = false,
                    "reset" => options.presence.reset = false,
                    "id" => options.presence.id = false,
                    _ => return Err(format!("Unknown button channel `{raw}`")),
                }
            }
            "--transcript" => transcript = Some(PathBuf::from(value()?)),
            _ => return Err(format!("Unknown argument `{flag}`")),
        }
    }

    Ok(Args {
        options,
        transcript,
    })
}
