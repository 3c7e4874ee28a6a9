use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use button_core::config::{ButtonConfig, parse_position_map};
use button_core::control::PowerState;

use session::{Session, SessionOptions};

const TRANSCRIPT_DIR: &str = "transcripts";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Scenario {
    PowerOn,
    GracefulOff,
    ForcedOff,
    Selector,
}

impl Scenario {
    const ALL: [Scenario; 4] = [
        Scenario::PowerOn,
        Scenario::GracefulOff,
        Scenario::ForcedOff,
        Scenario::Selector,
    ];

    fn tag(self) -> &'static str {
        match self {
            Scenario::PowerOn => "power-on",
            Scenario::GracefulOff => "graceful-off",
            Scenario::ForcedOff => "forced-off",
            Scenario::Selector => "selector",
        }
    }

    fn header(self) -> &'static str {
        match self {
            Scenario::PowerOn => "Chassis button emulator power-on transcript",
            Scenario::GracefulOff => "Chassis button emulator graceful power-off transcript",
            Scenario::ForcedOff => "Chassis button emulator forced power-off transcript",
            Scenario::Selector => "Chassis button emulator host selector transcript",
        }
    }

    fn options(self) -> io::Result<SessionOptions> {
        let mut config = ButtonConfig::new();
        if self == Scenario::Selector {
            let map = parse_position_map("1=0,2=1,4=2")
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
            config = config.with_selector_lines(3).with_position_map(map);
        }

        let mut options = SessionOptions::new(config);
        options.initial_power = Some(match self {
            Scenario::PowerOn => PowerState::Off,
            _ => PowerState::On,
        });
        Ok(options)
    }

    fn script(self) -> &'static [&'static str] {
        match self {
            Scenario::PowerOn => &[
                "status",
                "ready no",
                "press power",
                "release power",
                "ready yes",
                "press power",
                "release power",
                "status",
                "history",
            ],
            Scenario::GracefulOff => &[
                "press power",
                "advance 6s",
                "release power",
                "status",
                "advance 30s",
                "status",
                "history",
            ],
            Scenario::ForcedOff => &[
                "press power",
                "advance 10s",
                "status",
                "advance 50s",
                "release power",
                "status",
            ],
            Scenario::Selector => &[
                "status",
                "line 0 assert",
                "line 1 assert",
                "line 0 deassert",
                "line 2 assert",
                "line 1 deassert",
                "status",
                "history",
            ],
        }
    }
}

fn main() -> io::Result<()> {
    for scenario in Scenario::ALL {
        record_scenario(scenario)?;
    }
    Ok(())
}

fn record_scenario(scenario: Scenario) -> io::Result<()> {
    let path = Path::new(TRANSCRIPT_DIR).join(format!("emulator-{}.log", scenario.tag()));
    let mut session =
        Session::new(scenario.options()?)?.with_transcript(&path, scenario.header())?;
    for line in scenario.script() {
        let _ = session.handle_command(line)?;
    }
    println!("wrote {}", path.display());
    Ok(())
}
