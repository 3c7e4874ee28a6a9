mod support;

use button_core::config::parse_position_map;
use button_core::selector::{
    EdgeOutcome, HostSelection, HostSelectorDecoder, LineLevel, PositionMap, SelectorError,
};

use support::{MockError, MockLines, RecordingPublisher};

type Decoder = HostSelectorDecoder<MockLines, RecordingPublisher>;

fn decoder(lines: MockLines, map: &str) -> Decoder {
    let map = parse_position_map(map).expect("map should parse");
    HostSelectorDecoder::new(lines, RecordingPublisher::default(), map).expect("line count fits")
}

#[test]
fn initialize_reads_every_line_and_publishes_hit() {
    let mut decoder = decoder(MockLines::with_levels(3, 0b101), "5=2");

    let selection = decoder.initialize().expect("initialization succeeds");
    assert_eq!(selection, HostSelection::Host(2));
    assert_eq!(decoder.position(), 0b101);
    assert_eq!(
        decoder.publisher().published.as_slice(),
        &[HostSelection::Host(2)]
    );
}

#[test]
fn initialize_publishes_even_when_unmapped() {
    let mut decoder = decoder(MockLines::with_levels(3, 0b011), "0=0");

    assert_eq!(decoder.initialize(), Ok(HostSelection::NoRemap));
    assert_eq!(
        decoder.publisher().published.as_slice(),
        &[HostSelection::NoRemap]
    );
}

#[test]
fn runtime_miss_suppresses_publication() {
    let mut decoder = decoder(MockLines::new(3), "0=0");
    decoder.initialize().expect("initialization succeeds");

    let outcome = decoder.on_line_edge(2, LineLevel::Assert);
    assert_eq!(outcome, EdgeOutcome::Unmapped { position: 0b100 });
    assert_eq!(
        decoder.publisher().published.as_slice(),
        &[HostSelection::Host(0)]
    );
    assert_eq!(decoder.selection(), HostSelection::NoRemap);
}

#[test]
fn three_line_sequence_settles_on_bit_zero() {
    let mut decoder = decoder(MockLines::new(3), "1=4,2=5,3=6");
    decoder.initialize().expect("initialization succeeds");

    decoder.on_line_edge(1, LineLevel::Assert);
    decoder.on_line_edge(2, LineLevel::Assert);
    decoder.on_line_edge(0, LineLevel::Assert);
    decoder.on_line_edge(2, LineLevel::Deassert);
    let last = decoder.on_line_edge(1, LineLevel::Deassert);

    assert_eq!(decoder.position(), 0b001);
    assert_eq!(
        last,
        EdgeOutcome::Published {
            position: 0b001,
            host: 4,
        }
    );
}

#[test]
fn final_position_is_independent_of_edge_order() {
    let orders: [[(usize, LineLevel); 3]; 3] = [
        [
            (1, LineLevel::Assert),
            (0, LineLevel::Assert),
            (1, LineLevel::Deassert),
        ],
        [
            (0, LineLevel::Assert),
            (1, LineLevel::Assert),
            (1, LineLevel::Deassert),
        ],
        [
            (1, LineLevel::Assert),
            (1, LineLevel::Deassert),
            (0, LineLevel::Assert),
        ],
    ];

    for order in orders {
        let mut decoder = decoder(MockLines::new(3), "");
        decoder.initialize().expect("initialization succeeds");
        for (line, level) in order {
            decoder.on_line_edge(line, level);
        }
        assert_eq!(decoder.position(), 0b001, "order {order:?}");
    }
}

#[test]
fn initialize_read_failure_is_fatal() {
    let mut lines = MockLines::new(3);
    lines.fail_line = Some(1);
    let mut decoder = decoder(lines, "0=0");

    assert_eq!(
        decoder.initialize(),
        Err(SelectorError::Read {
            line: 1,
            error: MockError,
        })
    );
    assert!(decoder.publisher().published.is_empty());
}

#[test]
fn runtime_read_failure_keeps_previous_bit() {
    let mut decoder = decoder(MockLines::with_levels(2, 0b10), "2=1,3=0");
    decoder.initialize().expect("initialization succeeds");

    decoder.reader_mut().levels[1] = LineLevel::Deassert;
    decoder.reader_mut().fail_line = Some(1);
    assert_eq!(
        decoder.on_line_event(1),
        EdgeOutcome::ReadFailed {
            line: 1,
            error: MockError,
        }
    );
    assert_eq!(decoder.position(), 0b10);

    decoder.reader_mut().levels[0] = LineLevel::Assert;
    assert_eq!(
        decoder.on_line_event(0),
        EdgeOutcome::Published {
            position: 0b11,
            host: 0,
        }
    );
}

#[test]
fn unknown_line_is_ignored() {
    let mut decoder = decoder(MockLines::new(2), "0=0");
    decoder.initialize().expect("initialization succeeds");

    assert_eq!(
        decoder.on_line_edge(5, LineLevel::Assert),
        EdgeOutcome::UnknownLine { line: 5 }
    );
    assert_eq!(
        decoder.on_line_event(2),
        EdgeOutcome::UnknownLine { line: 2 }
    );
    assert_eq!(decoder.position(), 0);
}

#[test]
fn rejects_more_than_eight_lines() {
    let mut lines = MockLines::new(8);
    lines.count = 9;
    let result = HostSelectorDecoder::new(lines, RecordingPublisher::default(), PositionMap::new());
    assert!(matches!(
        result,
        Err(SelectorError::TooManyLines { count: 9 })
    ));
}
