#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;

use button_core::control::{
    ChassisControl, ChassisTransition, HostTransition, PowerState,
};
use button_core::selector::{HostSelection, LineLevel, LineReader, SelectionPublisher};
use button_core::timer::{DeadlineTimer, MonotonicInstant};
use heapless::Vec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub u64);

impl MockInstant {
    pub const fn ms(value: u64) -> Self {
        MockInstant(value)
    }

    pub const fn secs(value: u64) -> Self {
        MockInstant(value * 1_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = MockInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MockInstant(self.0 + rhs.as_millis() as u64)
    }
}

impl MonotonicInstant for MockInstant {
    fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

pub type MockTimer = DeadlineTimer<MockInstant>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockError;

/// Chassis double that records every request it receives.
#[derive(Debug)]
pub struct MockChassis {
    pub power: PowerState,
    pub ready: bool,
    pub fail_power_query: bool,
    pub fail_readiness: bool,
    pub fail_requests: bool,
    pub identify: bool,
    pub host_requests: Vec<HostTransition, 16>,
    pub chassis_requests: Vec<ChassisTransition, 16>,
    pub power_queries: usize,
}

impl MockChassis {
    pub fn powered(power: PowerState) -> Self {
        Self {
            power,
            ready: true,
            fail_power_query: false,
            fail_readiness: false,
            fail_requests: false,
            identify: false,
            host_requests: Vec::new(),
            chassis_requests: Vec::new(),
            power_queries: 0,
        }
    }

    pub fn request_count(&self) -> usize {
        self.host_requests.len() + self.chassis_requests.len()
    }
}

impl ChassisControl for MockChassis {
    type Error = MockError;

    fn current_power_state(&mut self) -> Result<PowerState, MockError> {
        self.power_queries += 1;
        if self.fail_power_query {
            Err(MockError)
        } else {
            Ok(self.power)
        }
    }

    fn is_ready(&mut self) -> Result<bool, MockError> {
        if self.fail_readiness {
            Err(MockError)
        } else {
            Ok(self.ready)
        }
    }

    fn request_host_transition(&mut self, transition: HostTransition) -> Result<(), MockError> {
        if self.fail_requests {
            return Err(MockError);
        }
        self.host_requests
            .push(transition)
            .expect("host request log full");
        Ok(())
    }

    fn request_chassis_transition(
        &mut self,
        transition: ChassisTransition,
    ) -> Result<(), MockError> {
        if self.fail_requests {
            return Err(MockError);
        }
        self.chassis_requests
            .push(transition)
            .expect("chassis request log full");
        Ok(())
    }

    fn toggle_identify(&mut self) -> Result<bool, MockError> {
        if self.fail_requests {
            return Err(MockError);
        }
        self.identify = !self.identify;
        Ok(self.identify)
    }
}

/// Selector lines backed by an in-memory level table.
#[derive(Debug)]
pub struct MockLines {
    pub levels: [LineLevel; 8],
    pub count: usize,
    pub fail_line: Option<usize>,
}

impl MockLines {
    pub fn new(count: usize) -> Self {
        Self {
            levels: [LineLevel::Deassert; 8],
            count,
            fail_line: None,
        }
    }

    pub fn with_levels(count: usize, asserted_mask: u8) -> Self {
        let mut lines = Self::new(count);
        for line in 0..count {
            lines.levels[line] = LineLevel::from_asserted(asserted_mask & (1 << line) != 0);
        }
        lines
    }
}

impl LineReader for MockLines {
    type Error = MockError;

    fn line_count(&self) -> usize {
        self.count
    }

    fn read_level(&mut self, line: usize) -> Result<LineLevel, MockError> {
        if self.fail_line == Some(line) {
            Err(MockError)
        } else {
            Ok(self.levels[line])
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub published: Vec<HostSelection, 32>,
}

impl SelectionPublisher for RecordingPublisher {
    fn publish(&mut self, selection: HostSelection) {
        self.published
            .push(selection)
            .expect("publication log full");
    }
}
