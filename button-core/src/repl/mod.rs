//! Console grammar and status rendering shared by firmware and emulator.

pub mod grammar;
pub mod status;
