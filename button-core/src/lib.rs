#![no_std]

// Shared logic for the chassis button controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Platforms plug in their clock, GPIO, and chassis
// control through the traits exposed here.
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod config;
pub mod control;
pub mod handler;
pub mod power;
pub mod repl;
pub mod selector;
pub mod telemetry;
pub mod timer;
