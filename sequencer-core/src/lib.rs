#![no_std]

// Shared logic for the toggle sequencer.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware is reached only through the traits in
// `time`, `output`, and `interconnect`; the `sim` module provides heapless
// stand-ins used by the emulator and the test suites.

pub mod config;
pub mod console;
pub mod interconnect;
pub mod orchestrator;
pub mod output;
pub mod sim;
pub mod telemetry;
pub mod time;
pub mod trigger;
