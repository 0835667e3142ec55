//! Rickshaw stand core
//!
//! Everything that decides *what* the stand does lives here: the leaf
//! judgments over raw sensor samples, the dispatch state machine, the ride
//! service wire format and the indicator/status mappings. None of it touches
//! hardware, so it builds for the RP2350 firmware and runs under `cargo test`
//! on the host alike.
//!
//! Hardware tasks (ranging, lamps, display, UART link) live in the firmware
//! binary (`main.rs`) and feed this crate one control cycle at a time.

#![cfg_attr(not(test), no_std)]

// Must come first so the other modules see the log macros.
mod fmt;

/// Ride service link: wire codec and request/response exchange
pub mod link;
/// Leaf judgments over raw sensor samples
pub mod sensing;
/// Coordinator state machine, configuration and human-facing outputs
pub mod system;
