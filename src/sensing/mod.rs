//! Leaf judgments over raw sensor samples
//!
//! Each component owns only its own rolling window and exposes an explicit
//! `reset()`. They never look at the coordinator state; the coordinator reads
//! their outputs and decides.
pub mod confirm;
pub mod destination;
pub mod presence;
pub mod privilege;
