//! Stand coordination: state machine, configuration and human-facing outputs
pub mod config;
pub mod coordinator;
pub mod indicator;
pub mod ride;
pub mod state;
pub mod status;
