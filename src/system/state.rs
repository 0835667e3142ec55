//! Coordinator states
//!
//! The stand walks a single request cycle:
//!
//! ```text
//! Idle -> PresenceTracking -> WaitingBlock -> WaitingLaser -> WaitingConfirm
//!      -> Dispatching -> WaitingPuller -> RideAccepted -> PickupConfirmed
//!      -> RideCompleted -> Idle
//! ```
//!
//! Any failure along the way lands in `RejectedOrError`, which like
//! `RideCompleted` is shown for a while before the stand resets to `Idle`.

use core::fmt;

use crate::system::ride::RideError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoordinatorState {
    /// Nobody on the marker
    Idle,
    /// Someone is standing on the marker, dwell is accumulating
    PresenceTracking,
    /// Dwell satisfied, waiting for a destination block to settle
    WaitingBlock,
    /// Destination latched, waiting for the privilege light
    WaitingLaser,
    /// Privilege verified, waiting for the confirm button
    WaitingConfirm,
    /// Create-ride call in flight
    Dispatching,
    /// Ride issued, no puller has taken it yet
    WaitingPuller,
    RideAccepted,
    PickupConfirmed,
    RideCompleted,
    RejectedOrError,
}

impl CoordinatorState {
    /// A ride is live and its status is being polled
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::WaitingPuller | Self::RideAccepted | Self::PickupConfirmed)
    }
}

/// Why a cycle ended in `RejectedOrError`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureReason {
    /// Ride service unreachable or answered garbage
    Link(RideError),
    /// No puller took the ride in time
    Timeout,
    Rejected,
    Cancelled,
    /// The service forgot the ride
    NotFound,
    /// Confirm button held down too long
    AbnormalHold,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(error) => write!(f, "link: {}", error),
            Self::Timeout => f.write_str("no puller"),
            Self::Rejected => f.write_str("rejected"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::NotFound => f.write_str("ride lost"),
            Self::AbnormalHold => f.write_str("button stuck"),
        }
    }
}
