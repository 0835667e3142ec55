//! Ride request data
//!
//! The ride service owns the request once it exists; the stand only keeps the
//! identifier it was handed, the names the service resolved, the last status
//! it polled and when the request was issued.

use core::fmt;

use embassy_time::Instant;
use heapless::String;

/// Capacity of identifiers exchanged with the ride service
pub const IDENT_CAPACITY: usize = 24;

/// Capacity of a failure reason reported by the ride service
pub const REASON_CAPACITY: usize = 32;

/// Request identifier assigned by the ride service
pub type RideId = String<IDENT_CAPACITY>;

/// Human readable location name resolved by the ride service
pub type LocationName = String<IDENT_CAPACITY>;

/// Lifecycle status of a ride as reported by the ride service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RideStatus {
    Pending,
    Accepted,
    PickupConfirmed,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
    /// The service no longer knows the identifier
    NotFound,
}

impl RideStatus {
    /// Parses the wire name of a status
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "pickup_confirmed" => Some(Self::PickupConfirmed),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "not_found" => Some(Self::NotFound),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::PickupConfirmed => "pickup_confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::NotFound => "not_found",
        }
    }
}

/// Create-ride request, resolved from the stand configuration and the
/// latched destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CreateRide {
    pub requester: &'static str,
    pub pickup: &'static str,
    pub destination: &'static str,
}

/// Successful create-ride response
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RideTicket {
    pub id: RideId,
    pub pickup_name: LocationName,
    pub destination_name: LocationName,
}

/// The stand's cached copy of an outstanding ride
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RideRequest {
    pub id: RideId,
    /// Index of the destination switch the ride was requested for
    pub destination: u8,
    pub pickup_name: LocationName,
    pub destination_name: LocationName,
    /// Last polled status, later polls always overwrite it
    pub status: RideStatus,
    /// When the ride service handed out the identifier
    pub issued_at: Instant,
}

impl RideRequest {
    pub fn from_ticket(ticket: RideTicket, destination: u8, issued_at: Instant) -> Self {
        Self {
            id: ticket.id,
            destination,
            pickup_name: ticket.pickup_name,
            destination_name: ticket.destination_name,
            status: RideStatus::Pending,
            issued_at,
        }
    }
}

/// Failure talking to the ride service
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RideError {
    /// No response within the request timeout
    Timeout,
    /// The link to the network bridge failed
    Io,
    /// Response could not be parsed
    Malformed,
    /// A field did not fit its buffer
    Overflow,
    /// The service answered with an error
    Refused(String<REASON_CAPACITY>),
}

impl fmt::Display for RideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("no response"),
            Self::Io => f.write_str("link failure"),
            Self::Malformed => f.write_str("bad response"),
            Self::Overflow => f.write_str("field too long"),
            Self::Refused(reason) => write!(f, "refused: {}", reason),
        }
    }
}
