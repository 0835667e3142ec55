//! Stand identity
//!
//! Identifiers sent to the ride service are baked in at build time. Each one
//! can be overridden through an environment variable when building the
//! firmware:
//!
//! | Variable                  | Default     |
//! |---------------------------|-------------|
//! | `RICKSHAW_STAND_ID`       | `STAND-01`  |
//! | `RICKSHAW_PICKUP_ID`      | `STAND-01`  |
//! | `RICKSHAW_DESTINATION_0`  | `DEST-A`    |
//! | `RICKSHAW_DESTINATION_1`  | `DEST-B`    |
//! | `RICKSHAW_DESTINATION_2`  | `DEST-C`    |
//!
//! Destination `n` is the location requested when block switch `n` latches.

use crate::sensing::destination::DESTINATION_COUNT;
use crate::system::ride::CreateRide;

/// Configuration the firmware is built with
pub const STAND_CONFIG: StandConfig = StandConfig::from_env();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StandConfig {
    /// Requester identity reported with every ride
    pub stand_id: &'static str,
    /// Location identifier of the marker the stand watches
    pub pickup_id: &'static str,
    /// Location identifier per destination block switch
    pub destinations: [&'static str; DESTINATION_COUNT],
}

impl StandConfig {
    pub const fn from_env() -> Self {
        Self {
            stand_id: env_or(option_env!("RICKSHAW_STAND_ID"), "STAND-01"),
            pickup_id: env_or(option_env!("RICKSHAW_PICKUP_ID"), "STAND-01"),
            destinations: [
                env_or(option_env!("RICKSHAW_DESTINATION_0"), "DEST-A"),
                env_or(option_env!("RICKSHAW_DESTINATION_1"), "DEST-B"),
                env_or(option_env!("RICKSHAW_DESTINATION_2"), "DEST-C"),
            ],
        }
    }

    pub fn destination(&self, index: u8) -> Option<&'static str> {
        self.destinations.get(usize::from(index)).copied()
    }

    /// Create-ride request for the destination behind switch `index`
    pub fn ride_to(&self, index: u8) -> Option<CreateRide> {
        Some(CreateRide {
            requester: self.stand_id,
            pickup: self.pickup_id,
            destination: self.destination(index)?,
        })
    }
}

const fn env_or(value: Option<&'static str>, default: &'static str) -> &'static str {
    match value {
        Some(value) => value,
        None => default,
    }
}
