//! Destination block selection
//!
//! The stand has a fixed row of mutually exclusive position switches, one per
//! destination. A selection only counts once it has been held unchanged for
//! `DEBOUNCE_INTERVAL`; changing or lifting the block before that throws the
//! candidate away.
//!
//! Several switches closed at once is not a state the hardware should
//! produce. When it happens the lowest closed index wins, so the outcome is
//! always deterministic.

use embassy_time::{Duration, Instant};

/// Number of destination switches on the stand
pub const DESTINATION_COUNT: usize = 3;

/// Time a selection must stay unchanged before it is promoted
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(500);

/// Selection judgment for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Selection {
    /// Switch that is closed right now (lowest index on ambiguity)
    pub active: Option<u8>,
    /// Candidate that has been held long enough to latch
    pub promoted: Option<u8>,
}

/// Currently held destination and when it was first seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    index: u8,
    since: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct DestinationSelector {
    candidate: Option<Candidate>,
}

impl DestinationSelector {
    pub const fn new() -> Self {
        Self { candidate: None }
    }

    /// Single active switch, lowest index wins when several are closed
    pub fn active(switches: &[bool; DESTINATION_COUNT]) -> Option<u8> {
        switches.iter().position(|closed| *closed).map(|index| index as u8)
    }

    pub fn update(&mut self, switches: &[bool; DESTINATION_COUNT], now: Instant) -> Selection {
        let active = Self::active(switches);

        match (active, self.candidate) {
            (None, _) => self.candidate = None,
            (Some(index), Some(candidate)) if candidate.index == index => {}
            (Some(index), _) => {
                debug!("destination candidate {}", index);
                self.candidate = Some(Candidate { index, since: now });
            }
        }

        let promoted = self
            .candidate
            .filter(|candidate| now.saturating_duration_since(candidate.since) >= DEBOUNCE_INTERVAL)
            .map(|candidate| candidate.index);

        Selection { active, promoted }
    }

    pub fn reset(&mut self) {
        self.candidate = None;
    }
}
