//! Lamp and buzzer feedback
//!
//! The lamps follow the coordinator state alone; the firmware only has to ask
//! [`indicate`] what to show and [`LampMode::is_lit`] whether a blinking lamp
//! is in its on phase. Tones are one-shot beep patterns the coordinator emits
//! on specific transitions.

use embassy_time::{Duration, Instant};

use crate::system::state::CoordinatorState;

/// Half period of a blinking lamp
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LampMode {
    #[default]
    Off,
    Steady,
    Blink,
}

impl LampMode {
    /// Whether the lamp is on at `now`.
    ///
    /// Blink phase is derived from the clock, so every blinking lamp shares
    /// the same phase no matter when it started.
    pub fn is_lit(&self, now: Instant) -> bool {
        match self {
            Self::Off => false,
            Self::Steady => true,
            Self::Blink => (now.as_millis() / BLINK_INTERVAL.as_millis()) % 2 == 0,
        }
    }
}

/// One buzzer pulse followed by silence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Beep {
    pub on_ms: u16,
    pub off_ms: u16,
}

const fn beep(on_ms: u16, off_ms: u16) -> Beep {
    Beep { on_ms, off_ms }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tone {
    /// Privilege verified, press confirm
    Acknowledge,
    /// A puller took the ride
    Accepted,
    /// Ride completed
    Success,
    /// Ride failed or was refused
    Failure,
    /// Operator fault (stuck button)
    Error,
}

impl Tone {
    pub fn pattern(&self) -> &'static [Beep] {
        match self {
            Self::Acknowledge => &const { [beep(80, 0)] },
            Self::Accepted => &const { [beep(100, 80), beep(100, 0)] },
            Self::Success => &const { [beep(80, 60), beep(80, 60), beep(300, 0)] },
            Self::Failure => &const { [beep(600, 0)] },
            Self::Error => &const { [beep(150, 100), beep(150, 100), beep(150, 100), beep(150, 0)] },
        }
    }
}

/// Lamp modes for the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Indicator {
    pub yellow: LampMode,
    pub red: LampMode,
    pub green: LampMode,
    /// Tone that goes with entering the state, if any
    pub tone: Option<Tone>,
}

pub fn indicate(state: CoordinatorState) -> Indicator {
    let off = Indicator::default();
    match state {
        CoordinatorState::WaitingPuller => Indicator {
            yellow: LampMode::Blink,
            ..off
        },
        CoordinatorState::RideAccepted => Indicator {
            yellow: LampMode::Steady,
            tone: Some(Tone::Accepted),
            ..off
        },
        CoordinatorState::PickupConfirmed => Indicator {
            green: LampMode::Steady,
            ..off
        },
        CoordinatorState::RideCompleted => Indicator {
            green: LampMode::Steady,
            tone: Some(Tone::Success),
            ..off
        },
        CoordinatorState::RejectedOrError => Indicator {
            red: LampMode::Steady,
            tone: Some(Tone::Failure),
            ..off
        },
        _ => off,
    }
}
