//! Privilege verification
//!
//! A rider proves the request is deliberate by holding a light beam on the
//! stand's light sensor. Ambient light drifts over the day, so every reading
//! is taken relative to a baseline captured when the stand is booted and
//! again each time verification starts.
//!
//! # Signal Processing
//! ```text
//! delta   = max(0, reading - baseline)
//! instant = clamp(delta / REFERENCE_DELTA * 100, 0, MAX_PERCENT)
//! shown   = 0.7 * shown + 0.3 * instant        (display only)
//! ```
//! - Engagement uses a hysteresis pair on the instantaneous percentage
//! - A reading is active when engaged and the delta clears `ACTIVE_FLOOR`, or
//!   when it was already active and the delta still clears `CONTINUATION_FLOOR`
//! - Activity has to persist for `STABILITY_WINDOW` before the hold starts
//! - The hold accumulates active time up to `HOLD_TARGET`; reaching it verifies
//! - Falling under `CONTINUATION_FLOOR` before verification wipes all progress

use core::cmp::min;

use embassy_time::{Duration, Instant};

/// Samples averaged into one baseline
const CALIBRATION_SAMPLES: u16 = 16;

/// Delta (ADC counts above baseline) that reads as 100 %
const REFERENCE_DELTA: f32 = 1000.0;

/// Upper clamp for the instantaneous percentage
const MAX_PERCENT: f32 = 120.0;

/// Weight of the previous display value in the smoothing filter
const SMOOTHING_PREVIOUS_WEIGHT: f32 = 0.7;

/// Percentage at which the beam engages
pub const ENGAGE_PERCENT: f32 = 12.0;

/// Percentage at or below which an engaged beam releases
pub const RELEASE_PERCENT: f32 = 8.0;

/// Delta needed to become active (ADC counts)
const ACTIVE_FLOOR: u16 = 120;

/// Delta that keeps an already active beam active (ADC counts)
const CONTINUATION_FLOOR: u16 = 60;

/// Continuous activity required before the hold timer starts
const STABILITY_WINDOW: Duration = Duration::from_millis(250);

/// Hold duration that verifies the rider
pub const HOLD_TARGET: Duration = Duration::from_millis(4_000);

/// Two-threshold switch: engages at or above `engage`, releases at or below `release`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    engage: f32,
    release: f32,
    engaged: bool,
}

impl Hysteresis {
    pub const fn new(engage: f32, release: f32) -> Self {
        Self {
            engage,
            release,
            engaged: false,
        }
    }

    pub fn update(&mut self, value: f32) -> bool {
        if self.engaged {
            if value <= self.release {
                self.engaged = false;
            }
        } else if value >= self.engage {
            self.engaged = true;
        }
        self.engaged
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn reset(&mut self) {
        self.engaged = false;
    }
}

/// Running sum while a baseline is being captured
#[derive(Debug, Clone, Copy, Default)]
struct Calibration {
    sum: u32,
    count: u16,
}

/// Privilege signal for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrivilegeSignal {
    /// Smoothed percentage for display
    pub percent: f32,
    /// Hysteresis engaged
    pub engaged: bool,
    /// Beam counts as active this cycle
    pub active: bool,
    /// Accumulated hold, never above `HOLD_TARGET`
    pub hold: Duration,
    /// Hold reached its target
    pub verified: bool,
    /// A baseline capture is still running
    pub calibrating: bool,
}

#[derive(Debug, Clone)]
pub struct PrivilegeVerifier {
    baseline: u16,
    calibration: Option<Calibration>,
    smoothed: f32,
    hysteresis: Hysteresis,
    active: bool,
    stable_since: Option<Instant>,
    holding: bool,
    hold: Duration,
    last_update: Option<Instant>,
}

impl Default for PrivilegeVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeVerifier {
    /// Starts with a baseline capture pending, as at boot
    pub const fn new() -> Self {
        Self {
            baseline: 0,
            calibration: Some(Calibration { sum: 0, count: 0 }),
            smoothed: 0.0,
            hysteresis: Hysteresis::new(ENGAGE_PERCENT, RELEASE_PERCENT),
            active: false,
            stable_since: None,
            holding: false,
            hold: Duration::from_ticks(0),
            last_update: None,
        }
    }

    /// Clears progress and captures a fresh baseline from the next samples
    pub fn request_calibration(&mut self) {
        self.reset();
        self.calibration = Some(Calibration::default());
    }

    /// Clears all progress and any pending calibration, keeps the baseline
    pub fn reset(&mut self) {
        self.calibration = None;
        self.smoothed = 0.0;
        self.clear_progress();
        self.last_update = None;
    }

    pub fn baseline(&self) -> u16 {
        self.baseline
    }

    pub fn update(&mut self, reading: u16, now: Instant) -> PrivilegeSignal {
        let elapsed = self
            .last_update
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::from_ticks(0));
        self.last_update = Some(now);

        if let Some(calibration) = self.calibration.as_mut() {
            calibration.sum += u32::from(reading);
            calibration.count += 1;
            if calibration.count >= CALIBRATION_SAMPLES {
                self.baseline = (calibration.sum / u32::from(calibration.count)) as u16;
                self.calibration = None;
                info!("light baseline calibrated at {}", self.baseline);
            }
            return self.signal();
        }

        let delta = reading.saturating_sub(self.baseline);
        let instant = (f32::from(delta) / REFERENCE_DELTA * 100.0).clamp(0.0, MAX_PERCENT);
        self.smoothed =
            SMOOTHING_PREVIOUS_WEIGHT * self.smoothed + (1.0 - SMOOTHING_PREVIOUS_WEIGHT) * instant;

        let engaged = self.hysteresis.update(instant);
        let active =
            engaged && (delta >= ACTIVE_FLOOR || (self.active && delta >= CONTINUATION_FLOOR));
        self.active = active;

        if self.is_verified() {
            return self.signal();
        }

        if active {
            match self.stable_since {
                None => self.stable_since = Some(now),
                Some(_) if self.holding => self.hold = min(self.hold + elapsed, HOLD_TARGET),
                Some(since) if now.saturating_duration_since(since) >= STABILITY_WINDOW => {
                    trace!("light beam stable, hold starts");
                    self.holding = true;
                }
                Some(_) => {}
            }
        } else if delta < CONTINUATION_FLOOR {
            if self.hold > Duration::from_ticks(0) {
                debug!("light beam dropped out, hold cleared");
            }
            self.clear_progress();
        } else {
            // Dimmed but not gone: pause the hold and require a fresh stability window
            self.stable_since = None;
            self.holding = false;
        }

        self.signal()
    }

    fn is_verified(&self) -> bool {
        self.hold >= HOLD_TARGET
    }

    fn clear_progress(&mut self) {
        self.hysteresis.reset();
        self.active = false;
        self.stable_since = None;
        self.holding = false;
        self.hold = Duration::from_ticks(0);
    }

    /// Signal as of the last update
    pub fn signal(&self) -> PrivilegeSignal {
        PrivilegeSignal {
            percent: self.smoothed,
            engaged: self.hysteresis.is_engaged(),
            active: self.active,
            hold: self.hold,
            verified: self.is_verified(),
            calibrating: self.calibration.is_some(),
        }
    }
}
