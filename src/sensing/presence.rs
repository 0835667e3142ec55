//! Presence detection
//!
//! Turns raw HC-SR04 distance samples into an in-range / stable judgment and
//! keeps the dwell time a rider has spent standing still on the marker.
//!
//! # Signal Processing
//! - Samples outside `(0, NOMINAL_RANGE_CM + RANGE_MARGIN_CM]` count as "not present"
//!   and drop the stability run to zero, as do sensor timeouts
//! - A sample within `STABILITY_BAND_CM` of the accepted value extends the run and
//!   is blended into it (weighted towards the previous value) to swallow jitter
//! - A sample outside the band starts a new run from that sample
//!
//! # Dwell Tiers
//! Riders standing close to the sensor have to hold longer than those further
//! away; the tier is picked from the latest valid sample.

use core::cmp::min;

use embassy_time::{Duration, Instant};

/// Nominal edge of the marker as seen by the ranging sensor (cm)
const NOMINAL_RANGE_CM: f32 = 10.0;

/// Margin added on top of the nominal range before a sample counts as gone (cm)
const RANGE_MARGIN_CM: f32 = 2.0;

/// Maximum difference between a sample and the accepted value to extend a run (cm)
const STABILITY_BAND_CM: f32 = 1.5;

/// Consecutive in-band samples needed before presence counts as stable
const REQUIRED_STABLE_SAMPLES: u8 = 3;

/// Weight of the previously accepted value when blending in a new sample
const BLEND_PREVIOUS_WEIGHT: f32 = 0.7;

/// Samples at or below this distance use the near dwell tier (cm)
const NEAR_TIER_CM: f32 = 8.0;

/// Dwell required from riders standing close to the sensor
pub const NEAR_DWELL: Duration = Duration::from_millis(5_000);

/// Dwell required from riders further away
pub const FAR_DWELL: Duration = Duration::from_millis(3_000);

/// Judgment over the latest distance sample
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PresenceReading {
    /// Subject is within the allowed range
    pub in_range: bool,
    /// Enough consecutive samples agreed with each other
    pub stable: bool,
    /// Blended distance of the current run, if any
    pub distance_cm: Option<f32>,
}

impl PresenceReading {
    /// Nobody (or nothing valid) in front of the sensor
    pub const ABSENT: Self = Self {
        in_range: false,
        stable: false,
        distance_cm: None,
    };
}

/// Rolling stability window over distance samples
#[derive(Debug, Clone)]
pub struct PresenceDetector {
    /// Consecutive in-band samples in the current run
    run_length: u8,
    /// Blended value of the current run
    accepted_cm: f32,
    /// Latest valid raw sample, picks the dwell tier
    latest_cm: Option<f32>,
}

impl Default for PresenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceDetector {
    pub const fn new() -> Self {
        Self {
            run_length: 0,
            accepted_cm: 0.0,
            latest_cm: None,
        }
    }

    /// Feeds one sample. `None` is a sensor timeout.
    pub fn update(&mut self, sample: Option<f32>) -> PresenceReading {
        let Some(distance_cm) = sample.filter(|d| is_in_range(*d)) else {
            self.run_length = 0;
            self.latest_cm = None;
            return PresenceReading::ABSENT;
        };

        self.latest_cm = Some(distance_cm);

        if self.run_length > 0 && libm::fabsf(distance_cm - self.accepted_cm) <= STABILITY_BAND_CM {
            self.accepted_cm = BLEND_PREVIOUS_WEIGHT * self.accepted_cm
                + (1.0 - BLEND_PREVIOUS_WEIGHT) * distance_cm;
            self.run_length = self.run_length.saturating_add(1);
        } else {
            self.accepted_cm = distance_cm;
            self.run_length = 1;
        }

        PresenceReading {
            in_range: true,
            stable: self.run_length >= REQUIRED_STABLE_SAMPLES,
            distance_cm: Some(self.accepted_cm),
        }
    }

    /// Dwell the rider has to hold, keyed on the latest valid sample
    pub fn dwell_target(&self) -> Duration {
        match self.latest_cm {
            Some(distance_cm) if distance_cm <= NEAR_TIER_CM => NEAR_DWELL,
            _ => FAR_DWELL,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

fn is_in_range(distance_cm: f32) -> bool {
    distance_cm.is_finite()
        && distance_cm > 0.0
        && distance_cm <= NOMINAL_RANGE_CM + RANGE_MARGIN_CM
}

/// Accumulated time a rider has stood present and stable
///
/// Advances by the time elapsed between consecutive stable cycles and is
/// capped at the target, so k cycles of length d give `min(target, k * d)`.
#[derive(Debug, Clone)]
pub struct DwellTimer {
    accumulated: Duration,
    last_cycle: Option<Instant>,
}

impl Default for DwellTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DwellTimer {
    pub const fn new() -> Self {
        Self {
            accumulated: Duration::from_ticks(0),
            last_cycle: None,
        }
    }

    /// Drops progress to zero and starts counting from `now`
    pub fn restart(&mut self, now: Instant) {
        self.accumulated = Duration::from_ticks(0);
        self.last_cycle = Some(now);
    }

    /// Adds the time since the previous cycle, capped at `target`
    pub fn advance(&mut self, now: Instant, target: Duration) -> Duration {
        if let Some(last) = self.last_cycle {
            self.accumulated = min(self.accumulated + now.saturating_duration_since(last), target);
        }
        self.last_cycle = Some(now);
        self.accumulated
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut PresenceDetector, samples: &[Option<f32>]) -> PresenceReading {
        let mut reading = PresenceReading::ABSENT;
        for sample in samples {
            reading = detector.update(*sample);
        }
        reading
    }

    #[test]
    fn becomes_stable_after_three_close_samples() {
        let mut detector = PresenceDetector::new();
        assert!(!detector.update(Some(6.0)).stable);
        assert!(!detector.update(Some(6.3)).stable);
        let reading = detector.update(Some(5.9));
        assert!(reading.in_range);
        assert!(reading.stable);
    }

    #[test]
    fn blend_weights_previous_value() {
        let mut detector = PresenceDetector::new();
        detector.update(Some(6.0));
        let reading = detector.update(Some(7.0));
        let blended = reading.distance_cm.unwrap();
        assert!((blended - 6.3).abs() < 1e-4);
    }

    #[test]
    fn jump_outside_band_restarts_run() {
        let mut detector = PresenceDetector::new();
        feed(&mut detector, &[Some(6.0), Some(6.0), Some(6.0)]);
        let reading = detector.update(Some(10.0));
        assert!(reading.in_range);
        assert!(!reading.stable);
        assert_eq!(reading.distance_cm, Some(10.0));
    }

    #[test]
    fn invalid_samples_reset_the_run() {
        let mut detector = PresenceDetector::new();
        feed(&mut detector, &[Some(6.0), Some(6.0), Some(6.0)]);
        assert_eq!(detector.update(None), PresenceReading::ABSENT);
        assert_eq!(detector.update(Some(-1.0)), PresenceReading::ABSENT);
        assert_eq!(detector.update(Some(f32::NAN)), PresenceReading::ABSENT);
        assert!(!detector.update(Some(6.0)).stable);
    }

    #[test]
    fn range_includes_margin() {
        let mut detector = PresenceDetector::new();
        assert!(detector.update(Some(11.5)).in_range);
        assert!(detector.update(Some(12.0)).in_range);
        assert!(!detector.update(Some(12.5)).in_range);
    }

    #[test]
    fn dwell_tier_follows_latest_sample() {
        let mut detector = PresenceDetector::new();
        detector.update(Some(6.0));
        assert_eq!(detector.dwell_target(), NEAR_DWELL);
        detector.update(Some(11.0));
        assert_eq!(detector.dwell_target(), FAR_DWELL);
        detector.update(None);
        assert_eq!(detector.dwell_target(), FAR_DWELL);
    }

    #[test]
    fn dwell_accumulates_per_cycle_and_caps_at_target() {
        let target = Duration::from_millis(300);
        let cycle = 70;
        let mut dwell = DwellTimer::new();
        dwell.restart(Instant::from_millis(0));
        for k in 1..=10u64 {
            let elapsed = dwell.advance(Instant::from_millis(k * cycle), target);
            assert_eq!(elapsed, min(target, Duration::from_millis(k * cycle)));
        }
    }

    #[test]
    fn restart_drops_progress() {
        let target = Duration::from_millis(5_000);
        let mut dwell = DwellTimer::new();
        dwell.restart(Instant::from_millis(0));
        dwell.advance(Instant::from_millis(1_000), target);
        dwell.restart(Instant::from_millis(1_050));
        assert_eq!(dwell.elapsed(), Duration::from_ticks(0));
        assert_eq!(
            dwell.advance(Instant::from_millis(1_100), target),
            Duration::from_millis(50)
        );
    }
}
