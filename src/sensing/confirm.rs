//! Confirm button gate
//!
//! Debounces the momentary confirm button, sampled once per control cycle,
//! into a single confirm event on release. A press that is held past
//! `HOLD_TIMEOUT` is treated as a stuck or jammed button: it raises
//! `AbnormalHold` once and its eventual release is swallowed, so a stuck
//! button can never confirm a ride on its own.

use embassy_time::{Duration, Instant};

/// A new raw level must persist this long before it is accepted
const DEBOUNCE_DURATION: Duration = Duration::from_millis(30);

/// Continuous press duration treated as a stuck button
pub const HOLD_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Outcome of one press; a press yields at most one of these
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GateEvent {
    /// Pressed and released within the hold timeout
    Confirmed,
    /// Held past the hold timeout
    AbnormalHold,
}

#[derive(Debug, Clone, Default)]
pub struct ConfirmGate {
    /// Debounced level
    pressed: bool,
    /// Raw level has disagreed with the debounced one since
    pending_since: Option<Instant>,
    /// Debounced press start of the press being tracked
    press_started: Option<Instant>,
    /// Ignore the button until it is seen released
    suppressed: bool,
}

impl ConfirmGate {
    pub const fn new() -> Self {
        Self {
            pressed: false,
            pending_since: None,
            press_started: None,
            suppressed: false,
        }
    }

    pub fn update(&mut self, raw_pressed: bool, now: Instant) -> Option<GateEvent> {
        if raw_pressed == self.pressed {
            self.pending_since = None;
        } else {
            let since = *self.pending_since.get_or_insert(now);
            if now.saturating_duration_since(since) >= DEBOUNCE_DURATION {
                self.pressed = raw_pressed;
                self.pending_since = None;
                return self.on_edge(now);
            }
        }

        if self.pressed && !self.suppressed {
            if let Some(started) = self.press_started {
                if now.saturating_duration_since(started) >= HOLD_TIMEOUT {
                    warn!("confirm button held for {} ms", HOLD_TIMEOUT.as_millis());
                    self.press_started = None;
                    self.suppressed = true;
                    return Some(GateEvent::AbnormalHold);
                }
            }
        }

        None
    }

    fn on_edge(&mut self, now: Instant) -> Option<GateEvent> {
        if self.pressed {
            if !self.suppressed {
                self.press_started = Some(now);
            }
            return None;
        }

        let started = self.press_started.take();
        if self.suppressed {
            self.suppressed = false;
            return None;
        }
        started.map(|_| GateEvent::Confirmed)
    }

    /// Drops the tracked press; a button that is down right now has to be
    /// released before it can confirm again.
    pub fn reset(&mut self) {
        self.pending_since = None;
        self.press_started = None;
        self.suppressed = self.pressed;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}
