//! Lamp and buzzer drivers
//!
//! The control loop publishes the lamp modes for the current state and queues
//! tones; these tasks turn them into pin levels.

use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Level, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use rickshaw_stand::system::indicator::{Indicator, Tone, BLINK_INTERVAL};

use crate::task::resources::{BuzzerResources, LampResources};

/// Lamp modes for the current state
static LAMPS: Signal<CriticalSectionRawMutex, Indicator> = Signal::new();

/// Tones waiting to be played, in order
static TONES: Channel<CriticalSectionRawMutex, Tone, 4> = Channel::new();

pub fn show(indicator: Indicator) {
    LAMPS.signal(indicator);
}

/// Queues a tone; dropped if the buzzer is backed up
pub fn play(tone: Tone) {
    if TONES.try_send(tone).is_err() {
        defmt::warn!("tone queue full, {} dropped", tone);
    }
}

/// Time left until the shared blink phase flips
fn until_next_flip(now: Instant) -> Duration {
    let interval = BLINK_INTERVAL.as_millis();
    Duration::from_millis(interval - now.as_millis() % interval)
}

/// Lamp task that shows the latest indicator and blinks it when asked
#[embassy_executor::task]
pub async fn lamps(r: LampResources) {
    let mut yellow = Output::new(r.yellow, Level::Low);
    let mut red = Output::new(r.red, Level::Low);
    let mut green = Output::new(r.green, Level::Low);
    let mut current = Indicator::default();

    loop {
        let now = Instant::now();
        yellow.set_level(Level::from(current.yellow.is_lit(now)));
        red.set_level(Level::from(current.red.is_lit(now)));
        green.set_level(Level::from(current.green.is_lit(now)));

        // Wait for either the next blink flip or new lamp modes
        if let Either::Second(indicator) =
            select(Timer::after(until_next_flip(now)), LAMPS.wait()).await
        {
            current = indicator;
        }
    }
}

/// Buzzer task that plays queued tones one after another
#[embassy_executor::task]
pub async fn buzzer(r: BuzzerResources) {
    let mut buzzer = Output::new(r.pin, Level::Low);

    loop {
        let tone = TONES.receive().await;
        defmt::debug!("playing {}", tone);
        for beep in tone.pattern() {
            buzzer.set_high();
            Timer::after_millis(u64::from(beep.on_ms)).await;
            buzzer.set_low();
            Timer::after_millis(u64::from(beep.off_ms)).await;
        }
    }
}
