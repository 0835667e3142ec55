//! Presence ranging
//!
//! Samples the HC-SR04 above the marker at a fixed rate. Each sample is one
//! control cycle: the control loop waits on it, so this task sets the pace of
//! the whole stand.
//!
//! # Sensor Operation
//! - Measurements every 50ms on a ticker, so slow echoes do not stretch the cycle
//! - Distance reported in centimeters
//! - Assumes fixed ambient temperature of 21.5°C
//! - Failed measurements (no echo, timeout) are passed on as `None`; the
//!   presence detector treats them as "nobody there"

use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};
use hcsr04_async::{Config, DistanceUnit, Hcsr04, TemperatureUnit};

use crate::task::resources::RangingResources;

/// Control cycle length
const MEASUREMENT_INTERVAL: Duration = Duration::from_millis(50);

/// Fixed ambient temperature for distance calculations
const TEMPERATURE: f64 = 21.5;

/// Latest sample, `None` when the measurement failed
static DISTANCE: Signal<CriticalSectionRawMutex, Option<f32>> = Signal::new();

/// Waits for the next distance sample
pub async fn wait() -> Option<f32> {
    DISTANCE.wait().await
}

/// Main ranging task that measures the rider distance once per cycle and
/// publishes the raw sample, `None` when the echo is lost
#[embassy_executor::task]
pub async fn ranging(r: RangingResources) {
    let config = Config {
        distance_unit: DistanceUnit::Centimeters,
        temperature_unit: TemperatureUnit::Celsius,
    };

    let trigger = Output::new(r.trigger_pin, Level::Low);
    let echo = Input::new(r.echo_pin, Pull::None);
    let mut sensor = Hcsr04::new(trigger, echo, config);

    let mut ticker = Ticker::every(MEASUREMENT_INTERVAL);
    loop {
        let sample = match sensor.measure(TEMPERATURE).await {
            Ok(distance_cm) => Some(distance_cm as f32),
            Err(e) => {
                defmt::trace!("ranging failed: {}", e);
                None
            }
        };
        DISTANCE.signal(sample);
        ticker.next().await;
    }
}
