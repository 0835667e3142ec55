//! Status display
//!
//! Draws the four status lines on the SSD1306. The control loop publishes a
//! fresh screen every cycle; the panel is only redrawn when the text changed
//! and at most every `REFRESH_INTERVAL`, since a blocking I2C flush takes a
//! noticeable slice of a control cycle.

use defmt::{info, warn};
use embassy_rp::i2c::{self, I2c};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use rickshaw_stand::system::status::StatusScreen;
use ssd1306::{prelude::*, I2CDisplayInterface, Ssd1306};

use crate::task::resources::DisplayResources;

/// Minimum time between two redraws
const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Vertical distance between text lines in pixels
const LINE_SPACING: i32 = 16;

/// I2C fast mode
const I2C_FREQUENCY: u32 = 400_000;

static SCREEN: Signal<CriticalSectionRawMutex, StatusScreen> = Signal::new();

pub fn show(screen: StatusScreen) {
    SCREEN.signal(screen);
}

/// Display task that redraws the status screen from coordinator snapshots
#[embassy_executor::task]
pub async fn display(r: DisplayResources) {
    let mut config = i2c::Config::default();
    config.frequency = I2C_FREQUENCY;
    let i2c = I2c::new_blocking(r.i2c, r.scl, r.sda, config);

    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    if display.init().is_err() {
        warn!("display did not answer, status screen disabled");
        return;
    }
    info!("display ready");

    let text_style = MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build();
    let mut shown = StatusScreen::default();

    loop {
        let screen = SCREEN.wait().await;
        if screen == shown {
            continue;
        }

        display.clear_buffer();
        for (row, line) in screen.lines.iter().enumerate() {
            let origin = Point::new(0, row as i32 * LINE_SPACING);
            let _ = Text::with_baseline(line, origin, text_style, Baseline::Top).draw(&mut display);
        }
        if display.flush().is_err() {
            warn!("display flush failed");
        }
        shown = screen;

        Timer::after(REFRESH_INTERVAL).await;
    }
}
