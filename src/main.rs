//! Rickshaw stand firmware entry point
//!
//! Initializes the RP2350 and spawns the stand tasks.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use task::resources::{
    AssignedResources, BuzzerResources, DisplayResources, LampResources, LightSensorResources,
    RangingResources, RideLinkResources, StandInputResources,
};
use {defmt_rtt as _, panic_probe as _};

use crate::task::{
    control::control,
    display::display,
    indicate::{buzzer, lamps},
    ranging::ranging,
    ride_link::ride_link,
};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Task implementations
mod task;

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // Split the resources into separate groups for each task
    let r = split_resources!(p);

    // Outputs first so the first control cycle has somewhere to report to
    spawner.spawn(lamps(r.lamps)).unwrap();
    spawner.spawn(buzzer(r.buzzer)).unwrap();
    spawner.spawn(display(r.display)).unwrap();
    spawner.spawn(ride_link(r.ride_link)).unwrap();
    spawner.spawn(control(r.stand_inputs, r.light_sensor)).unwrap();
    // Ranging paces the control loop, start it last
    spawner.spawn(ranging(r.ranging)).unwrap();
}
