//! Control loop
//!
//! One iteration per ranging sample: gathers the stand's other inputs, steps
//! the coordinator and routes what comes out of it.
//!
//! # Cycle
//! 1. Wait for the next distance sample (sets the 50ms pace)
//! 2. Sample block switches, confirm and reset buttons and the light sensor
//! 3. Pick up a ride link reply if one arrived
//! 4. Step the coordinator, hand calls to the link task and tones to the buzzer
//! 5. Publish lamp modes on state changes and the status screen every cycle
//!
//! # Light Sensor
//! The photodiode is read once per cycle through the ADC and passed through a
//! short moving median to knock out single-sample spikes before it reaches
//! the privilege verifier.

use defmt::{info, warn};
use embassy_rp::adc::{self, Adc, Channel};
use embassy_rp::gpio::{Input, Pull};
use embassy_time::Instant;
use moving_median::MovingMedian;
use rickshaw_stand::system::config::STAND_CONFIG;
use rickshaw_stand::system::coordinator::{Action, Coordinator, CycleInput};
use rickshaw_stand::system::indicator::indicate;
use rickshaw_stand::system::status::StatusScreen;

use crate::task::resources::{Irqs, LightSensorResources, StandInputResources};
use crate::task::{display, indicate as feedback, ranging, ride_link};

/// Light median window (3 samples, one cycle of latency)
const MEDIAN_WINDOW_SIZE: usize = 3;

/// Control task that samples the stand inputs every cycle and feeds them
/// through the coordinator, forwarding its calls and tones
#[embassy_executor::task]
pub async fn control(inputs: StandInputResources, light: LightSensorResources) {
    let blocks = [
        Input::new(inputs.block_0, Pull::Up),
        Input::new(inputs.block_1, Pull::Up),
        Input::new(inputs.block_2, Pull::Up),
    ];
    let confirm = Input::new(inputs.confirm, Pull::Up);
    let reset = Input::new(inputs.reset, Pull::Up);

    let mut adc = Adc::new(light.adc, Irqs, adc::Config::default());
    let mut light_channel = Channel::new_pin(light.pin, Pull::None);
    let mut light_filter = MovingMedian::<f32, MEDIAN_WINDOW_SIZE>::new();

    info!("stand {} at pickup {}", STAND_CONFIG.stand_id, STAND_CONFIG.pickup_id);
    let mut coordinator = Coordinator::new(STAND_CONFIG, Instant::now());
    let mut state = coordinator.state();
    feedback::show(indicate(state));

    let mut reset_was_down = false;

    loop {
        let distance_cm = ranging::wait().await;
        let now = Instant::now();

        let light_raw = match adc.read(&mut light_channel).await {
            Ok(raw) => {
                light_filter.add_value(f32::from(raw));
                light_filter.median() as u16
            }
            Err(e) => {
                warn!("light sensor read failed: {}", e);
                0
            }
        };

        // Reset acts on the press, not while held
        let reset_down = reset.is_low();
        let reset_pressed = reset_down && !reset_was_down;
        reset_was_down = reset_down;

        let input = CycleInput {
            now,
            distance_cm,
            blocks: blocks.each_ref().map(|block| block.is_low()),
            light: light_raw,
            confirm_pressed: confirm.is_low(),
            reset: reset_pressed,
            reply: ride_link::try_reply(),
        };

        for action in coordinator.step(input) {
            match action {
                Action::Call(call) => ride_link::request(call),
                Action::Tone(tone) => feedback::play(tone),
            }
        }

        if coordinator.state() != state {
            state = coordinator.state();
            feedback::show(indicate(state));
        }
        display::show(StatusScreen::render(&coordinator.snapshot(), coordinator.config()));
    }
}
