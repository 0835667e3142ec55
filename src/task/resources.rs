//! Hardware resource assignment
//!
//! Every task gets its own group of pins and peripherals; nothing is shared
//! between tasks, so no peripheral sits behind a mutex.
//!
//! # Resource Groups
//! - Ranging: HC-SR04 trigger and echo pins
//! - Stand inputs: destination block switches, confirm and reset buttons
//! - Light sensor: ADC and the photodiode pin
//! - Lamps: yellow, red and green
//! - Buzzer: active buzzer, on while driven high
//! - Display: SSD1306 on I2C0
//! - Ride link: UART0 to the network bridge

use assign_resources::assign_resources;
use embassy_rp::adc::InterruptHandler as AdcInterruptHandler;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, UART0};
use embassy_rp::uart::BufferedInterruptHandler;

assign_resources! {
    /// HC-SR04 ultrasonic ranging sensor pins
    ranging: RangingResources {
        trigger_pin: PIN_15,
        echo_pin: PIN_14,
    },
    /// Switches and buttons sampled by the control loop (all active low)
    stand_inputs: StandInputResources {
        block_0: PIN_16,
        block_1: PIN_17,
        block_2: PIN_18,
        confirm: PIN_10,
        reset: PIN_11,
    },
    /// Light sensor on ADC channel 0
    light_sensor: LightSensorResources {
        adc: ADC,
        pin: PIN_26,
    },
    /// Status lamps
    lamps: LampResources {
        yellow: PIN_2,
        red: PIN_3,
        green: PIN_4,
    },
    /// Active buzzer
    buzzer: BuzzerResources {
        pin: PIN_5,
    },
    /// 128x64 SSD1306 status display
    display: DisplayResources {
        i2c: I2C0,
        scl: PIN_13,
        sda: PIN_12,
    },
    /// Serial link to the network bridge
    ride_link: RideLinkResources {
        uart: UART0,
        tx_pin: PIN_0,
        rx_pin: PIN_1,
    },
}

bind_interrupts!(pub struct Irqs {
    ADC_IRQ_FIFO => AdcInterruptHandler;
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});
