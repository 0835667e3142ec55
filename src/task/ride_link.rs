//! Ride service link task
//!
//! Runs the request/response exchanges with the network bridge off the
//! control loop. The control loop queues a call and picks the
//! reply up on a later cycle; sensing never waits on the network.
//!
//! # Timeouts
//! Every call is bounded by `REQUEST_TIMEOUT`. A call that runs out of time
//! is answered with `RideError::Timeout`; its late response line is skipped
//! by sequence number on the next exchange.

use defmt::{info, warn};
use embassy_rp::uart::{BufferedUart, Config};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_time::{with_timeout, Duration};
use rickshaw_stand::link::{LinkCall, LinkReply, RideLink};
use rickshaw_stand::system::ride::RideError;

use crate::task::resources::{Irqs, RideLinkResources};

/// Network bridge serial speed
const BAUD_RATE: u32 = 115_200;

/// Upper bound for one request/response exchange
const REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);

/// UART ring buffer size, each direction
const BUFFER_SIZE: usize = 256;

/// Calls waiting for the link; the coordinator keeps at most one in flight
static CALLS: Channel<CriticalSectionRawMutex, LinkCall, 2> = Channel::new();

/// Replies waiting for the control loop
static REPLIES: Channel<CriticalSectionRawMutex, LinkReply, 2> = Channel::new();

/// Queues a call without waiting
pub fn request(call: LinkCall) {
    if let Err(TrySendError::Full(call)) = CALLS.try_send(call) {
        warn!("ride link busy, call dropped");
        // answer right away so the coordinator does not wait forever
        if REPLIES.try_send(LinkReply::failed(&call, RideError::Io)).is_err() {
            warn!("reply queue full, failure for dropped call lost");
        }
    }
}

/// Reply that arrived since the last check, if any
pub fn try_reply() -> Option<LinkReply> {
    REPLIES.try_receive().ok()
}

/// Ride link task that runs one queued call at a time against the ride
/// service and posts the reply
#[embassy_executor::task]
pub async fn ride_link(r: RideLinkResources) {
    let mut config = Config::default();
    config.baudrate = BAUD_RATE;

    let mut tx_buffer = [0u8; BUFFER_SIZE];
    let mut rx_buffer = [0u8; BUFFER_SIZE];
    let uart = BufferedUart::new(
        r.uart,
        Irqs,
        r.tx_pin,
        r.rx_pin,
        &mut tx_buffer,
        &mut rx_buffer,
        config,
    );
    let mut link = RideLink::new(uart);
    info!("ride link up at {} baud", BAUD_RATE);

    loop {
        let call = CALLS.receive().await;
        let reply = match with_timeout(REQUEST_TIMEOUT, link.call(&call)).await {
            Ok(reply) => reply,
            Err(_) => {
                warn!("ride service call timed out");
                LinkReply::failed(&call, RideError::Timeout)
            }
        };
        REPLIES.send(reply).await;
    }
}
