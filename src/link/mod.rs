//! Ride service link
//!
//! The stand has no network stack of its own. A network bridge sits on the
//! other end of a UART and forwards each request line to the ride service,
//! answering with one response line (see [`codec`] for the format).
//!
//! [`RideLink`] performs one exchange at a time over any `embedded-io-async`
//! transport. Timeouts are applied by the caller, so a call abandoned on
//! timeout leaves its late answer in the stream; the sequence number lets the
//! next exchange skip it.

pub mod codec;

use embedded_io_async::{Read, Write};
use heapless::Vec;

use crate::system::ride::{CreateRide, RideError, RideId, RideStatus, RideTicket};

/// Request handed from the coordinator to the link task
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkCall {
    Create(CreateRide),
    Status(RideId),
}

/// Answer to a [`LinkCall`], fed back into the coordinator on a later cycle
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkReply {
    Created(Result<RideTicket, RideError>),
    Status(Result<RideStatus, RideError>),
}

impl LinkReply {
    /// Failed reply of the same kind as `call`
    pub fn failed(call: &LinkCall, error: RideError) -> Self {
        match call {
            LinkCall::Create(_) => Self::Created(Err(error)),
            LinkCall::Status(_) => Self::Status(Err(error)),
        }
    }
}

pub struct RideLink<T> {
    io: T,
    seq: u16,
    line: Vec<u8, { codec::MAX_LINE }>,
}

impl<T: Read + Write> RideLink<T> {
    pub fn new(io: T) -> Self {
        Self {
            io,
            seq: 0,
            line: Vec::new(),
        }
    }

    /// Performs `call` and wraps the outcome into the matching reply
    pub async fn call(&mut self, call: &LinkCall) -> LinkReply {
        match call {
            LinkCall::Create(request) => LinkReply::Created(self.create_ride(request).await),
            LinkCall::Status(id) => LinkReply::Status(self.ride_status(id).await),
        }
    }

    pub async fn create_ride(&mut self, request: &CreateRide) -> Result<RideTicket, RideError> {
        let seq = self.next_seq();
        let line = codec::encode_create(seq, request)?;
        codec::decode_create(self.exchange(seq, &line).await?)
    }

    pub async fn ride_status(&mut self, id: &str) -> Result<RideStatus, RideError> {
        let seq = self.next_seq();
        let line = codec::encode_status(seq, id)?;
        codec::decode_status(self.exchange(seq, &line).await?)
    }

    fn next_seq(&mut self) -> u16 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Sends one request line and returns the response line carrying `seq`
    async fn exchange(&mut self, seq: u16, request: &str) -> Result<&str, RideError> {
        self.io.write_all(request.as_bytes()).await.map_err(|_| RideError::Io)?;
        self.io.write_all(b"\n").await.map_err(|_| RideError::Io)?;
        self.io.flush().await.map_err(|_| RideError::Io)?;

        loop {
            let complete = self.read_line().await?;
            let (line, valid) = match core::str::from_utf8(&self.line) {
                Ok(line) => (line, true),
                Err(e) => {
                    let prefix = &self.line[..e.valid_up_to()];
                    (core::str::from_utf8(prefix).unwrap_or_default(), false)
                }
            };
            match codec::response_seq(line) {
                Some(answered) if answered == seq && complete && valid => break,
                Some(answered) if answered == seq => return Err(RideError::Malformed),
                Some(answered) => {
                    debug!("Skipping stale response seq={} (waiting for {})", answered, seq)
                }
                // tail of a line cut short by an abandoned call
                None => debug!("Skipping unsequenced line"),
            }
        }

        core::str::from_utf8(&self.line).map_err(|_| RideError::Malformed)
    }

    /// Reads up to the next `\n` into the line buffer, dropping `\r`.
    ///
    /// Returns `false` when the line did not fit; the buffer then holds its
    /// beginning and the rest has been drained.
    async fn read_line(&mut self) -> Result<bool, RideError> {
        self.line.clear();
        let mut complete = true;
        let mut byte = [0u8; 1];

        loop {
            let read = self.io.read(&mut byte).await.map_err(|_| RideError::Io)?;
            if read == 0 {
                return Err(RideError::Io);
            }
            match byte[0] {
                b'\n' => return Ok(complete),
                b'\r' => {}
                other => complete &= self.line.push(other).is_ok(),
            }
        }
    }
}
