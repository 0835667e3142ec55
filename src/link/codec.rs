//! Ride service wire format
//!
//! One request line and one response line per call, `\n` terminated. Each line
//! is a list of URL-form encoded `field=value` pairs joined by `&`:
//!
//! ```text
//! op=create&seq=7&requester=STAND-01&pickup=GATE&destination=LIB
//! seq=7&result=ok&id=r1&pickup_name=Main+Gate&destination_name=Library
//!
//! op=status&seq=8&id=r1
//! seq=8&result=ok&status=accepted
//! seq=8&result=not_found
//! seq=8&result=error&reason=backend+down
//! ```
//!
//! `seq` is echoed by the network bridge so a late answer to an abandoned call
//! can be told apart from the answer to the current one.

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::system::ride::{CreateRide, RideError, RideStatus, RideTicket, REASON_CAPACITY};

/// Longest line accepted in either direction, without the terminator
pub const MAX_LINE: usize = 192;

/// One encoded request line
pub type Line = String<MAX_LINE>;

pub fn encode_create(seq: u16, request: &CreateRide) -> Result<Line, RideError> {
    let mut line = Line::new();
    push_field(&mut line, "op", "create")?;
    push_seq(&mut line, seq)?;
    push_field(&mut line, "requester", request.requester)?;
    push_field(&mut line, "pickup", request.pickup)?;
    push_field(&mut line, "destination", request.destination)?;
    Ok(line)
}

pub fn encode_status(seq: u16, id: &str) -> Result<Line, RideError> {
    let mut line = Line::new();
    push_field(&mut line, "op", "status")?;
    push_seq(&mut line, seq)?;
    push_field(&mut line, "id", id)?;
    Ok(line)
}

/// Sequence number echoed in a response line
pub fn response_seq(line: &str) -> Option<u16> {
    raw_field(line, "seq")?.parse().ok()
}

pub fn decode_create(line: &str) -> Result<RideTicket, RideError> {
    match raw_field(line, "result") {
        Some("ok") => Ok(RideTicket {
            id: required(line, "id")?,
            pickup_name: required(line, "pickup_name")?,
            destination_name: required(line, "destination_name")?,
        }),
        Some("error") => Err(refusal(line)),
        _ => Err(RideError::Malformed),
    }
}

pub fn decode_status(line: &str) -> Result<RideStatus, RideError> {
    match raw_field(line, "result") {
        Some("ok") => {
            let status: String<24> = required(line, "status")?;
            RideStatus::parse(&status).ok_or(RideError::Malformed)
        }
        Some("not_found") => Ok(RideStatus::NotFound),
        Some("error") => Err(refusal(line)),
        _ => Err(RideError::Malformed),
    }
}

fn refusal(line: &str) -> RideError {
    let reason = raw_field(line, "reason")
        .and_then(|raw| decode::<REASON_CAPACITY>(raw, true).ok())
        .unwrap_or_default();
    RideError::Refused(reason)
}

/// Still-encoded value of the first `key` field
fn raw_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value)
}

/// Decoded value of a field that has to be present and non-empty
fn required<const N: usize>(line: &str, key: &str) -> Result<String<N>, RideError> {
    let value = decode::<N>(raw_field(line, key).ok_or(RideError::Malformed)?, false)?;
    if value.is_empty() {
        return Err(RideError::Malformed);
    }
    Ok(value)
}

/// Percent-decodes `raw`; with `truncate` an overlong value is cut instead of rejected
fn decode<const N: usize>(raw: &str, truncate: bool) -> Result<String<N>, RideError> {
    let mut bytes: Vec<u8, N> = Vec::new();
    let mut input = raw.bytes();
    let mut truncated = false;

    while let Some(byte) = input.next() {
        let decoded = match byte {
            b'+' => b' ',
            b'%' => {
                let high = input.next().and_then(hex_value).ok_or(RideError::Malformed)?;
                let low = input.next().and_then(hex_value).ok_or(RideError::Malformed)?;
                (high << 4) | low
            }
            other => other,
        };
        if bytes.push(decoded).is_err() {
            if !truncate {
                return Err(RideError::Overflow);
            }
            truncated = true;
            break;
        }
    }

    let text = match core::str::from_utf8(&bytes) {
        Ok(text) => text,
        // cut in the middle of a multi-byte character
        Err(e) if truncated && e.error_len().is_none() => {
            core::str::from_utf8(&bytes[..e.valid_up_to()]).map_err(|_| RideError::Malformed)?
        }
        Err(_) => return Err(RideError::Malformed),
    };
    String::try_from(text).map_err(|_| RideError::Overflow)
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|value| value as u8)
}

fn push_field(line: &mut Line, key: &str, value: &str) -> Result<(), RideError> {
    start_field(line, key)?;
    for byte in value.bytes() {
        let pushed = match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                line.push(byte as char).map_err(|_| core::fmt::Error)
            }
            b' ' => line.push('+').map_err(|_| core::fmt::Error),
            _ => write!(line, "%{:02X}", byte),
        };
        pushed.map_err(|_| RideError::Overflow)?;
    }
    Ok(())
}

fn push_seq(line: &mut Line, seq: u16) -> Result<(), RideError> {
    start_field(line, "seq")?;
    write!(line, "{}", seq).map_err(|_| RideError::Overflow)
}

fn start_field(line: &mut Line, key: &str) -> Result<(), RideError> {
    if !line.is_empty() {
        line.push('&').map_err(|_| RideError::Overflow)?;
    }
    line.push_str(key).map_err(|_| RideError::Overflow)?;
    line.push('=').map_err(|_| RideError::Overflow)
}
