//! Status screen text
//!
//! The display shows four lines of at most [`LINE_WIDTH`] characters (6x10
//! font on a 128 pixel wide panel):
//!
//! 1. What the rider should do next
//! 2. Distance and dwell progress
//! 3. Light level and hold progress
//! 4. Destination, ride identifier or failure
//!
//! Anything longer than a line is cut off at the panel edge.

use core::fmt::{self, Write};

use heapless::String;

use crate::system::config::StandConfig;
use crate::system::coordinator::Snapshot;
use crate::system::state::CoordinatorState;

/// Characters per display line
pub const LINE_WIDTH: usize = 21;

/// Lines on the display
pub const LINE_COUNT: usize = 4;

pub type Line = String<LINE_WIDTH>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusScreen {
    pub lines: [Line; LINE_COUNT],
}

/// Writer that silently drops whatever does not fit the line
struct Clipped<'a>(&'a mut Line);

impl Write for Clipped<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

fn line(args: fmt::Arguments<'_>) -> Line {
    let mut line = Line::new();
    let _ = Clipped(&mut line).write_fmt(args);
    line
}

fn headline(state: CoordinatorState) -> &'static str {
    match state {
        CoordinatorState::Idle => "Stand on the marker",
        CoordinatorState::PresenceTracking => "Hold still...",
        CoordinatorState::WaitingBlock => "Pick a destination",
        CoordinatorState::WaitingLaser => "Shine your light",
        CoordinatorState::WaitingConfirm => "Press confirm",
        CoordinatorState::Dispatching => "Requesting ride...",
        CoordinatorState::WaitingPuller => "Finding a puller",
        CoordinatorState::RideAccepted => "Puller on the way",
        CoordinatorState::PickupConfirmed => "Enjoy your ride",
        CoordinatorState::RideCompleted => "Ride completed",
        CoordinatorState::RejectedOrError => "Ride failed",
    }
}

impl StatusScreen {
    pub fn render(snapshot: &Snapshot, config: &StandConfig) -> Self {
        let presence = match snapshot.presence.distance_cm {
            Some(distance) => line(format_args!(
                "{:.1}cm {}/{}s",
                distance,
                snapshot.dwell.as_millis() / 1_000,
                snapshot.dwell_target.as_millis() / 1_000
            )),
            None => line(format_args!("no rider")),
        };

        let privilege = &snapshot.privilege;
        let light = if privilege.calibrating {
            line(format_args!("light: calibrating"))
        } else {
            line(format_args!(
                "light {:.0}% hold {}.{}s",
                privilege.percent,
                privilege.hold.as_millis() / 1_000,
                (privilege.hold.as_millis() % 1_000) / 100
            ))
        };

        let detail = match (&snapshot.failure, &snapshot.ride, snapshot.destination) {
            (Some(failure), _, _) => line(format_args!("{}", failure)),
            (None, Some(ride), _) => line(format_args!("{} {}", ride.id, ride.destination_name)),
            (None, None, Some(index)) => {
                line(format_args!("to {}", config.destination(index).unwrap_or("?")))
            }
            (None, None, None) => line(format_args!("stand {}", config.stand_id)),
        };

        Self {
            lines: [line(format_args!("{}", headline(snapshot.state))), presence, light, detail],
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_time::{Duration, Instant};

    use super::*;
    use crate::sensing::presence::PresenceReading;
    use crate::sensing::privilege::PrivilegeSignal;
    use crate::system::ride::{RideRequest, RideTicket};
    use crate::system::state::FailureReason;

    const CONFIG: StandConfig = StandConfig {
        stand_id: "STAND-01",
        pickup_id: "GATE",
        destinations: ["LIB", "MKT", "STN"],
    };

    fn snapshot(state: CoordinatorState) -> Snapshot {
        Snapshot {
            now: Instant::from_millis(0),
            state,
            presence: PresenceReading::ABSENT,
            dwell: Duration::from_ticks(0),
            dwell_target: Duration::from_millis(3_000),
            privilege: PrivilegeSignal {
                percent: 0.0,
                engaged: false,
                active: false,
                hold: Duration::from_ticks(0),
                verified: false,
                calibrating: false,
            },
            destination: None,
            ride: None,
            failure: None,
        }
    }

    #[test]
    fn idle_screen_names_the_stand() {
        let screen = StatusScreen::render(&snapshot(CoordinatorState::Idle), &CONFIG);
        assert_eq!(screen.lines[0].as_str(), "Stand on the marker");
        assert_eq!(screen.lines[1].as_str(), "no rider");
        assert_eq!(screen.lines[2].as_str(), "light 0% hold 0.0s");
        assert_eq!(screen.lines[3].as_str(), "stand STAND-01");
    }

    #[test]
    fn progress_lines_show_dwell_and_hold() {
        let mut snap = snapshot(CoordinatorState::WaitingLaser);
        snap.presence = PresenceReading {
            in_range: true,
            stable: true,
            distance_cm: Some(6.04),
        };
        snap.dwell = Duration::from_millis(5_000);
        snap.dwell_target = Duration::from_millis(5_000);
        snap.privilege.percent = 14.6;
        snap.privilege.hold = Duration::from_millis(2_350);
        snap.destination = Some(2);

        let screen = StatusScreen::render(&snap, &CONFIG);
        assert_eq!(screen.lines[1].as_str(), "6.0cm 5/5s");
        assert_eq!(screen.lines[2].as_str(), "light 15% hold 2.3s");
        assert_eq!(screen.lines[3].as_str(), "to STN");
    }

    #[test]
    fn failure_wins_over_ride_and_long_text_is_clipped() {
        let mut snap = snapshot(CoordinatorState::RejectedOrError);
        snap.ride = Some(RideRequest::from_ticket(
            RideTicket {
                id: "r1".try_into().unwrap(),
                pickup_name: "Gate".try_into().unwrap(),
                destination_name: "Library".try_into().unwrap(),
            },
            0,
            Instant::from_millis(0),
        ));
        snap.failure = Some(FailureReason::Link(crate::system::ride::RideError::Refused(
            "no pullers online in this area".try_into().unwrap(),
        )));

        let screen = StatusScreen::render(&snap, &CONFIG);
        assert_eq!(screen.lines[0].as_str(), "Ride failed");
        assert_eq!(screen.lines[3].as_str(), "link: refused: no pul");
    }
}
