//! Dispatch coordinator
//!
//! Owns every piece of mutable stand state and advances it one control cycle
//! at a time. Each cycle the firmware hands in a [`CycleInput`] (the latest
//! samples plus any link reply that arrived since the previous cycle) and gets
//! back the [`Action`]s to carry out: link calls for the ride link task and
//! tones for the buzzer.
//!
//! # Link Calls
//! At most one call is in flight. The coordinator remembers which kind it is
//! waiting for, never issues another one until the reply is in, and drops a
//! reply whose state has been left in the meantime. A reset request that
//! arrives while a create-ride call is in flight is held back until that
//! reply has been seen, so a ride can never be created behind the stand's
//! back.
//!
//! # Full Reset
//! Clears the latched destination, destination candidate, verifier progress,
//! confirm gate, presence window, dwell, cached ride and failure reason, and
//! returns to `Idle`. The dispatch lockout and the in-flight call survive it.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::link::{LinkCall, LinkReply};
use crate::sensing::confirm::{ConfirmGate, GateEvent};
use crate::sensing::destination::{DestinationSelector, DESTINATION_COUNT};
use crate::sensing::presence::{DwellTimer, PresenceDetector, PresenceReading};
use crate::sensing::privilege::{PrivilegeSignal, PrivilegeVerifier};
use crate::system::config::StandConfig;
use crate::system::indicator::{indicate, Tone};
use crate::system::ride::{RideError, RideRequest, RideStatus, RideTicket};
use crate::system::state::{CoordinatorState, FailureReason};

/// Presence may drop out this long while waiting for the light or the button
const PRESENCE_GRACE: Duration = Duration::from_millis(1_500);

/// Minimum spacing between two create-ride calls, counted from the last one
/// issued. A full reset does not clear it.
const DISPATCH_LOCKOUT: Duration = Duration::from_millis(2_000);

/// Status poll interval while a ride is live
const POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Time a puller has to accept a ride, counted from its creation
pub const PULLER_TIMEOUT: Duration = Duration::from_millis(60_000);

/// How long `RideCompleted` and `RejectedOrError` stay on display
pub const DISPLAY_DWELL: Duration = Duration::from_millis(5_000);

/// Samples and events gathered for one control cycle
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleInput {
    pub now: Instant,
    /// Ranging result, `None` on sensor timeout
    pub distance_cm: Option<f32>,
    /// Destination block switches, closed = `true`
    pub blocks: [bool; DESTINATION_COUNT],
    /// Raw 12-bit light sensor reading
    pub light: u16,
    /// Raw confirm button level
    pub confirm_pressed: bool,
    /// Reset button was pressed since the previous cycle
    pub reset: bool,
    /// Link reply that arrived since the previous cycle
    pub reply: Option<LinkReply>,
}

impl CycleInput {
    /// Input with nothing present and nothing pressed
    pub fn at(now: Instant) -> Self {
        Self {
            now,
            distance_cm: None,
            blocks: [false; DESTINATION_COUNT],
            light: 0,
            confirm_pressed: false,
            reset: false,
            reply: None,
        }
    }
}

/// Work the firmware has to carry out after a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Hand a call to the ride link task
    Call(LinkCall),
    /// Play a tone on the buzzer
    Tone(Tone),
}

/// Actions produced by one cycle
pub type Actions = Vec<Action, 4>;

/// Read-only view of the coordinator for the status screen
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub now: Instant,
    pub state: CoordinatorState,
    pub presence: PresenceReading,
    pub dwell: Duration,
    pub dwell_target: Duration,
    pub privilege: PrivilegeSignal,
    pub destination: Option<u8>,
    pub ride: Option<RideRequest>,
    pub failure: Option<FailureReason>,
}

/// Kind of the link call currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Pending {
    Create,
    Status,
}

/// Drives one stand from the rider stepping onto the marker through to the
/// ride it dispatches
pub struct Coordinator {
    config: StandConfig,
    state: CoordinatorState,
    entered_at: Instant,
    now: Instant,

    presence: PresenceDetector,
    reading: PresenceReading,
    dwell: DwellTimer,
    selector: DestinationSelector,
    verifier: PrivilegeVerifier,
    privilege: PrivilegeSignal,
    gate: ConfirmGate,

    latched: Option<u8>,
    absent_since: Option<Instant>,
    ride: Option<RideRequest>,
    failure: Option<FailureReason>,

    outstanding: Option<Pending>,
    reset_deferred: bool,
    last_dispatch: Option<Instant>,
    last_poll: Option<Instant>,
}

impl Coordinator {
    /// Creates a coordinator sitting in `Idle` for the given stand
    pub fn new(config: StandConfig, now: Instant) -> Self {
        let verifier = PrivilegeVerifier::new();
        let privilege = verifier.signal();

        Self {
            config,
            state: CoordinatorState::Idle,
            entered_at: now,
            now,
            presence: PresenceDetector::new(),
            reading: PresenceReading::ABSENT,
            dwell: DwellTimer::new(),
            selector: DestinationSelector::new(),
            verifier,
            privilege,
            gate: ConfirmGate::new(),
            latched: None,
            absent_since: None,
            ride: None,
            failure: None,
            outstanding: None,
            reset_deferred: false,
            last_dispatch: None,
            last_poll: None,
        }
    }

    /// Current coordinator state
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn config(&self) -> &StandConfig {
        &self.config
    }

    pub fn ride(&self) -> Option<&RideRequest> {
        self.ride.as_ref()
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// A link call is in flight
    pub fn is_waiting_on_link(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            now: self.now,
            state: self.state,
            presence: self.reading,
            dwell: self.dwell.elapsed(),
            dwell_target: self.presence.dwell_target(),
            privilege: self.privilege,
            destination: self.latched,
            ride: self.ride.clone(),
            failure: self.failure.clone(),
        }
    }

    /// Advances the stand by one control cycle
    pub fn step(&mut self, input: CycleInput) -> Actions {
        let now = input.now;
        let mut actions = Actions::new();
        self.now = now;

        self.reading = self.presence.update(input.distance_cm);
        self.privilege = self.verifier.update(input.light, now);
        let gate_event = self.gate.update(input.confirm_pressed, now);

        if let Some(reply) = input.reply {
            self.on_reply(reply, now, &mut actions);
        }

        if input.reset {
            if self.state == CoordinatorState::Dispatching {
                info!("reset requested while dispatching, deferred until reply");
                self.reset_deferred = true;
            } else {
                info!("reset requested");
                self.full_reset(now, &mut actions);
            }
        }

        match self.state {
            CoordinatorState::Idle => self.idle(now, &mut actions),
            CoordinatorState::PresenceTracking => self.track_presence(now, &mut actions),
            CoordinatorState::WaitingBlock => self.wait_block(&input.blocks, now, &mut actions),
            CoordinatorState::WaitingLaser => self.wait_laser(&input.blocks, now, &mut actions),
            CoordinatorState::WaitingConfirm => {
                self.wait_confirm(&input.blocks, gate_event, now, &mut actions)
            }
            CoordinatorState::Dispatching => {}
            CoordinatorState::WaitingPuller
            | CoordinatorState::RideAccepted
            | CoordinatorState::PickupConfirmed => self.supervise_ride(now, &mut actions),
            CoordinatorState::RideCompleted | CoordinatorState::RejectedOrError => {
                if now.saturating_duration_since(self.entered_at) >= DISPLAY_DWELL {
                    self.full_reset(now, &mut actions);
                }
            }
        }

        actions
    }

    fn idle(&mut self, now: Instant, actions: &mut Actions) {
        if self.reading.in_range && self.reading.stable {
            self.dwell.restart(now);
            self.transition(CoordinatorState::PresenceTracking, now, actions);
        }
    }

    fn track_presence(&mut self, now: Instant, actions: &mut Actions) {
        if !self.reading.in_range {
            debug!("presence lost");
            self.full_reset(now, actions);
            return;
        }
        if !self.reading.stable {
            self.dwell.restart(now);
            return;
        }

        let target = self.presence.dwell_target();
        if self.dwell.advance(now, target) >= target {
            info!("dwell of {} ms satisfied", target.as_millis());
            self.selector.reset();
            self.transition(CoordinatorState::WaitingBlock, now, actions);
        }
    }

    fn wait_block(
        &mut self,
        blocks: &[bool; DESTINATION_COUNT],
        now: Instant,
        actions: &mut Actions,
    ) {
        if !self.reading.stable {
            debug!("presence unstable while waiting for a block");
            self.full_reset(now, actions);
            return;
        }

        if let Some(index) = self.selector.update(blocks, now).promoted {
            info!("destination {} latched", index);
            self.latched = Some(index);
            self.absent_since = None;
            self.verifier.request_calibration();
            self.transition(CoordinatorState::WaitingLaser, now, actions);
        }
    }

    fn wait_laser(
        &mut self,
        blocks: &[bool; DESTINATION_COUNT],
        now: Instant,
        actions: &mut Actions,
    ) {
        let selection = self.selector.update(blocks, now);
        if selection.active.is_some() && selection.active != self.latched {
            info!("destination changed while waiting for the light");
            self.full_reset(now, actions);
            return;
        }
        if self.presence_gone(now) {
            self.full_reset(now, actions);
            return;
        }

        if self.privilege.verified {
            info!("privilege verified");
            self.gate.reset();
            self.transition(CoordinatorState::WaitingConfirm, now, actions);
        }
    }

    fn wait_confirm(
        &mut self,
        blocks: &[bool; DESTINATION_COUNT],
        event: Option<GateEvent>,
        now: Instant,
        actions: &mut Actions,
    ) {
        if self.presence_gone(now) {
            self.full_reset(now, actions);
            return;
        }

        let selection = self.selector.update(blocks, now);
        if selection.active.is_some() && selection.active != self.latched {
            info!("destination changed, back to block selection");
            self.latched = None;
            self.verifier.reset();
            self.privilege = self.verifier.signal();
            self.gate.reset();
            self.transition(CoordinatorState::WaitingBlock, now, actions);
            return;
        }

        match event {
            Some(GateEvent::AbnormalHold) => self.fail(FailureReason::AbnormalHold, now, actions),
            Some(GateEvent::Confirmed) => self.dispatch(now, actions),
            None => {}
        }
    }

    fn dispatch(&mut self, now: Instant, actions: &mut Actions) {
        if self.outstanding.is_some() {
            warn!("confirm ignored, link call still outstanding");
            return;
        }
        if let Some(last) = self.last_dispatch {
            if now.saturating_duration_since(last) < DISPATCH_LOCKOUT {
                warn!("confirm ignored inside dispatch lockout");
                return;
            }
        }

        let Some(request) = self.latched.and_then(|index| self.config.ride_to(index)) else {
            error!("no destination configured for {}", self.latched);
            self.fail(FailureReason::Link(RideError::Malformed), now, actions);
            return;
        };

        info!("dispatching ride to {}", request.destination);
        self.outstanding = Some(Pending::Create);
        self.last_dispatch = Some(now);
        emit(actions, Action::Call(LinkCall::Create(request)));
        self.transition(CoordinatorState::Dispatching, now, actions);
    }

    fn supervise_ride(&mut self, now: Instant, actions: &mut Actions) {
        let Some(ride) = self.ride.as_ref() else {
            error!("live ride state without a ride");
            self.full_reset(now, actions);
            return;
        };

        if self.state == CoordinatorState::WaitingPuller
            && now.saturating_duration_since(ride.issued_at) >= PULLER_TIMEOUT
        {
            warn!("no puller took ride {} in time", ride.id);
            self.fail(FailureReason::Timeout, now, actions);
            return;
        }

        let poll_due = self
            .last_poll
            .map_or(true, |last| now.saturating_duration_since(last) >= POLL_INTERVAL);
        if poll_due && self.outstanding.is_none() {
            trace!("polling ride {}", ride.id);
            let call = LinkCall::Status(ride.id.clone());
            self.outstanding = Some(Pending::Status);
            self.last_poll = Some(now);
            emit(actions, Action::Call(call));
        }
    }

    fn on_reply(&mut self, reply: LinkReply, now: Instant, actions: &mut Actions) {
        let kind = match reply {
            LinkReply::Created(_) => Pending::Create,
            LinkReply::Status(_) => Pending::Status,
        };
        if self.outstanding != Some(kind) {
            warn!("unexpected {} reply dropped", kind);
            return;
        }
        self.outstanding = None;

        match reply {
            LinkReply::Created(result) => self.on_created(result, now, actions),
            LinkReply::Status(result) => self.on_status(result, now, actions),
        }
    }

    fn on_created(
        &mut self,
        result: Result<RideTicket, RideError>,
        now: Instant,
        actions: &mut Actions,
    ) {
        if self.state != CoordinatorState::Dispatching {
            debug!("create reply arrived in {}, dropped", self.state);
            return;
        }

        if self.reset_deferred {
            self.reset_deferred = false;
            if let Ok(ticket) = &result {
                warn!("ride {} created after reset, dropped", ticket.id);
            }
            self.full_reset(now, actions);
            return;
        }

        match (result, self.latched) {
            (Ok(ticket), Some(destination)) => {
                info!("ride {} issued", ticket.id);
                self.ride = Some(RideRequest::from_ticket(ticket, destination, now));
                self.last_poll = Some(now);
                self.transition(CoordinatorState::WaitingPuller, now, actions);
            }
            (Ok(_), None) => {
                error!("ride issued without a latched destination");
                self.full_reset(now, actions);
            }
            (Err(e), _) => {
                warn!("create ride failed: {}", e);
                self.fail(FailureReason::Link(e), now, actions);
            }
        }
    }

    fn on_status(
        &mut self,
        result: Result<RideStatus, RideError>,
        now: Instant,
        actions: &mut Actions,
    ) {
        if !self.state.is_polling() || self.ride.is_none() {
            debug!("status reply arrived in {}, dropped", self.state);
            return;
        }

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                warn!("status poll failed: {}", e);
                self.fail(FailureReason::Link(e), now, actions);
                return;
            }
        };
        if let Some(ride) = self.ride.as_mut() {
            if ride.status != status {
                debug!("ride {} is {}", ride.id, status);
            }
            ride.status = status;
        }

        match status {
            RideStatus::Pending => {}
            RideStatus::Accepted => self.transition(CoordinatorState::RideAccepted, now, actions),
            RideStatus::PickupConfirmed | RideStatus::InProgress => {
                self.transition(CoordinatorState::PickupConfirmed, now, actions)
            }
            RideStatus::Completed => self.transition(CoordinatorState::RideCompleted, now, actions),
            RideStatus::Rejected => self.fail(FailureReason::Rejected, now, actions),
            RideStatus::Cancelled => self.fail(FailureReason::Cancelled, now, actions),
            RideStatus::NotFound => self.fail(FailureReason::NotFound, now, actions),
        }
    }

    /// Tracks absence while waiting on the rider; true once the grace ran out
    fn presence_gone(&mut self, now: Instant) -> bool {
        if self.reading.in_range {
            self.absent_since = None;
            return false;
        }
        let since = *self.absent_since.get_or_insert(now);
        let gone = now.saturating_duration_since(since) > PRESENCE_GRACE;
        if gone {
            debug!("rider left the marker");
        }
        gone
    }

    fn fail(&mut self, reason: FailureReason, now: Instant, actions: &mut Actions) {
        warn!("cycle failed: {}", reason);
        self.failure = Some(reason);
        self.transition(CoordinatorState::RejectedOrError, now, actions);
    }

    fn full_reset(&mut self, now: Instant, actions: &mut Actions) {
        self.presence.reset();
        self.reading = PresenceReading::ABSENT;
        self.dwell.clear();
        self.selector.reset();
        self.verifier.reset();
        self.privilege = self.verifier.signal();
        self.gate.reset();
        self.latched = None;
        self.absent_since = None;
        self.ride = None;
        self.failure = None;
        self.last_poll = None;
        self.reset_deferred = false;
        self.transition(CoordinatorState::Idle, now, actions);
    }

    fn transition(&mut self, next: CoordinatorState, now: Instant, actions: &mut Actions) {
        if next == self.state {
            return;
        }
        info!("{} -> {}", self.state, next);
        self.state = next;
        self.entered_at = now;

        if let Some(tone) = self.entry_tone() {
            emit(actions, Action::Tone(tone));
        }
    }

    fn entry_tone(&self) -> Option<Tone> {
        match (self.state, &self.failure) {
            (CoordinatorState::WaitingConfirm, _) => Some(Tone::Acknowledge),
            (CoordinatorState::RejectedOrError, Some(FailureReason::AbnormalHold)) => {
                Some(Tone::Error)
            }
            (state, _) => indicate(state).tone,
        }
    }
}

fn emit(actions: &mut Actions, action: Action) {
    if actions.push(action).is_err() {
        error!("action queue full, action dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::ride::RideId;

    const CONFIG: StandConfig = StandConfig {
        stand_id: "STAND-01",
        pickup_id: "GATE",
        destinations: ["LIB", "MKT", "STN"],
    };
    const CYCLE_MS: u64 = 50;
    const AMBIENT: u16 = 300;
    const BEAM: u16 = AMBIENT + 150;

    struct Rig {
        coordinator: Coordinator,
        t: u64,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                coordinator: Coordinator::new(CONFIG, Instant::from_millis(0)),
                t: 0,
            }
        }

        fn input(&self) -> CycleInput {
            CycleInput {
                distance_cm: Some(6.0),
                light: AMBIENT,
                ..CycleInput::at(Instant::from_millis(self.t))
            }
        }

        fn step(&mut self, input: CycleInput) -> Actions {
            let actions = self.coordinator.step(input);
            self.t += CYCLE_MS;
            actions
        }

        /// Runs plain cycles built by `make` until `done` or the deadline
        fn run_until(
            &mut self,
            deadline_ms: u64,
            make: impl Fn(CycleInput) -> CycleInput,
            done: impl Fn(&Coordinator) -> bool,
        ) -> Actions {
            let mut collected = Actions::new();
            while self.t <= deadline_ms && !done(&self.coordinator) {
                let input = make(self.input());
                for action in self.step(input) {
                    let _ = collected.push(action);
                }
            }
            collected
        }

        fn state(&self) -> CoordinatorState {
            self.coordinator.state()
        }

        /// Walks a fresh stand up to `WaitingConfirm` on destination 0
        fn to_waiting_confirm(&mut self) {
            self.run_until(10_000, |i| i, |c| c.state() == CoordinatorState::WaitingBlock);
            self.run_until(
                20_000,
                |i| CycleInput { blocks: [true, false, false], ..i },
                |c| c.state() == CoordinatorState::WaitingLaser,
            );
            // calibration on ambient, then the beam
            for _ in 0..16 {
                let input = CycleInput { blocks: [true, false, false], ..self.input() };
                self.step(input);
            }
            self.run_until(
                self.t + 6_000,
                |i| CycleInput { blocks: [true, false, false], light: BEAM, ..i },
                |c| c.state() == CoordinatorState::WaitingConfirm,
            );
            assert_eq!(self.state(), CoordinatorState::WaitingConfirm);
        }

        fn press_and_release(&mut self) -> Actions {
            let mut collected = Actions::new();
            for pressed in [true, true, true, false, false, false] {
                let input = CycleInput {
                    blocks: [true, false, false],
                    confirm_pressed: pressed,
                    ..self.input()
                };
                for action in self.step(input) {
                    let _ = collected.push(action);
                }
            }
            collected
        }

        fn reply(&mut self, reply: LinkReply) -> Actions {
            let input = CycleInput {
                reply: Some(reply),
                ..self.input()
            };
            self.step(input)
        }
    }

    fn ticket(id: &str) -> RideTicket {
        RideTicket {
            id: RideId::try_from(id).unwrap(),
            pickup_name: "Gate".try_into().unwrap(),
            destination_name: "Library".try_into().unwrap(),
        }
    }

    fn calls(actions: &Actions) -> usize {
        actions.iter().filter(|a| matches!(a, Action::Call(_))).count()
    }

    #[test]
    fn unstable_presence_resets_dwell_without_leaving_tracking() {
        let mut rig = Rig::new();
        rig.run_until(2_000, |i| i, |c| c.snapshot().dwell.as_millis() >= 1_000);
        assert_eq!(rig.state(), CoordinatorState::PresenceTracking);

        let jump = CycleInput { distance_cm: Some(9.5), ..rig.input() };
        rig.step(jump);
        assert_eq!(rig.state(), CoordinatorState::PresenceTracking);
        assert_eq!(rig.coordinator.snapshot().dwell, Duration::from_ticks(0));
    }

    #[test]
    fn leaving_the_marker_returns_to_idle() {
        let mut rig = Rig::new();
        rig.run_until(1_000, |i| i, |c| c.state() == CoordinatorState::PresenceTracking);
        let gone = CycleInput { distance_cm: None, ..rig.input() };
        rig.step(gone);
        assert_eq!(rig.state(), CoordinatorState::Idle);
    }

    #[test]
    fn verification_plays_acknowledge() {
        let mut rig = Rig::new();
        rig.run_until(10_000, |i| i, |c| c.state() == CoordinatorState::WaitingBlock);
        rig.run_until(
            20_000,
            |i| CycleInput { blocks: [true, false, false], ..i },
            |c| c.state() == CoordinatorState::WaitingLaser,
        );
        for _ in 0..16 {
            let input = CycleInput { blocks: [true, false, false], ..rig.input() };
            rig.step(input);
        }
        let actions = rig.run_until(
            rig.t + 6_000,
            |i| CycleInput { blocks: [true, false, false], light: BEAM, ..i },
            |c| c.state() == CoordinatorState::WaitingConfirm,
        );
        assert!(actions.contains(&Action::Tone(Tone::Acknowledge)));
    }

    #[test]
    fn other_block_while_waiting_for_light_resets() {
        let mut rig = Rig::new();
        rig.run_until(10_000, |i| i, |c| c.state() == CoordinatorState::WaitingBlock);
        rig.run_until(
            20_000,
            |i| CycleInput { blocks: [false, true, false], ..i },
            |c| c.state() == CoordinatorState::WaitingLaser,
        );

        // lifting the block is tolerated
        rig.step(rig.input());
        assert_eq!(rig.state(), CoordinatorState::WaitingLaser);

        let other = CycleInput { blocks: [false, false, true], ..rig.input() };
        rig.step(other);
        assert_eq!(rig.state(), CoordinatorState::Idle);
    }

    #[test]
    fn other_block_while_waiting_for_confirm_goes_back_to_block() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();

        let other = CycleInput { blocks: [false, true, false], ..rig.input() };
        rig.step(other);
        assert_eq!(rig.state(), CoordinatorState::WaitingBlock);
        assert_eq!(rig.coordinator.snapshot().destination, None);
        assert!(!rig.coordinator.snapshot().privilege.verified);
    }

    #[test]
    fn short_absence_is_tolerated_while_waiting_for_confirm() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();

        for _ in 0..20 {
            let away = CycleInput {
                distance_cm: None,
                blocks: [true, false, false],
                ..rig.input()
            };
            rig.step(away);
        }
        assert_eq!(rig.state(), CoordinatorState::WaitingConfirm);

        for _ in 0..20 {
            let away = CycleInput {
                distance_cm: None,
                blocks: [true, false, false],
                ..rig.input()
            };
            rig.step(away);
        }
        assert_eq!(rig.state(), CoordinatorState::Idle);
    }

    #[test]
    fn short_absence_is_tolerated_while_waiting_for_light() {
        let mut rig = Rig::new();
        rig.run_until(10_000, |i| i, |c| c.state() == CoordinatorState::WaitingBlock);
        rig.run_until(
            20_000,
            |i| CycleInput { blocks: [true, false, false], ..i },
            |c| c.state() == CoordinatorState::WaitingLaser,
        );

        for _ in 0..20 {
            let away = CycleInput {
                distance_cm: None,
                blocks: [true, false, false],
                ..rig.input()
            };
            rig.step(away);
        }
        assert_eq!(rig.state(), CoordinatorState::WaitingLaser);
        assert_eq!(rig.coordinator.snapshot().destination, Some(0));

        for _ in 0..20 {
            let away = CycleInput {
                distance_cm: None,
                blocks: [true, false, false],
                ..rig.input()
            };
            rig.step(away);
        }
        assert_eq!(rig.state(), CoordinatorState::Idle);
        assert_eq!(rig.coordinator.snapshot().destination, None);
    }

    #[test]
    fn confirm_dispatches_once() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();

        let actions = rig.press_and_release();
        assert_eq!(rig.state(), CoordinatorState::Dispatching);
        assert_eq!(
            actions.as_slice(),
            &[Action::Call(LinkCall::Create(CONFIG.ride_to(0).unwrap()))]
        );
        assert!(rig.coordinator.is_waiting_on_link());

        // more presses while the call is in flight do nothing
        let again = rig.press_and_release();
        assert_eq!(calls(&again), 0);
    }

    #[test]
    fn failed_create_enters_error_and_clears_after_dwell() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.press_and_release();

        let actions = rig.reply(LinkReply::Created(Err(RideError::Timeout)));
        assert_eq!(rig.state(), CoordinatorState::RejectedOrError);
        assert_eq!(actions.as_slice(), &[Action::Tone(Tone::Failure)]);
        assert_eq!(
            rig.coordinator.failure(),
            Some(&FailureReason::Link(RideError::Timeout))
        );

        let entered = rig.t - CYCLE_MS;
        rig.run_until(entered + 10_000, |i| i, |c| c.state() != CoordinatorState::RejectedOrError);
        assert_eq!(rig.t - CYCLE_MS - entered, DISPLAY_DWELL.as_millis());
    }

    #[test]
    fn stuck_confirm_button_is_an_error() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();

        let actions = rig.run_until(
            rig.t + 5_000,
            |i| CycleInput { blocks: [true, false, false], confirm_pressed: true, ..i },
            |c| c.state() == CoordinatorState::RejectedOrError,
        );
        assert_eq!(rig.coordinator.failure(), Some(&FailureReason::AbnormalHold));
        assert!(actions.contains(&Action::Tone(Tone::Error)));
        assert_eq!(calls(&actions), 0);
    }

    #[test]
    fn puller_timeout_closes_the_ride() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.press_and_release();
        rig.reply(LinkReply::Created(Ok(ticket("r1"))));
        assert_eq!(rig.state(), CoordinatorState::WaitingPuller);
        let issued = rig.t - CYCLE_MS;

        let mut dispatches = 0;
        while rig.state() == CoordinatorState::WaitingPuller {
            let mut input = rig.input();
            if rig.coordinator.is_waiting_on_link() {
                input.reply = Some(LinkReply::Status(Ok(RideStatus::Pending)));
            }
            for action in rig.step(input) {
                if let Action::Call(LinkCall::Create(_)) = action {
                    dispatches += 1;
                }
            }
        }

        assert_eq!(rig.state(), CoordinatorState::RejectedOrError);
        assert_eq!(rig.coordinator.failure(), Some(&FailureReason::Timeout));
        assert_eq!(rig.t - CYCLE_MS - issued, PULLER_TIMEOUT.as_millis());
        assert_eq!(dispatches, 0);
    }

    #[test]
    fn polls_on_interval_and_follows_status() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.press_and_release();
        rig.reply(LinkReply::Created(Ok(ticket("r1"))));

        let mut polls = 0;
        for _ in 0..(2_000 / CYCLE_MS) {
            polls += calls(&rig.step(rig.input()));
        }
        assert_eq!(polls, 1);

        let actions = rig.reply(LinkReply::Status(Ok(RideStatus::Accepted)));
        assert_eq!(rig.state(), CoordinatorState::RideAccepted);
        assert_eq!(actions.as_slice(), &[Action::Tone(Tone::Accepted)]);
        assert_eq!(rig.coordinator.ride().unwrap().status, RideStatus::Accepted);
    }

    #[test]
    fn status_replies_map_to_states() {
        let cases = [
            (Ok(RideStatus::Pending), CoordinatorState::WaitingPuller, None),
            (Ok(RideStatus::Accepted), CoordinatorState::RideAccepted, None),
            (Ok(RideStatus::PickupConfirmed), CoordinatorState::PickupConfirmed, None),
            (Ok(RideStatus::InProgress), CoordinatorState::PickupConfirmed, None),
            (Ok(RideStatus::Completed), CoordinatorState::RideCompleted, None),
            (
                Ok(RideStatus::Rejected),
                CoordinatorState::RejectedOrError,
                Some(FailureReason::Rejected),
            ),
            (
                Ok(RideStatus::Cancelled),
                CoordinatorState::RejectedOrError,
                Some(FailureReason::Cancelled),
            ),
            (
                Ok(RideStatus::NotFound),
                CoordinatorState::RejectedOrError,
                Some(FailureReason::NotFound),
            ),
            (
                Err(RideError::Io),
                CoordinatorState::RejectedOrError,
                Some(FailureReason::Link(RideError::Io)),
            ),
        ];

        for (status, state, failure) in cases {
            let mut rig = Rig::new();
            rig.to_waiting_confirm();
            rig.press_and_release();
            rig.reply(LinkReply::Created(Ok(ticket("r1"))));
            rig.run_until(rig.t + 3_000, |i| i, |c| c.is_waiting_on_link());
            assert!(rig.coordinator.is_waiting_on_link());

            rig.reply(LinkReply::Status(status.clone()));
            assert_eq!(rig.state(), state, "after {:?}", status);
            assert_eq!(rig.coordinator.failure(), failure.as_ref(), "after {:?}", status);
        }
    }

    #[test]
    fn accepted_ride_follows_pickup() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.press_and_release();
        rig.reply(LinkReply::Created(Ok(ticket("r1"))));
        rig.run_until(rig.t + 3_000, |i| i, |c| c.is_waiting_on_link());
        rig.reply(LinkReply::Status(Ok(RideStatus::Accepted)));
        assert_eq!(rig.state(), CoordinatorState::RideAccepted);

        // accepted rides keep polling past the puller timeout
        let polls = rig.run_until(rig.t + 3_000, |i| i, |c| c.is_waiting_on_link());
        assert_eq!(calls(&polls), 1);
        rig.reply(LinkReply::Status(Ok(RideStatus::PickupConfirmed)));
        assert_eq!(rig.state(), CoordinatorState::PickupConfirmed);
        assert_eq!(rig.coordinator.failure(), None);
        assert_eq!(rig.coordinator.ride().unwrap().status, RideStatus::PickupConfirmed);
    }

    #[test]
    fn stale_status_reply_after_reset_is_dropped() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.press_and_release();
        rig.reply(LinkReply::Created(Ok(ticket("r1"))));
        rig.run_until(rig.t + 3_000, |i| i, |c| c.is_waiting_on_link());

        let reset = CycleInput { reset: true, ..rig.input() };
        rig.step(reset);
        assert_eq!(rig.state(), CoordinatorState::Idle);

        rig.reply(LinkReply::Status(Ok(RideStatus::Completed)));
        assert_eq!(rig.state(), CoordinatorState::Idle);
        assert!(!rig.coordinator.is_waiting_on_link());
        assert!(rig.coordinator.ride().is_none());
    }

    #[test]
    fn reset_while_dispatching_waits_for_reply() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.press_and_release();

        let reset = CycleInput { reset: true, ..rig.input() };
        rig.step(reset);
        assert_eq!(rig.state(), CoordinatorState::Dispatching);

        rig.reply(LinkReply::Created(Ok(ticket("r1"))));
        assert_eq!(rig.state(), CoordinatorState::Idle);
        assert!(rig.coordinator.ride().is_none());
        assert!(!rig.coordinator.is_waiting_on_link());
    }

    #[test]
    fn deferred_reset_with_failed_create_returns_to_idle() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.press_and_release();

        let reset = CycleInput { reset: true, ..rig.input() };
        rig.step(reset);
        assert_eq!(rig.state(), CoordinatorState::Dispatching);

        let actions = rig.reply(LinkReply::Created(Err(RideError::Timeout)));
        assert_eq!(rig.state(), CoordinatorState::Idle);
        assert_eq!(rig.coordinator.failure(), None);
        assert!(!actions.contains(&Action::Tone(Tone::Failure)));
        assert!(!rig.coordinator.is_waiting_on_link());
    }

    #[test]
    fn confirm_inside_dispatch_lockout_is_ignored() {
        let mut rig = Rig::new();
        rig.to_waiting_confirm();
        rig.coordinator.last_dispatch = Some(Instant::from_millis(rig.t));

        let actions = rig.press_and_release();
        assert_eq!(rig.state(), CoordinatorState::WaitingConfirm);
        assert_eq!(calls(&actions), 0);
        assert!(!rig.coordinator.is_waiting_on_link());

        // once the lockout has run out the same press dispatches
        rig.run_until(
            rig.t + 2_000,
            |i| CycleInput { blocks: [true, false, false], ..i },
            |_| false,
        );
        let actions = rig.press_and_release();
        assert_eq!(rig.state(), CoordinatorState::Dispatching);
        assert_eq!(calls(&actions), 1);
    }

    #[test]
    fn unexpected_reply_is_ignored() {
        let mut rig = Rig::new();
        rig.reply(LinkReply::Created(Ok(ticket("r9"))));
        assert_eq!(rig.state(), CoordinatorState::Idle);
        assert!(rig.coordinator.ride().is_none());
    }
}
