// Sandbox loop: owns the bikes and the recorder and drives both at a fixed tick.

use super::countdown::{Countdown, CountdownTick};
use super::events::{RaceEvent, RaceEventBus};
use super::input::{InputCapture, InputTrigger};
use super::recorder::Recorder;
use super::types::{SandboxEvent, SandboxPhase, SandboxUpdate, SessionControl, SessionSnapshot};
use crate::domain::tuning::bike::BikeTuning;
use crate::domain::{ActuatorId, BikeController, ControlError, Garage, RaceError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

// Bikes are numbered from here; live input starts bound to the first one.
const FIRST_BIKE_ID: ActuatorId = 1;

/// Settings for a sandbox instance.
#[derive(Debug, Clone)]
pub struct SandboxSettings {
    /// Bikes parked in the garage, numbered from 1 (at least one is always parked).
    pub bike_count: u64,
    pub tuning: BikeTuning,
    /// Countdown before inputs go live (zero starts immediately).
    pub countdown: Duration,
    /// Fixed tick interval; also the recorder's clock step.
    pub tick_interval: Duration,
}

/// Single-owner state behind the sandbox task. Everything here runs on one task,
/// one event or one tick at a time.
pub struct Sandbox {
    garage: Garage,
    recorder: Recorder,
    capture: InputCapture,
    countdown: Countdown,
    countdown_duration: Duration,
    // Last countdown value published on the bus.
    announced: Option<u32>,
    bus: RaceEventBus,
    phase: SandboxPhase,
    step: Duration,
    tick: u64,
}

impl Sandbox {
    pub fn new(settings: SandboxSettings) -> Self {
        let mut garage = Garage::new();
        for id in FIRST_BIKE_ID..FIRST_BIKE_ID + settings.bike_count.max(1) {
            garage.insert(BikeController::new(id, settings.tuning));
        }

        let mut sandbox = Self {
            garage,
            recorder: Recorder::new(),
            capture: InputCapture::new(FIRST_BIKE_ID),
            countdown: Countdown::new(),
            countdown_duration: settings.countdown,
            announced: None,
            bus: RaceEventBus::new(),
            phase: SandboxPhase::Running,
            step: settings.tick_interval,
            tick: 0,
        };
        // Nobody listens yet; the first value is announced on the first tick.
        if !settings.countdown.is_zero() {
            sandbox.countdown.start(settings.countdown);
            sandbox.phase = SandboxPhase::Countdown {
                seconds_left: sandbox.countdown.seconds_left(),
            };
        }
        sandbox
    }

    pub fn phase(&self) -> SandboxPhase {
        self.phase
    }

    pub fn garage(&self) -> &Garage {
        &self.garage
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.recorder.state(),
            timeline_len: self.recorder.timeline_len(),
            phase: self.phase,
            bike_id: self.capture.target(),
        }
    }

    pub fn handle_event(&mut self, event: SandboxEvent) {
        match event {
            SandboxEvent::Trigger(trigger) => self.handle_trigger(trigger),
            SandboxEvent::Key(key) => match self.capture.trigger_for_key(key) {
                Some(trigger) => self.handle_trigger(trigger),
                None => debug!(%key, "unbound key ignored"),
            },
            SandboxEvent::Control { control, reply } => {
                let result = self.control(control);
                if reply.send(result).is_err() {
                    debug!(?control, "control requester went away before the reply");
                }
            }
            SandboxEvent::Status { reply } => {
                let _ = reply.send(self.session_snapshot());
            }
            SandboxEvent::Subscribe { kinds, reply } => {
                let (listener_id, rx) = self.bus.subscribe(&kinds);
                if reply.send((listener_id, rx)).is_err() {
                    // Nobody is left to deregister this listener.
                    self.bus.unsubscribe_all(listener_id);
                }
            }
            SandboxEvent::Unsubscribe { listener_id } => {
                self.bus.unsubscribe_all(listener_id);
            }
            SandboxEvent::UnsubscribeKind { listener_id, kind } => {
                if !self.bus.unsubscribe(kind, listener_id) {
                    debug!(listener_id, ?kind, "listener was not subscribed to kind");
                }
            }
        }
    }

    fn handle_trigger(&mut self, trigger: InputTrigger) {
        match self.phase {
            SandboxPhase::Running => {
                let command = self.capture.command_for(trigger);
                self.recorder.execute_command(command, &mut self.garage);
            }
            SandboxPhase::Countdown { seconds_left } => {
                debug!(?trigger, seconds_left, "input ignored during countdown");
            }
            SandboxPhase::Stopped => {
                debug!(?trigger, "input ignored while the race is stopped");
            }
        }
    }

    /// Applies a control-panel request. Bikes go back to the start line whenever
    /// a recording starts or stops and whenever a replay starts, so a replay
    /// begins from the same state the recording did.
    pub fn control(&mut self, control: SessionControl) -> Result<SessionSnapshot, ControlError> {
        match control {
            SessionControl::StartRecording => {
                if self.recorder.is_replaying() {
                    // The new recording discards the replay; close it out for listeners.
                    self.bus.publish(RaceEvent::ReplayStopped {
                        remaining: self.recorder.timeline_len(),
                    });
                }
                self.garage.reset_all();
                self.recorder.start_recording();
                self.bus.publish(RaceEvent::RecordingStarted);
            }
            SessionControl::StopRecording => {
                if self.recorder.is_recording() {
                    self.recorder.stop_recording();
                    self.garage.reset_all();
                    self.bus.publish(RaceEvent::RecordingStopped {
                        commands: self.recorder.timeline_len(),
                    });
                }
            }
            SessionControl::StartReplay => {
                self.recorder.start_replay()?;
                self.garage.reset_all();
                self.bus.publish(RaceEvent::ReplayStarted {
                    commands: self.recorder.timeline_len(),
                });
            }
            SessionControl::StopReplay => {
                if self.recorder.is_replaying() {
                    self.recorder.stop_replay();
                    self.bus.publish(RaceEvent::ReplayStopped {
                        remaining: self.recorder.timeline_len(),
                    });
                }
            }
            SessionControl::StartCountdown => match self.phase {
                SandboxPhase::Stopped => self.begin_countdown(),
                SandboxPhase::Countdown { .. } => return Err(RaceError::CountdownActive.into()),
                SandboxPhase::Running => return Err(RaceError::RaceActive.into()),
            },
            SessionControl::StopRace => match self.phase {
                SandboxPhase::Countdown { .. } | SandboxPhase::Running => {
                    self.countdown.cancel();
                    self.announced = None;
                    self.phase = SandboxPhase::Stopped;
                    self.bus.publish(RaceEvent::Stop);
                    info!(tick = self.tick, "race stopped");
                }
                SandboxPhase::Stopped => return Err(RaceError::NotRunning.into()),
            },
            SessionControl::BindBike(id) => {
                if self.garage.get(id).is_none() {
                    warn!(bike_id = id, "bind refused for unknown bike");
                    return Err(ControlError::UnknownBike(id));
                }
                self.capture.rebind(id);
                info!(bike_id = id, "input bound to bike");
            }
        }
        Ok(self.session_snapshot())
    }

    fn begin_countdown(&mut self) {
        if self.countdown_duration.is_zero() {
            self.start_race();
            return;
        }
        self.countdown.start(self.countdown_duration);
        let seconds_left = self.countdown.seconds_left();
        self.phase = SandboxPhase::Countdown { seconds_left };
        self.announce(seconds_left);
        info!(seconds_left, "countdown started");
    }

    fn announce(&mut self, seconds: u32) {
        if self.announced != Some(seconds) {
            self.announced = Some(seconds);
            self.bus.publish(RaceEvent::Countdown { seconds });
        }
    }

    fn start_race(&mut self) {
        self.announced = None;
        self.phase = SandboxPhase::Running;
        self.bus.publish(RaceEvent::Start);
        info!(tick = self.tick, "race started");
    }

    /// Advances the countdown and the recorder by one fixed step.
    pub fn step(&mut self) -> SandboxUpdate {
        if self.countdown.is_running() {
            if let SandboxPhase::Countdown { seconds_left } = self.phase {
                self.announce(seconds_left);
            }
            match self.countdown.tick(self.step) {
                CountdownTick::Running { seconds_left } => {
                    self.phase = SandboxPhase::Countdown { seconds_left };
                    self.announce(seconds_left);
                }
                CountdownTick::Finished | CountdownTick::Idle => self.start_race(),
            }
        }

        let report = self.recorder.tick(self.step, &mut self.garage);
        if report.replay_finished {
            self.bus.publish(RaceEvent::ReplayFinished);
        }

        self.tick += 1;
        SandboxUpdate {
            tick: self.tick,
            session: self.session_snapshot(),
            bikes: self.garage.snapshots(),
        }
    }
}

pub async fn sandbox_task(
    mut event_rx: mpsc::Receiver<SandboxEvent>,
    update_tx: broadcast::Sender<SandboxUpdate>,
    settings: SandboxSettings,
) {
    let tick_interval = settings.tick_interval;
    let mut sandbox = Sandbox::new(settings);

    // Drive the fixed-step loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);

    loop {
        interval.tick().await;

        // Drain everything that arrived since the last tick before stepping.
        loop {
            match event_rx.try_recv() {
                Ok(event) => sandbox.handle_event(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    warn!("sandbox event channel closed; sandbox exiting");
                    return;
                }
            }
        }

        let _ = update_tx.send(sandbox.step());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BikeSnapshot, SessionError};
    use crate::use_cases::events::EventKind;
    use crate::use_cases::recorder::SessionState;
    use tokio::sync::oneshot;

    const STEP: Duration = Duration::from_millis(250);

    fn settings(countdown: Duration) -> SandboxSettings {
        SandboxSettings {
            bike_count: 2,
            tuning: BikeTuning::default(),
            countdown,
            tick_interval: STEP,
        }
    }

    fn bike(sandbox: &Sandbox) -> BikeSnapshot {
        sandbox.garage().snapshots()[0].clone()
    }

    fn step_n(sandbox: &mut Sandbox, n: usize) {
        for _ in 0..n {
            sandbox.step();
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<RaceEvent>) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn countdown_holds_inputs_until_start() {
        let mut sandbox = Sandbox::new(settings(Duration::from_secs(1)));
        let (_, mut rx) = sandbox.bus.subscribe(&[EventKind::Start]);
        assert_eq!(sandbox.phase(), SandboxPhase::Countdown { seconds_left: 1 });

        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnRight));
        assert_eq!(bike(&sandbox).lane_offset, 0.0);

        step_n(&mut sandbox, 3);
        assert!(rx.try_recv().is_err());
        sandbox.step();
        assert_eq!(sandbox.phase(), SandboxPhase::Running);
        assert_eq!(rx.try_recv().ok(), Some(RaceEvent::Start));

        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnRight));
        assert_eq!(bike(&sandbox).lane_offset, 1.0);
    }

    #[test]
    fn countdown_announces_each_whole_second() {
        let mut sandbox = Sandbox::new(settings(Duration::from_secs(2)));
        let (_, mut rx) = sandbox.bus.subscribe(&[EventKind::Countdown, EventKind::Start]);

        step_n(&mut sandbox, 8);

        assert_eq!(
            drain(&mut rx),
            vec![
                RaceEvent::Countdown { seconds: 2 },
                RaceEvent::Countdown { seconds: 1 },
                RaceEvent::Start,
            ]
        );
    }

    #[test]
    fn race_can_be_stopped_and_restarted() {
        let mut sandbox = Sandbox::new(settings(Duration::from_secs(1)));
        let (_, mut rx) = sandbox.bus.subscribe(&EventKind::ALL);

        assert_eq!(
            sandbox.control(SessionControl::StartCountdown),
            Err(ControlError::Race(RaceError::CountdownActive))
        );
        step_n(&mut sandbox, 4);
        assert_eq!(sandbox.phase(), SandboxPhase::Running);
        assert_eq!(
            sandbox.control(SessionControl::StartCountdown),
            Err(ControlError::Race(RaceError::RaceActive))
        );

        let snapshot = sandbox.control(SessionControl::StopRace).expect("stop race");
        assert_eq!(snapshot.phase, SandboxPhase::Stopped);
        assert_eq!(
            sandbox.control(SessionControl::StopRace),
            Err(ControlError::Race(RaceError::NotRunning))
        );

        // Inputs are held while stopped.
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnRight));
        step_n(&mut sandbox, 2);
        assert_eq!(bike(&sandbox).lane_offset, 0.0);
        assert_eq!(sandbox.phase(), SandboxPhase::Stopped);

        let snapshot = sandbox
            .control(SessionControl::StartCountdown)
            .expect("restart countdown");
        assert_eq!(snapshot.phase, SandboxPhase::Countdown { seconds_left: 1 });
        step_n(&mut sandbox, 4);
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnRight));
        assert_eq!(bike(&sandbox).lane_offset, 1.0);

        assert_eq!(
            drain(&mut rx),
            vec![
                RaceEvent::Countdown { seconds: 1 },
                RaceEvent::Start,
                RaceEvent::Stop,
                RaceEvent::Countdown { seconds: 1 },
                RaceEvent::Start,
            ]
        );
    }

    #[test]
    fn stopping_during_the_countdown_cancels_it() {
        let mut sandbox = Sandbox::new(settings(Duration::from_secs(1)));
        let (_, mut rx) = sandbox.bus.subscribe(&[EventKind::Start, EventKind::Stop]);

        sandbox.step();
        sandbox.control(SessionControl::StopRace).expect("stop race");
        step_n(&mut sandbox, 8);

        assert_eq!(sandbox.phase(), SandboxPhase::Stopped);
        assert_eq!(drain(&mut rx), vec![RaceEvent::Stop]);
    }

    #[test]
    fn restart_without_countdown_starts_at_once() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));
        let (_, mut rx) = sandbox.bus.subscribe(&EventKind::ALL);

        sandbox.control(SessionControl::StopRace).expect("stop race");
        let snapshot = sandbox
            .control(SessionControl::StartCountdown)
            .expect("restart");

        assert_eq!(snapshot.phase, SandboxPhase::Running);
        assert_eq!(drain(&mut rx), vec![RaceEvent::Stop, RaceEvent::Start]);
    }

    #[test]
    fn replay_reproduces_the_recorded_run() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));
        let (_, mut rx) = sandbox.bus.subscribe(&EventKind::ALL);

        // Drift before recording; the recording starts from a reset bike.
        sandbox.handle_event(SandboxEvent::Key('a'));
        sandbox.control(SessionControl::StartRecording).expect("start recording");
        assert_eq!(bike(&sandbox).lane_offset, 0.0);

        sandbox.handle_event(SandboxEvent::Key('D'));
        step_n(&mut sandbox, 2);
        sandbox.handle_event(SandboxEvent::Key('W'));
        sandbox.handle_event(SandboxEvent::Key('D'));
        step_n(&mut sandbox, 5);
        sandbox.handle_event(SandboxEvent::Key('A'));
        step_n(&mut sandbox, 1);
        let recorded_end = bike(&sandbox);

        let snapshot = sandbox
            .control(SessionControl::StopRecording)
            .expect("stop recording");
        assert_eq!(snapshot.timeline_len, 4);
        assert_eq!(bike(&sandbox).lane_offset, 0.0);

        sandbox.control(SessionControl::StartReplay).expect("start replay");
        let mut ticks = 0;
        while sandbox.session_snapshot().state == SessionState::Replaying {
            sandbox.step();
            ticks += 1;
        }

        assert_eq!(ticks, 8);
        assert_eq!(bike(&sandbox), recorded_end);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::RecordingStarted,
                EventKind::RecordingStopped,
                EventKind::ReplayStarted,
                EventKind::ReplayFinished,
            ]
        );
    }

    #[test]
    fn empty_replay_is_refused_without_touching_the_bike() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnLeft));

        let (reply, mut reply_rx) = oneshot::channel();
        sandbox.handle_event(SandboxEvent::Control {
            control: SessionControl::StartReplay,
            reply,
        });

        assert_eq!(
            reply_rx.try_recv().ok(),
            Some(Err(ControlError::Session(SessionError::EmptyTimeline)))
        );
        assert_eq!(bike(&sandbox).lane_offset, -1.0);
        assert_eq!(sandbox.session_snapshot().state, SessionState::Idle);
    }

    #[test]
    fn stop_controls_are_quiet_when_nothing_runs() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));
        let (_, mut rx) = sandbox.bus.subscribe(&EventKind::ALL);
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnRight));

        sandbox.control(SessionControl::StopRecording).expect("stop recording");
        sandbox.control(SessionControl::StopReplay).expect("stop replay");

        assert!(rx.try_recv().is_err());
        assert_eq!(bike(&sandbox).lane_offset, 1.0);
    }

    #[test]
    fn subscriptions_go_through_the_event_channel() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));

        let (reply, mut reply_rx) = oneshot::channel();
        sandbox.handle_event(SandboxEvent::Subscribe {
            kinds: vec![EventKind::RecordingStarted],
            reply,
        });
        let (listener_id, mut rx) = reply_rx.try_recv().expect("subscription reply");

        sandbox.control(SessionControl::StartRecording).expect("start recording");
        assert_eq!(rx.try_recv().ok(), Some(RaceEvent::RecordingStarted));

        sandbox.handle_event(SandboxEvent::Unsubscribe { listener_id });
        assert_eq!(sandbox.bus.listener_count(EventKind::RecordingStarted), 0);
    }

    #[test]
    fn updates_count_ticks_and_status_reports_the_session() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));

        let first = sandbox.step();
        let second = sandbox.step();

        assert_eq!(first.tick, 1);
        assert_eq!(second.tick, 2);
        assert_eq!(second.bikes.len(), 2);
        assert_eq!(second.session.state, SessionState::Idle);

        let (reply, mut reply_rx) = oneshot::channel();
        sandbox.handle_event(SandboxEvent::Status { reply });
        assert_eq!(
            reply_rx.try_recv().ok(),
            Some(SessionSnapshot {
                state: SessionState::Idle,
                timeline_len: 0,
                phase: SandboxPhase::Running,
                bike_id: 1,
            })
        );
    }

    #[test]
    fn recording_over_a_replay_closes_the_replay_first() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));
        let (_, mut rx) = sandbox.bus.subscribe(&EventKind::ALL);

        sandbox.control(SessionControl::StartRecording).expect("start recording");
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnLeft));
        step_n(&mut sandbox, 3);
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnRight));
        sandbox.control(SessionControl::StopRecording).expect("stop recording");
        sandbox.control(SessionControl::StartReplay).expect("start replay");
        sandbox.step();
        sandbox.control(SessionControl::StartRecording).expect("record over replay");

        assert_eq!(
            drain(&mut rx),
            vec![
                RaceEvent::RecordingStarted,
                RaceEvent::RecordingStopped { commands: 2 },
                RaceEvent::ReplayStarted { commands: 2 },
                RaceEvent::ReplayStopped { remaining: 1 },
                RaceEvent::RecordingStarted,
            ]
        );
        assert_eq!(sandbox.session_snapshot().state, SessionState::Recording);
    }

    #[test]
    fn binding_retargets_input_and_replay_follows_it() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));

        assert_eq!(
            sandbox.control(SessionControl::BindBike(9)),
            Err(ControlError::UnknownBike(9))
        );
        assert_eq!(sandbox.session_snapshot().bike_id, 1);

        sandbox.control(SessionControl::StartRecording).expect("start recording");
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::TurnLeft));
        sandbox.step();
        let snapshot = sandbox.control(SessionControl::BindBike(2)).expect("bind");
        assert_eq!(snapshot.bike_id, 2);
        sandbox.handle_event(SandboxEvent::Trigger(InputTrigger::ToggleBoost));
        sandbox.step();
        let recorded_end = sandbox.garage().snapshots();
        sandbox.control(SessionControl::StopRecording).expect("stop recording");

        sandbox.control(SessionControl::StartReplay).expect("start replay");
        step_n(&mut sandbox, 2);

        assert_eq!(sandbox.garage().snapshots(), recorded_end);
        assert_eq!(recorded_end[0].lane_offset, -1.0);
        assert!(recorded_end[1].boost);
    }

    #[test]
    fn listeners_can_drop_a_single_kind() {
        let mut sandbox = Sandbox::new(settings(Duration::ZERO));
        let (listener_id, mut rx) = sandbox.bus.subscribe(&EventKind::ALL);

        sandbox.handle_event(SandboxEvent::UnsubscribeKind {
            listener_id,
            kind: EventKind::RecordingStarted,
        });
        sandbox.control(SessionControl::StartRecording).expect("start recording");
        sandbox.control(SessionControl::StopRecording).expect("stop recording");

        assert_eq!(drain(&mut rx), vec![RaceEvent::RecordingStopped { commands: 0 }]);
    }
}
