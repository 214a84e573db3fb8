// Command recorder and deterministic replayer driven by the fixed-step tick.

use crate::domain::{ActuatorSet, Command, SessionError, Timeline};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which session, if any, the recorder is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Replaying,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Recorded commands applied during this tick.
    pub replayed: usize,
    /// True when this tick consumed the last entry and the recorder went idle.
    pub replay_finished: bool,
}

/// Executes commands as they arrive and keeps a timeline of them while recording.
///
/// Both clocks move only through [`Recorder::tick`], never from wall-clock time,
/// so a replay driven with the same step reproduces the recorded run exactly.
#[derive(Debug, Default)]
pub struct Recorder {
    state: SessionState,
    timeline: Timeline,
    recording_clock: Duration,
    replay_clock: Duration,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn is_replaying(&self) -> bool {
        self.state == SessionState::Replaying
    }

    pub fn timeline_len(&self) -> usize {
        self.timeline.len()
    }

    pub fn recording_clock(&self) -> Duration {
        self.recording_clock
    }

    pub fn replay_clock(&self) -> Duration {
        self.replay_clock
    }

    /// Applies `command` right away, in any state. While recording the command is
    /// also logged at the current recording offset.
    ///
    /// # Panics
    ///
    /// Panics if the command's actuator is not in `actuators`.
    pub fn execute_command<A>(&mut self, command: Command, actuators: &mut A)
    where
        A: ActuatorSet + ?Sized,
    {
        command.apply(actuators);

        if self.state == SessionState::Recording {
            self.timeline.push(self.recording_clock, command);
            debug!(
                %command,
                offset_ms = self.recording_clock.as_millis(),
                recorded = self.timeline.len(),
                "command recorded"
            );
        } else {
            debug!(%command, state = ?self.state, "command executed");
        }
    }

    /// Starts a fresh recording. Any previous timeline is discarded, and a replay
    /// in progress is abandoned.
    pub fn start_recording(&mut self) {
        if self.state == SessionState::Replaying {
            info!(
                remaining = self.timeline.len(),
                "replay abandoned for a new recording"
            );
        }

        self.timeline.clear();
        self.recording_clock = Duration::ZERO;
        self.state = SessionState::Recording;
        info!("recording started");
    }

    /// Ends the recording and keeps the timeline. Ignored while replaying.
    pub fn stop_recording(&mut self) {
        match self.state {
            SessionState::Recording => {
                self.state = SessionState::Idle;
                info!(
                    commands = self.timeline.len(),
                    duration_ms = self.recording_clock.as_millis(),
                    "recording stopped"
                );
            }
            SessionState::Idle => {}
            SessionState::Replaying => {
                debug!("stop recording ignored while replaying");
            }
        }
    }

    /// Begins replaying the recorded timeline from offset zero.
    ///
    /// Refused with [`SessionError::EmptyTimeline`] when there is nothing to play;
    /// the recorder then stays idle and no actuator is touched.
    pub fn start_replay(&mut self) -> Result<(), SessionError> {
        let refused = match self.state {
            SessionState::Recording => Some(SessionError::RecordingActive),
            SessionState::Replaying => Some(SessionError::ReplayActive),
            SessionState::Idle if self.timeline.is_empty() => Some(SessionError::EmptyTimeline),
            SessionState::Idle => None,
        };
        if let Some(err) = refused {
            warn!(error = %err, state = ?self.state, "replay refused");
            return Err(err);
        }

        self.replay_clock = Duration::ZERO;
        self.state = SessionState::Replaying;
        info!(commands = self.timeline.len(), "replay started");
        Ok(())
    }

    /// Stops a running replay. Entries not yet replayed stay in the timeline.
    pub fn stop_replay(&mut self) {
        if self.state == SessionState::Replaying {
            self.state = SessionState::Idle;
            info!(
                remaining = self.timeline.len(),
                replay_ms = self.replay_clock.as_millis(),
                "replay stopped"
            );
        }
    }

    /// Advances the active clock by one fixed step.
    ///
    /// While replaying, every entry at the front of the timeline whose offset is
    /// within half a step of the replay clock (or already behind it) is applied
    /// and removed before the clock moves on. The recorder goes idle on the tick
    /// that empties the timeline.
    ///
    /// With the recording step, an entry fires on exactly the tick it was recorded
    /// on. Entries already behind the clock, possible when replaying with a
    /// coarser step than the recording used, fire on the next tick instead of
    /// being skipped.
    pub fn tick<A>(&mut self, step: Duration, actuators: &mut A) -> TickReport
    where
        A: ActuatorSet + ?Sized,
    {
        let mut report = TickReport::default();

        match self.state {
            SessionState::Idle => {}
            SessionState::Recording => {
                self.recording_clock += step;
            }
            SessionState::Replaying => {
                let due = self.replay_clock + step / 2;
                while self.timeline.front().is_some_and(|e| e.offset <= due) {
                    let Some(entry) = self.timeline.pop_front() else {
                        break;
                    };
                    debug!(
                        command = %entry.command,
                        offset_ms = entry.offset.as_millis(),
                        replay_ms = self.replay_clock.as_millis(),
                        "command replayed"
                    );
                    entry.command.apply(actuators);
                    report.replayed += 1;
                }

                self.replay_clock += step;

                if self.timeline.is_empty() {
                    self.state = SessionState::Idle;
                    report.replay_finished = true;
                    info!(replay_ms = self.replay_clock.as_millis(), "replay finished");
                }
            }
        }

        report
    }
}
