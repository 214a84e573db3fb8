// Input capture: turns discrete triggers into commands for the bound bike.

use crate::domain::{ActuatorId, Command};
use std::collections::HashMap;

/// A discrete control trigger, independent of the device that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputTrigger {
    TurnLeft,
    TurnRight,
    ToggleBoost,
}

/// Maps triggers and keys to commands bound to the current actuator.
///
/// Each trigger occurrence yields exactly one command; nothing is coalesced or
/// debounced here.
#[derive(Debug, Clone)]
pub struct InputCapture {
    target: ActuatorId,
    key_bindings: HashMap<char, InputTrigger>,
}

impl InputCapture {
    /// Capture bound to `target` with the default A/D/W layout.
    pub fn new(target: ActuatorId) -> Self {
        let mut capture = Self {
            target,
            key_bindings: HashMap::new(),
        };
        capture.bind_key('a', InputTrigger::TurnLeft);
        capture.bind_key('d', InputTrigger::TurnRight);
        capture.bind_key('w', InputTrigger::ToggleBoost);
        capture
    }

    pub fn target(&self) -> ActuatorId {
        self.target
    }

    /// Points subsequent commands at another actuator.
    pub fn rebind(&mut self, target: ActuatorId) {
        self.target = target;
    }

    /// Binds `key` (case-insensitive) to `trigger`, replacing any previous binding.
    pub fn bind_key(&mut self, key: char, trigger: InputTrigger) {
        self.key_bindings.insert(key.to_ascii_uppercase(), trigger);
    }

    pub fn trigger_for_key(&self, key: char) -> Option<InputTrigger> {
        self.key_bindings.get(&key.to_ascii_uppercase()).copied()
    }

    pub fn command_for(&self, trigger: InputTrigger) -> Command {
        let target = self.target;
        match trigger {
            InputTrigger::TurnLeft => Command::TurnLeft { target },
            InputTrigger::TurnRight => Command::TurnRight { target },
            InputTrigger::ToggleBoost => Command::ToggleBoost { target },
        }
    }

    /// Command for a key release, or `None` if the key is unbound.
    pub fn command_for_key(&self, key: char) -> Option<Command> {
        self.trigger_for_key(key).map(|trigger| self.command_for(trigger))
    }
}
