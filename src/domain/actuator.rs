// Actuator ports: the objects commands mutate, and how commands find them.

use serde::{Deserialize, Serialize};

/// Identifier a command uses to reach its target actuator.
pub type ActuatorId = u64;

/// Lateral direction of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Sign applied to the lateral axis (left is negative).
    pub fn sign(self) -> f32 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }
}

/// The handful of operations commands call on their target.
pub trait Actuator {
    fn turn(&mut self, direction: Direction);
    fn toggle_boost(&mut self);
}

/// Lookup from an actuator binding to the live actuator.
pub trait ActuatorSet {
    fn actuator_mut(&mut self, id: ActuatorId) -> Option<&mut dyn Actuator>;
}
