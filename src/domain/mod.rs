// Domain layer: commands, actuators and the recorded timeline.

pub mod actuator;
pub mod bike;
pub mod command;
pub mod errors;
pub mod timeline;
pub mod tuning;

pub use actuator::{Actuator, ActuatorId, ActuatorSet, Direction};
pub use bike::{BikeController, BikeSnapshot, Garage};
pub use command::Command;
pub use errors::{ControlError, RaceError, SessionError};
pub use timeline::{Timeline, TimelineEntry};

#[cfg(test)]
pub(crate) mod test_support;
