// Bike actuator and the garage that holds every bike in the sandbox.

use super::actuator::{Actuator, ActuatorId, ActuatorSet, Direction};
use super::tuning::bike::BikeTuning;
use std::collections::BTreeMap;

/// Snapshot of a bike for wire transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct BikeSnapshot {
    pub id: ActuatorId,
    pub lane_offset: f32,
    pub boost: bool,
}

/// Controllable bike. Turning shifts it sideways by a fixed step; boost is a latch.
#[derive(Debug, Clone)]
pub struct BikeController {
    pub id: ActuatorId,
    pub lane_offset: f32,
    pub boost: bool,
    tuning: BikeTuning,
}

impl BikeController {
    pub fn new(id: ActuatorId, tuning: BikeTuning) -> Self {
        Self {
            id,
            lane_offset: tuning.start_offset,
            boost: false,
            tuning,
        }
    }

    /// Puts the bike back on its start line with boost off.
    pub fn reset(&mut self) {
        self.lane_offset = self.tuning.start_offset;
        self.boost = false;
    }
}

impl Actuator for BikeController {
    fn turn(&mut self, direction: Direction) {
        self.lane_offset += direction.sign() * self.tuning.turn_distance;
    }

    fn toggle_boost(&mut self) {
        self.boost = !self.boost;
    }
}

impl From<&BikeController> for BikeSnapshot {
    fn from(bike: &BikeController) -> Self {
        Self {
            id: bike.id,
            lane_offset: bike.lane_offset,
            boost: bike.boost,
        }
    }
}

/// Every bike in the sandbox, keyed by id.
#[derive(Debug, Default)]
pub struct Garage {
    bikes: BTreeMap<ActuatorId, BikeController>,
}

impl Garage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a bike, replacing any bike that already had the same id.
    pub fn insert(&mut self, bike: BikeController) {
        self.bikes.insert(bike.id, bike);
    }

    pub fn get(&self, id: ActuatorId) -> Option<&BikeController> {
        self.bikes.get(&id)
    }

    pub fn reset_all(&mut self) {
        for bike in self.bikes.values_mut() {
            bike.reset();
        }
    }

    pub fn snapshots(&self) -> Vec<BikeSnapshot> {
        self.bikes.values().map(BikeSnapshot::from).collect()
    }
}

impl ActuatorSet for Garage {
    fn actuator_mut(&mut self, id: ActuatorId) -> Option<&mut dyn Actuator> {
        self.bikes
            .get_mut(&id)
            .map(|bike| bike as &mut dyn Actuator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Command;

    fn garage_with(id: ActuatorId) -> Garage {
        let mut garage = Garage::new();
        garage.insert(BikeController::new(id, BikeTuning::default()));
        garage
    }

    #[test]
    fn turns_shift_the_lane_by_the_tuned_distance() {
        let mut garage = garage_with(1);

        Command::TurnLeft { target: 1 }.apply(&mut garage);
        Command::TurnLeft { target: 1 }.apply(&mut garage);
        Command::TurnRight { target: 1 }.apply(&mut garage);

        let bike = garage.get(1).expect("bike should exist");
        assert_eq!(bike.lane_offset, -1.0);
        assert!(!bike.boost);
    }

    #[test]
    fn toggle_boost_flips_the_latch() {
        let mut garage = garage_with(1);

        Command::ToggleBoost { target: 1 }.apply(&mut garage);
        assert!(garage.get(1).expect("bike should exist").boost);

        Command::ToggleBoost { target: 1 }.apply(&mut garage);
        assert!(!garage.get(1).expect("bike should exist").boost);
    }

    #[test]
    fn reset_returns_every_bike_to_the_start_line() {
        let mut garage = garage_with(1);
        garage.insert(BikeController::new(
            2,
            BikeTuning {
                turn_distance: 2.5,
                start_offset: 4.0,
            },
        ));

        Command::TurnRight { target: 1 }.apply(&mut garage);
        Command::TurnRight { target: 2 }.apply(&mut garage);
        Command::ToggleBoost { target: 2 }.apply(&mut garage);
        garage.reset_all();

        let snapshots = garage.snapshots();
        assert_eq!(
            snapshots,
            vec![
                BikeSnapshot {
                    id: 1,
                    lane_offset: 0.0,
                    boost: false
                },
                BikeSnapshot {
                    id: 2,
                    lane_offset: 4.0,
                    boost: false
                },
            ]
        );
    }

    #[test]
    fn unknown_ids_are_not_resolved() {
        let mut garage = garage_with(1);
        assert!(garage.actuator_mut(9).is_none());
    }
}
