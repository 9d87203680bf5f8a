//! Simulated vehicles.

use std::collections::BTreeSet;

use citysim_types::{CarId, CityId, Position};
use rand::Rng;
use serde::Serialize;
use tracing::trace;

use crate::movement::{self, Grid};

/// A car driving around a city grid.
///
/// A car is either a *leader* (no `leader_id`, moved by its own scheduled
/// task) or a *follower* (`leader_id` set, moved only when its leader
/// ticks). The `followers` set holds ids of the cars attached to this one;
/// the cars themselves are owned by the city registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Car {
    /// Vehicle identification number.
    pub vin: CarId,
    /// License plate.
    pub license_plate: String,
    /// Owning city.
    pub city_id: CityId,
    /// The car this one follows, if any.
    pub leader_id: Option<CarId>,
    /// Current cell.
    pub position: Position,
    /// Cell occupied before the last move.
    pub previous_position: Position,
    /// Cars attached to this one.
    pub followers: BTreeSet<CarId>,
}

impl Car {
    /// Create a car parked at `position`, with no movement history.
    pub const fn new(
        vin: CarId,
        license_plate: String,
        city_id: CityId,
        leader_id: Option<CarId>,
        position: Position,
    ) -> Self {
        Self {
            vin,
            license_plate,
            city_id,
            leader_id,
            position,
            previous_position: position,
            followers: BTreeSet::new(),
        }
    }

    /// Whether this car is independently scheduled.
    pub const fn is_leader(&self) -> bool {
        self.leader_id.is_none()
    }

    /// Move one cell along the bounce walk and return the new position.
    pub fn advance<R: Rng + ?Sized>(&mut self, grid: Grid, rng: &mut R) -> Position {
        let next = grid.next_position(self.position, self.previous_position, rng);
        self.move_to(next);
        next
    }

    /// Close the gap to a leader that has just moved.
    ///
    /// Returns `true` if the car moved.
    pub fn follow(&mut self, leader_position: Position, leader_previous: Position) -> bool {
        match movement::follow(self.position, leader_position, leader_previous) {
            Some(next) => {
                self.move_to(next);
                true
            }
            None => false,
        }
    }

    /// Close the gap to a car ahead that held its cell this tick.
    ///
    /// Returns `true` if the car moved.
    pub fn close_in(&mut self, ahead: Position) -> bool {
        match movement::approach(self.position, ahead) {
            Some(next) => {
                self.move_to(next);
                true
            }
            None => false,
        }
    }

    /// Attach a follower. Returns `false` if it was already attached.
    pub fn attach_follower(&mut self, follower: CarId) -> bool {
        self.followers.insert(follower)
    }

    fn move_to(&mut self, next: Position) {
        self.previous_position = self.position;
        self.position = next;
        trace!(plate = %self.license_plate, position = %self.position, "car moved");
    }
}
