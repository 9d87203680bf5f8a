//! Bounded bounce/follow movement.
//!
//! Leaders walk the grid one cell per tick along a single axis. A car keeps
//! its direction until it hits a wall, bounces back, and picks a fresh
//! direction whenever it is standing still on the chosen axis. Followers
//! never compute a trajectory: they step into the cell their leader just
//! left, keeping one cell of gap.
//!
//! All coordinates live in `[0, size - 1]`. Every function that needs a
//! random choice takes the generator as a parameter so tests can seed it.

use citysim_types::Position;
use rand::Rng;

/// One of the two grid axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Columns.
    X,
    /// Rows.
    Y,
}

/// Bounds of a square city grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    size: u32,
}

impl Grid {
    /// Smallest grid on which a bounce has somewhere to go.
    pub const MIN_SIZE: u32 = 2;

    /// Create a grid of `size` by `size` cells.
    ///
    /// Returns `None` when `size` is below [`Grid::MIN_SIZE`].
    pub const fn new(size: u32) -> Option<Self> {
        if size < Self::MIN_SIZE {
            None
        } else {
            Some(Self { size })
        }
    }

    /// Number of cells per side.
    pub const fn size(self) -> u32 {
        self.size
    }

    /// Highest valid coordinate.
    const fn max(self) -> u32 {
        self.size.saturating_sub(1)
    }

    /// Whether `position` lies on the grid.
    pub const fn contains(self, position: Position) -> bool {
        position.x < self.size && position.y < self.size
    }

    /// A uniformly random cell.
    pub fn random_position<R: Rng + ?Sized>(self, rng: &mut R) -> Position {
        Position::new(rng.random_range(0..self.size), rng.random_range(0..self.size))
    }

    /// Whether a car can keep moving along an axis.
    ///
    /// True when the coordinate is strictly inside the grid, or when it sits
    /// on a wall it was already on last tick (stalled there rather than
    /// freshly arrived).
    pub const fn can_move(self, current: u32, last: u32) -> bool {
        let max = self.max();
        (current > 0 && current < max)
            || (current == 0 && last == 0)
            || (current == max && last == max)
    }

    /// Pick the axis for this tick.
    ///
    /// X when only X is open, Y when X is closed, a coin flip when both are
    /// open. The previous tick's axis plays no part.
    pub fn choose_axis<R: Rng + ?Sized>(self, current: Position, last: Position, rng: &mut R) -> Axis {
        let x_open = self.can_move(current.x, last.x);
        let y_open = self.can_move(current.y, last.y);
        if x_open && (!y_open || rng.random_bool(0.5)) {
            Axis::X
        } else {
            Axis::Y
        }
    }

    /// Next value of a single coordinate.
    pub fn next_coordinate<R: Rng + ?Sized>(self, current: u32, last: u32, rng: &mut R) -> u32 {
        let max = self.max();
        if current == 0 {
            1
        } else if current >= max {
            max.saturating_sub(1)
        } else if current == last {
            if rng.random_bool(0.5) {
                current.saturating_add(1)
            } else {
                current.saturating_sub(1)
            }
        } else {
            let delta = current.abs_diff(last);
            if current > last {
                current.saturating_add(delta).min(max)
            } else {
                current.saturating_sub(delta)
            }
        }
    }

    /// Where a leader at `current`, coming from `last`, goes next.
    pub fn next_position<R: Rng + ?Sized>(self, current: Position, last: Position, rng: &mut R) -> Position {
        match self.choose_axis(current, last, rng) {
            Axis::X => Position::new(self.next_coordinate(current.x, last.x, rng), current.y),
            Axis::Y => Position::new(current.x, self.next_coordinate(current.y, last.y, rng)),
        }
    }
}

/// Where a follower goes after its leader moved.
///
/// `leader` is the leader's position after its move and `leader_previous`
/// the cell it just left. Returns `None` when the follower is already
/// within one cell of the leader and stays put.
pub const fn follow(follower: Position, leader: Position, leader_previous: Position) -> Option<Position> {
    if follower.distance(leader) > 1 {
        Some(leader_previous)
    } else {
        None
    }
}

/// Where a follower goes when the car ahead of it held its cell.
///
/// The follower moves to the cell next to `ahead` on its own side, so it
/// ends up exactly one cell away and never on top of it. Returns `None`
/// when it is already within one cell.
pub const fn approach(follower: Position, ahead: Position) -> Option<Position> {
    if follower.distance(ahead) <= 1 {
        return None;
    }
    Some(Position::new(
        step_toward(ahead.x, follower.x),
        step_toward(ahead.y, follower.y),
    ))
}

/// `target` moved one unit toward `from`.
const fn step_toward(target: u32, from: u32) -> u32 {
    if from > target {
        target.saturating_add(1)
    } else if from < target {
        target.saturating_sub(1)
    } else {
        target
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn grid(size: u32) -> Grid {
        Grid::new(size).unwrap_or(Grid { size: Grid::MIN_SIZE })
    }

    #[test]
    fn grids_below_two_cells_are_rejected() {
        assert!(Grid::new(0).is_none());
        assert!(Grid::new(1).is_none());
        assert_eq!(Grid::new(2).map(Grid::size), Some(2));
    }

    #[test]
    fn blocked_y_forces_x_on_two_cell_grid() {
        let mut rng = SmallRng::seed_from_u64(42);
        let next = grid(2).next_position(Position::new(0, 1), Position::new(0, 0), &mut rng);
        assert_eq!(next, Position::new(1, 1));
    }

    #[test]
    fn blocked_y_forces_x_for_every_seed() {
        for seed in 0..64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let next = grid(2).next_position(Position::new(0, 1), Position::new(0, 0), &mut rng);
            assert_eq!(next, Position::new(1, 1), "seed {seed}");
        }
    }

    #[test]
    fn walls_bounce_back() {
        let mut rng = SmallRng::seed_from_u64(1);
        let g = grid(10);
        assert_eq!(g.next_coordinate(0, 1, &mut rng), 1);
        assert_eq!(g.next_coordinate(0, 0, &mut rng), 1);
        assert_eq!(g.next_coordinate(9, 8, &mut rng), 8);
        assert_eq!(g.next_coordinate(9, 9, &mut rng), 8);
    }

    #[test]
    fn interior_keeps_its_direction() {
        let mut rng = SmallRng::seed_from_u64(1);
        let g = grid(10);
        assert_eq!(g.next_coordinate(4, 3, &mut rng), 5);
        assert_eq!(g.next_coordinate(4, 5, &mut rng), 3);
    }

    #[test]
    fn standing_still_steps_one_cell_either_way() {
        let g = grid(10);
        let mut seen_up = false;
        let mut seen_down = false;
        for seed in 0..64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let next = g.next_coordinate(5, 5, &mut rng);
            assert!(next == 4 || next == 6, "unexpected coordinate {next}");
            seen_up |= next == 6;
            seen_down |= next == 4;
        }
        assert!(seen_up && seen_down);
    }

    #[test]
    fn freshly_arrived_at_wall_cannot_move_on_that_axis() {
        let g = grid(10);
        assert!(!g.can_move(0, 1));
        assert!(!g.can_move(9, 8));
        assert!(g.can_move(0, 0));
        assert!(g.can_move(9, 9));
        assert!(g.can_move(5, 4));
    }

    #[test]
    fn closed_x_forces_y() {
        let g = grid(10);
        for seed in 0..32 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let axis = g.choose_axis(Position::new(0, 5), Position::new(1, 5), &mut rng);
            assert_eq!(axis, Axis::Y);
        }
    }

    #[test]
    fn both_open_uses_both_axes() {
        let g = grid(10);
        let mut axes = Vec::new();
        for seed in 0..64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            axes.push(g.choose_axis(Position::new(4, 4), Position::new(4, 4), &mut rng));
        }
        assert!(axes.contains(&Axis::X));
        assert!(axes.contains(&Axis::Y));
    }

    #[test]
    fn long_walks_stay_on_the_grid() {
        for size in [2, 3, 5, 10, 17] {
            let g = grid(size);
            let mut rng = SmallRng::seed_from_u64(u64::from(size));
            let mut current = g.random_position(&mut rng);
            let mut last = current;
            for _ in 0..2_000 {
                let next = g.next_position(current, last, &mut rng);
                assert!(g.contains(next), "size {size}: {next} escaped");
                assert_eq!(next.distance(current), 1, "size {size}: jumped from {current} to {next}");
                last = current;
                current = next;
            }
        }
    }

    #[test]
    fn follower_takes_the_vacated_cell_when_far() {
        let next = follow(Position::new(0, 0), Position::new(3, 1), Position::new(2, 1));
        assert_eq!(next, Some(Position::new(2, 1)));
    }

    #[test]
    fn follower_waits_when_adjacent() {
        assert_eq!(follow(Position::new(2, 2), Position::new(3, 3), Position::new(3, 2)), None);
        assert_eq!(follow(Position::new(3, 3), Position::new(3, 3), Position::new(3, 2)), None);
    }

    #[test]
    fn follower_pulls_up_behind_a_stationary_car() {
        assert_eq!(approach(Position::new(0, 0), Position::new(10, 10)), Some(Position::new(9, 9)));
        assert_eq!(approach(Position::new(19, 10), Position::new(10, 10)), Some(Position::new(11, 10)));
        assert_eq!(approach(Position::new(10, 3), Position::new(10, 10)), Some(Position::new(10, 9)));
        assert_eq!(approach(Position::new(9, 11), Position::new(10, 10)), None);
    }
}
