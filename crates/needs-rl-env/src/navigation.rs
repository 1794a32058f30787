//! Movement toward interactable objects

use crate::objects::Position;

/// Progress of a move after one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveProgress {
    /// Still travelling
    Moving(Position),
    /// Move ended; `succeeded` when the target is within reach
    Finished {
        /// Final position
        position: Position,
        /// Whether the object can be used from there
        succeeded: bool,
    },
}

/// Moves agents between positions
pub trait NavigationService: Send + Sync {
    /// Advance a move by `dt` seconds. `elapsed` is the time already spent on it.
    fn advance(&self, from: Position, target: Position, elapsed: f64, dt: f64) -> MoveProgress;
}

/// Straight-line movement at constant speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightLineNavigator {
    /// Units per second
    pub speed: f64,
    /// Distance at which a move counts as arrived
    pub acceptance_radius: f64,
    /// Distance under which an arrived agent can use the object
    pub reach_distance: f64,
    /// Seconds before a move is abandoned
    pub timeout: f64,
}

impl Default for StraightLineNavigator {
    fn default() -> Self {
        Self {
            speed: 600.0,
            acceptance_radius: 150.0,
            reach_distance: 300.0,
            timeout: 30.0,
        }
    }
}

impl StraightLineNavigator {
    fn finished(&self, position: Position, target: Position) -> MoveProgress {
        MoveProgress::Finished {
            position,
            succeeded: position.distance(target) < self.reach_distance,
        }
    }
}

impl NavigationService for StraightLineNavigator {
    fn advance(&self, from: Position, target: Position, elapsed: f64, dt: f64) -> MoveProgress {
        let distance = from.distance(target);
        if distance <= self.acceptance_radius {
            return self.finished(from, target);
        }
        let remaining = distance - self.acceptance_radius;
        let step = self.speed * dt;
        if step >= remaining {
            return self.finished(from.step_toward(target, remaining), target);
        }
        let next = from.step_toward(target, step);
        if elapsed + dt >= self.timeout {
            return self.finished(next, target);
        }
        MoveProgress::Moving(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrives_at_acceptance_radius() {
        let nav = StraightLineNavigator::default();
        let target = Position::new(1000.0, 0.0);
        let mut position = Position::default();
        let mut elapsed = 0.0;
        loop {
            match nav.advance(position, target, elapsed, 0.5) {
                MoveProgress::Moving(next) => {
                    position = next;
                    elapsed += 0.5;
                }
                MoveProgress::Finished { position, succeeded } => {
                    assert!(succeeded);
                    assert!((position.distance(target) - 150.0).abs() < 1e-6);
                    break;
                }
            }
        }
        assert!(elapsed <= 1.5);
    }

    #[test]
    fn test_timeout_out_of_reach_fails() {
        let nav = StraightLineNavigator {
            speed: 10.0,
            ..StraightLineNavigator::default()
        };
        let progress = nav.advance(Position::default(), Position::new(5000.0, 0.0), 29.5, 1.0);
        assert!(matches!(progress, MoveProgress::Finished { succeeded: false, .. }));
    }

    #[test]
    fn test_already_close_finishes_immediately() {
        let nav = StraightLineNavigator::default();
        let progress = nav.advance(Position::new(100.0, 0.0), Position::default(), 0.0, 0.1);
        assert_eq!(
            progress,
            MoveProgress::Finished {
                position: Position::new(100.0, 0.0),
                succeeded: true
            }
        );
    }
}
