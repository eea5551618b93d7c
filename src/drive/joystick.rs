// Eight-way single stick mapping
// Quantizes a 2D stick reading into one of 8 travel directions, then scales
// the motor pair by how far the stick is pushed. Diagonals slow the inner
// wheel to DIAGONAL_SCALE of the outer one.

use crate::messages::Direction;

use super::kinematics::{MotorTarget, SPEED_LIMIT};

/// Stick distance (percent) below which the car stops
pub const DEAD_ZONE: f32 = 10.0;

/// Inner wheel ratio for diagonal directions
pub const DIAGONAL_SCALE: f32 = 0.3;

const SECTOR_DEG: f32 = 45.0;

/// Sectors clockwise from forward
const SECTORS: [Direction; 8] = [
    Direction::Forward,
    Direction::ForwardRight,
    Direction::Right,
    Direction::BackwardRight,
    Direction::Backward,
    Direction::BackwardLeft,
    Direction::Left,
    Direction::ForwardLeft,
];

/// Normalized stick reading
///
/// `x` is positive to the right, `y` is positive *down* (screen convention),
/// so pushing the stick forward gives a negative `y`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StickVector {
    pub x: f32,
    pub y: f32,
}

impl StickVector {
    pub fn new(x: f32, y: f32) -> Self {
        let sanitize = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        Self {
            x: sanitize(x),
            y: sanitize(y),
        }
    }

    /// How far the stick is pushed, in [0, 100]
    pub fn distance(&self) -> f32 {
        (self.x.hypot(self.y) * 100.0).min(100.0)
    }

    /// Degrees clockwise from forward, in [0, 360)
    pub fn bearing(&self) -> f32 {
        let deg = self.x.atan2(-self.y).to_degrees();
        if deg < 0.0 { deg + 360.0 } else { deg }
    }
}

/// Travel direction for a stick reading, `None` inside the dead zone
pub fn direction_for(stick: StickVector) -> Option<Direction> {
    if stick.distance() < DEAD_ZONE {
        return None;
    }
    let sector = ((stick.bearing() + SECTOR_DEG / 2.0) / SECTOR_DEG).floor() as usize % SECTORS.len();
    Some(SECTORS[sector])
}

/// Motor targets for a stick reading
pub fn eight_way(stick: StickVector) -> MotorTarget {
    let Some(direction) = direction_for(stick) else {
        return MotorTarget::stopped();
    };

    let s = stick.distance().round();
    let inner = (s * DIAGONAL_SCALE).round() as i32;
    let s = (s as i32).min(SPEED_LIMIT);

    let (left, right) = match direction {
        Direction::Forward => (s, s),
        Direction::Backward => (-s, -s),
        Direction::Right => (s, -s),
        Direction::Left => (-s, s),
        Direction::ForwardRight => (s, inner),
        Direction::ForwardLeft => (inner, s),
        Direction::BackwardRight => (-s, -inner),
        Direction::BackwardLeft => (-inner, -s),
        _ => (0, 0),
    };
    MotorTarget::new(left, right)
}
