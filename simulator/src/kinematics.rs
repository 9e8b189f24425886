//! Conversion of planar velocity commands for a differential drive robot.

use prelude::*;

/// Heading errors beyond this are served by driving backwards.
pub const REVERSE_THRESHOLD: float = 2.0 * PI / 3.0;
/// Speeds below this stop the robot.
pub const DEAD_BAND: float = 0.001;
/// Distance of the controlled point ahead of the wheel axle.
pub const OFFSET: float = 0.05;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Unicycle {
    pub linear: float,
    pub angular: float,
}

/// Speed along the heading and the heading error to the commanded velocity. The error is
/// used directly as the angular rate, a proportional turn with unit gain.
pub fn unicycle_command(velocity: &Vector2, heading: float) -> Unicycle {
    let mut linear = velocity.norm();
    if linear < DEAD_BAND {
        return Unicycle::default();
    }
    let mut angular = phase_unwrap(0.0, velocity.y.atan2(velocity.x) - heading);
    if angular.abs() > REVERSE_THRESHOLD {
        angular -= angular.signum() * PI;
        linear = -linear;
    }
    Unicycle { linear, angular }
}

/// Linear and angular accelerations that give the point `OFFSET` ahead of the axle the
/// planar `acceleration`, for a robot currently driving with `drive` at `heading`.
pub fn acceleration_command(acceleration: &Vector2, drive: &Unicycle, heading: float) -> Unicycle {
    let (sin, cos) = heading.sin_cos();
    let Unicycle { linear: v, angular: w } = *drive;
    let ax = acceleration.x + v * w * sin + OFFSET * w * w * cos;
    let ay = acceleration.y - v * w * cos + OFFSET * w * w * sin;
    // Inverse of [[cos, -d sin], [sin, d cos]], whose determinant is d
    Unicycle {
        linear: cos * ax + sin * ay,
        angular: (cos * ay - sin * ax) / OFFSET,
    }
}
