// Mecanum inverse kinematics for the 4-wheel base
// Converts either a discrete movement + speed, or a planar (vy, vx) vector,
// into signed per-wheel drive values.

use serde::{Deserialize, Serialize};

use crate::config::ROTATION_SCALE;
use crate::messages::{MoveCommand, clamp_unit};

/// Largest drive magnitude a wheel accepts (8-bit PWM)
pub const MAX_DRIVE: i16 = 255;

/// Vector components closer to zero than this count as zero
pub const VECTOR_EPSILON: f32 = 1e-4;

pub fn is_near_zero(v: f32) -> bool {
    v.abs() < VECTOR_EPSILON
}

/// Signed drive values for the four wheels, each in [-255, 255]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelValues {
    pub front_left: i16,  // A
    pub front_right: i16, // C
    pub rear_left: i16,   // B
    pub rear_right: i16,  // D
}

impl WheelValues {
    pub fn new(front_left: i16, front_right: i16, rear_left: i16, rear_right: i16) -> Self {
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Returns values as array [front_left, front_right, rear_left, rear_right]
    pub fn as_array(&self) -> [i16; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }
}

impl std::ops::Neg for WheelValues {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(
            -self.front_left,
            -self.front_right,
            -self.rear_left,
            -self.rear_right,
        )
    }
}

/// Map one of the discrete movements to wheel values at speed `speed`.
///
/// Diagonals drive only one wheel pair and leave the other at zero.
pub fn discrete_to_wheels(command: MoveCommand, speed: u8) -> WheelValues {
    let s = speed as i16;
    // (front_left, front_right, rear_left, rear_right)
    let (a, c, b, d) = match command {
        MoveCommand::Stop => (0, 0, 0, 0),
        MoveCommand::Forward => (s, s, s, s),
        MoveCommand::Backward => (-s, -s, -s, -s),
        MoveCommand::Left => (-s, s, s, -s),
        MoveCommand::Right => (s, -s, -s, s),
        MoveCommand::RotateLeft => (-s, s, -s, s),
        MoveCommand::RotateRight => (s, -s, s, -s),
        MoveCommand::ForwardLeft => (0, s, s, 0),
        MoveCommand::ForwardRight => (s, 0, 0, s),
        MoveCommand::BackwardLeft => (-s, 0, 0, -s),
        MoveCommand::BackwardRight => (0, -s, -s, 0),
    };
    WheelValues::new(a, c, b, d)
}

/// Convert a planar vector (forward `vy`, rightward `vx`) to wheel values
/// at full drive scale
pub fn vector_to_wheels(vy: f32, vx: f32) -> WheelValues {
    body_to_wheels(vy, vx, 0.0)
}

/// Like [`vector_to_wheels`] with a rotation term `w` (positive = counter-clockwise)
pub fn body_to_wheels(vy: f32, vx: f32, w: f32) -> WheelValues {
    body_to_wheels_with_params(vy, vx, w, ROTATION_SCALE, MAX_DRIVE)
}

/// Convert a planar vector to wheel values with custom parameters
pub fn body_to_wheels_with_params(
    vy: f32,
    vx: f32,
    w: f32,
    rotation_scale: f32,
    max_drive: i16,
) -> WheelValues {
    let vy = clamp_unit(vy);
    let vx = clamp_unit(vx);
    let w = clamp_unit(w) * rotation_scale;

    // Explicit stop instead of rounding noise
    if is_near_zero(vy) && is_near_zero(vx) && is_near_zero(w) {
        return WheelValues::zero();
    }

    let raw = [
        vy + vx - w, // front-left
        vy - vx + w, // front-right
        vy - vx - w, // rear-left
        vy + vx + w, // rear-right
    ];
    let [a, c, b, d] = normalize(raw).map(|v| to_drive(v, max_drive));

    WheelValues::new(a, c, b, d)
}

/// Scale down so no magnitude exceeds 1.0. Never scales up.
pub fn normalize(values: [f32; 4]) -> [f32; 4] {
    let m = values.iter().fold(1.0f32, |m, v| m.max(v.abs()));
    values.map(|v| v / m)
}

/// Scale a unit value to a drive value, rounded to nearest
fn to_drive(unit: f32, max_drive: i16) -> i16 {
    let max = max_drive.clamp(0, MAX_DRIVE) as f32;
    (unit * max).round().clamp(-max, max) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> impl Iterator<Item = (f32, f32)> {
        (-10..=10).flat_map(|i| (-10..=10).map(move |j| (i as f32 / 10.0, j as f32 / 10.0)))
    }

    #[test]
    fn test_discrete_table() {
        let s = 120;
        let expect = [
            (MoveCommand::Stop, (0, 0, 0, 0)),
            (MoveCommand::Forward, (s, s, s, s)),
            (MoveCommand::Backward, (-s, -s, -s, -s)),
            (MoveCommand::Left, (-s, s, s, -s)),
            (MoveCommand::Right, (s, -s, -s, s)),
            (MoveCommand::RotateLeft, (-s, s, -s, s)),
            (MoveCommand::RotateRight, (s, -s, s, -s)),
            (MoveCommand::ForwardLeft, (0, s, s, 0)),
            (MoveCommand::ForwardRight, (s, 0, 0, s)),
            (MoveCommand::BackwardLeft, (-s, 0, 0, -s)),
            (MoveCommand::BackwardRight, (0, -s, -s, 0)),
        ];
        for (cmd, (a, c, b, d)) in expect {
            assert_eq!(
                discrete_to_wheels(cmd, s as u8),
                WheelValues::new(a, c, b, d),
                "{:?}",
                cmd
            );
        }
    }

    fn opposite(cmd: MoveCommand) -> MoveCommand {
        use MoveCommand::*;
        match cmd {
            Stop => Stop,
            Forward => Backward,
            Backward => Forward,
            Left => Right,
            Right => Left,
            RotateLeft => RotateRight,
            RotateRight => RotateLeft,
            ForwardLeft => BackwardRight,
            ForwardRight => BackwardLeft,
            BackwardLeft => ForwardRight,
            BackwardRight => ForwardLeft,
        }
    }

    #[test]
    fn test_discrete_opposites_negate() {
        for speed in [0u8, 1, 99, 180, 255] {
            for cmd in MoveCommand::ALL {
                assert_eq!(
                    discrete_to_wheels(opposite(cmd), speed),
                    -discrete_to_wheels(cmd, speed),
                    "{:?} at {}",
                    cmd,
                    speed
                );
            }
        }
    }

    #[test]
    fn test_rotate_left_at_180() {
        let wheels = discrete_to_wheels(MoveCommand::RotateLeft, 180);
        assert_eq!(wheels.as_array(), [-180, 180, -180, 180]);
    }

    #[test]
    fn test_vector_forward_full_scale() {
        let wheels = vector_to_wheels(1.0, 0.0);
        assert_eq!(wheels.as_array(), [MAX_DRIVE; 4]);
    }

    #[test]
    fn test_vector_strafe_right() {
        let wheels = vector_to_wheels(0.0, 1.0);
        assert_eq!(wheels.front_left, MAX_DRIVE);
        assert_eq!(wheels.front_right, -MAX_DRIVE);
        assert_eq!(wheels.rear_left, -MAX_DRIVE);
        assert_eq!(wheels.rear_right, MAX_DRIVE);
    }

    #[test]
    fn test_vector_near_zero_is_exact_stop() {
        assert!(vector_to_wheels(0.0, 0.0).is_zero());
        assert!(vector_to_wheels(0.00005, -0.00005).is_zero());
    }

    #[test]
    fn test_normalized_never_exceeds_unit() {
        for (vy, vx) in grid() {
            let out = normalize([vy + vx, vy - vx, vy - vx, vy + vx]);
            let max = out.iter().fold(0.0f32, |m, v| m.max(v.abs()));
            assert!(max <= 1.0 + f32::EPSILON, "({}, {}) -> {:?}", vy, vx, out);
        }
    }

    #[test]
    fn test_no_scaling_when_inside_unit_range() {
        for (vy, vx) in grid() {
            let raw = [vy + vx, vy - vx, vy - vx, vy + vx];
            if (vy + vx).abs().max((vy - vx).abs()) <= 1.0 {
                assert_eq!(normalize(raw), raw, "({}, {})", vy, vx);
            }
        }
    }

    #[test]
    fn test_diagonal_vector_is_scaled_down() {
        // vy + vx = 2.0 before normalization
        let wheels = vector_to_wheels(1.0, 1.0);
        assert_eq!(wheels.as_array(), [MAX_DRIVE, 0, 0, MAX_DRIVE]);

        let wheels = vector_to_wheels(0.5, 0.25);
        assert_eq!(wheels.front_left, 191); // 0.75 * 255 = 191.25
        assert_eq!(wheels.front_right, 64); // 0.25 * 255 = 63.75
    }

    #[test]
    fn test_vector_inputs_are_clamped() {
        assert_eq!(vector_to_wheels(5.0, 0.0), vector_to_wheels(1.0, 0.0));
    }

    #[test]
    fn test_rotation_term_matches_discrete_rotation_signs() {
        let wheels = body_to_wheels_with_params(0.0, 0.0, 1.0, 1.0, 180);
        assert_eq!(wheels, discrete_to_wheels(MoveCommand::RotateLeft, 180));

        let scaled = body_to_wheels(0.0, 0.0, -1.0);
        assert_eq!(scaled.front_left, (ROTATION_SCALE * 255.0).round() as i16);
    }
}
