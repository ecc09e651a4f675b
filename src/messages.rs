// Define message types for the runtime

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motor::kinematics::is_near_zero;

/// The eleven discrete movements a command source can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveCommand {
    #[default]
    Stop,
    Forward,
    Backward,
    Left,
    Right,
    RotateLeft,
    RotateRight,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
}

impl MoveCommand {
    pub const ALL: [MoveCommand; 11] = [
        MoveCommand::Stop,
        MoveCommand::Forward,
        MoveCommand::Backward,
        MoveCommand::Left,
        MoveCommand::Right,
        MoveCommand::RotateLeft,
        MoveCommand::RotateRight,
        MoveCommand::ForwardLeft,
        MoveCommand::ForwardRight,
        MoveCommand::BackwardLeft,
        MoveCommand::BackwardRight,
    ];
}

/// Either a discrete movement or a continuous planar vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionMode {
    Discrete(MoveCommand),
    /// Components in [-1, 1]; `w` is the optional rotation term (0 = none)
    Vector { vy: f32, vx: f32, w: f32 },
}

/// Canonical intent produced by an input source once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementCommand {
    pub mode: MotionMode,
    /// Only meaningful for discrete mode
    pub speed: u8,
    pub active: bool,
    pub timestamp: Duration,
}

impl MovementCommand {
    pub fn stopped(timestamp: Duration) -> Self {
        Self::discrete(MoveCommand::Stop, 0, timestamp)
    }

    pub fn discrete(command: MoveCommand, speed: i32, timestamp: Duration) -> Self {
        Self {
            mode: MotionMode::Discrete(command),
            speed: speed.clamp(0, 255) as u8,
            active: command != MoveCommand::Stop,
            timestamp,
        }
    }

    pub fn vector(vy: f32, vx: f32, w: f32, timestamp: Duration) -> Self {
        let vy = clamp_unit(vy);
        let vx = clamp_unit(vx);
        let w = clamp_unit(w);
        Self {
            mode: MotionMode::Vector { vy, vx, w },
            speed: 0,
            active: !(is_near_zero(vy) && is_near_zero(vx) && is_near_zero(w)),
            timestamp,
        }
    }
}

impl Default for MovementCommand {
    fn default() -> Self {
        Self::stopped(Duration::ZERO)
    }
}

/// Clamp to [-1, 1]; NaN collapses to 0
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    MotorsOffline,
}
