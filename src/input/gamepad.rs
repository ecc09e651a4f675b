// Gamepad command source (phone gamepad app bridged onto the bus)
//
// Two modes, toggled with Select:
// - d-pad: arrows give the 8 translations, square/circle rotate
// - joystick: analog stick mapped to the nearest of the 8 translations,
//   speed scaled by how far the stick is pushed
// Triangle/cross raise/lower the speed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CommandSource, LINK_TIMEOUT};
use crate::config::{DEFAULT_SPEED, MAX_SPEED, MIN_SPEED};
use crate::messages::{MoveCommand, MovementCommand};

/// Active commands older than this fall back to stop
pub const COMMAND_EXPIRY: Duration = Duration::from_millis(500);

/// Minimum spacing between two speed steps while a button is held
pub const SPEED_REPEAT: Duration = Duration::from_millis(200);

pub const SPEED_STEP: i32 = 25;

/// Stick readings inside this box on both axes count as centred
pub const JOYSTICK_DEADZONE: f32 = 20.0;

/// Stick radius at full deflection
pub const JOYSTICK_RANGE: f32 = 100.0;

/// Snapshot of the pad as sent by the app bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub square: bool,
    pub circle: bool,
    pub triangle: bool,
    pub cross: bool,
    pub select: bool,
    /// Stick axes, roughly -100..100, +y forward
    pub x_axis: f32,
    pub y_axis: f32,
}

#[derive(Debug, Clone)]
pub struct GamepadSource {
    current: MovementCommand,
    speed: u8,
    joystick_mode: bool,
    select_held: bool,
    last_speed_change: Option<Duration>,
    last_activity: Option<Duration>,
    connected: bool,
}

impl Default for GamepadSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GamepadSource {
    pub fn new() -> Self {
        Self {
            current: MovementCommand::default(),
            speed: DEFAULT_SPEED,
            joystick_mode: false,
            select_held: false,
            last_speed_change: None,
            last_activity: None,
            connected: false,
        }
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: i32) {
        self.speed = speed.clamp(MIN_SPEED as i32, MAX_SPEED as i32) as u8;
    }

    pub fn joystick_mode(&self) -> bool {
        self.joystick_mode
    }

    /// Feed one pad snapshot
    pub fn update(&mut self, pad: &GamepadState, now: Duration) {
        self.last_activity = Some(now);

        if pad.select && !self.select_held {
            self.joystick_mode = !self.joystick_mode;
            info!(
                "Mode: {}",
                if self.joystick_mode { "Joystick" } else { "GamePad" }
            );
        }
        self.select_held = pad.select;

        if self.joystick_mode {
            self.process_joystick(pad, now);
        } else {
            self.process_dpad(pad, now);
        }
    }

    fn process_dpad(&mut self, pad: &GamepadState, now: Duration) {
        let mut command = if pad.up {
            match (pad.left, pad.right) {
                (true, _) => Some(MoveCommand::ForwardLeft),
                (_, true) => Some(MoveCommand::ForwardRight),
                _ => Some(MoveCommand::Forward),
            }
        } else if pad.down {
            match (pad.left, pad.right) {
                (true, _) => Some(MoveCommand::BackwardLeft),
                (_, true) => Some(MoveCommand::BackwardRight),
                _ => Some(MoveCommand::Backward),
            }
        } else if pad.left {
            Some(MoveCommand::Left)
        } else if pad.right {
            Some(MoveCommand::Right)
        } else {
            None
        };

        // Rotation wins over translation
        if pad.square {
            command = Some(MoveCommand::RotateLeft);
        } else if pad.circle {
            command = Some(MoveCommand::RotateRight);
        }

        if pad.triangle {
            self.adjust_speed(SPEED_STEP, now);
        } else if pad.cross {
            self.adjust_speed(-SPEED_STEP, now);
        }

        match command {
            Some(cmd) => self.set_command(cmd, self.speed as i32, now),
            // Buttons released: send one stop
            None if self.current.active => self.set_command(MoveCommand::Stop, 0, now),
            None => {}
        }
    }

    fn process_joystick(&mut self, pad: &GamepadState, now: Duration) {
        let (x, y) = (pad.x_axis, pad.y_axis);

        if x.abs() < JOYSTICK_DEADZONE && y.abs() < JOYSTICK_DEADZONE {
            if self.current.active {
                self.set_command(MoveCommand::Stop, 0, now);
            }
            return;
        }

        let radius = x.hypot(y).min(JOYSTICK_RANGE);
        let span = (self.speed as f32 - MIN_SPEED as f32).max(0.0);
        let speed = MIN_SPEED as f32 + radius / JOYSTICK_RANGE * span;

        self.set_command(joystick_direction(x, y), speed as i32, now);
    }

    fn adjust_speed(&mut self, delta: i32, now: Duration) {
        let ready = self
            .last_speed_change
            .is_none_or(|t| now.saturating_sub(t) > SPEED_REPEAT);
        if ready {
            self.set_speed(self.speed as i32 + delta);
            self.last_speed_change = Some(now);
            info!("Speed: {}", self.speed);
        }
    }

    fn set_command(&mut self, command: MoveCommand, speed: i32, now: Duration) {
        self.current = MovementCommand::discrete(command, speed, now);
    }
}

/// Nearest of the 8 translations for a stick position.
/// Diagonals own the 45° wedges centred on 45°, 135°, 225° and 315°.
pub fn joystick_direction(x: f32, y: f32) -> MoveCommand {
    let mut angle = y.atan2(x).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }

    match angle {
        a if (22.5..67.5).contains(&a) => MoveCommand::ForwardRight,
        a if (112.5..157.5).contains(&a) => MoveCommand::ForwardLeft,
        a if (202.5..247.5).contains(&a) => MoveCommand::BackwardLeft,
        a if (292.5..337.5).contains(&a) => MoveCommand::BackwardRight,
        a if (45.0..135.0).contains(&a) => MoveCommand::Forward,
        a if (135.0..225.0).contains(&a) => MoveCommand::Left,
        a if (225.0..315.0).contains(&a) => MoveCommand::Backward,
        _ => MoveCommand::Right,
    }
}

impl CommandSource for GamepadSource {
    fn name(&self) -> &'static str {
        "Gamepad"
    }

    fn tick(&mut self, now: Duration) {
        if self.current.active && now.saturating_sub(self.current.timestamp) > COMMAND_EXPIRY {
            self.set_command(MoveCommand::Stop, 0, now);
        }

        let live = self
            .last_activity
            .is_some_and(|t| now.saturating_sub(t) < LINK_TIMEOUT);
        if live && !self.connected {
            info!("App connected!");
        } else if !live && self.connected {
            info!("App disconnected!");
            self.set_command(MoveCommand::Stop, 0, now);
        }
        self.connected = live;
    }

    fn command(&self) -> MovementCommand {
        self.current
    }

    fn is_active(&self) -> bool {
        self.connected
    }

    fn reset(&mut self, now: Duration) {
        self.set_command(MoveCommand::Stop, 0, now);
    }
}
