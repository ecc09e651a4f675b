// Single-key terminal control
//
//   w/s forward/back   a/d strafe left/right   q/e rotate   x stop
//   t/r forward-left/right   g/f backward-left/right
//   1-4 speed presets   +/- speed step

use std::time::Duration;

use tracing::info;

use super::CommandSource;
use crate::config::DEFAULT_SPEED;
use crate::messages::{MoveCommand, MovementCommand};

/// Keys are one-shot; without a repeat the command drops back to stop
pub const KEY_EXPIRY: Duration = Duration::from_millis(1000);

const SPEED_PRESETS: [(char, u8, &str); 4] = [
    ('1', 80, "SLOW"),
    ('2', 140, "NORMAL"),
    ('3', 180, "FAST"),
    ('4', 200, "VERY FAST"),
];
const SPEED_STEP: u8 = 20;
const KEY_MIN_SPEED: u8 = 50;
const KEY_MAX_SPEED: u8 = 200;

#[derive(Debug, Clone)]
pub struct KeyboardSource {
    current: MovementCommand,
    speed: u8,
}

impl Default for KeyboardSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardSource {
    pub fn new() -> Self {
        Self {
            current: MovementCommand::default(),
            speed: DEFAULT_SPEED,
        }
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Handle one key press. Unknown keys are ignored.
    pub fn on_key(&mut self, key: char, now: Duration) {
        let command = match key.to_ascii_lowercase() {
            'w' => MoveCommand::Forward,
            's' => MoveCommand::Backward,
            'a' => MoveCommand::Left,
            'd' => MoveCommand::Right,
            'q' => MoveCommand::RotateLeft,
            'e' => MoveCommand::RotateRight,
            'x' => MoveCommand::Stop,
            'r' => MoveCommand::ForwardRight,
            't' => MoveCommand::ForwardLeft,
            'f' => MoveCommand::BackwardRight,
            'g' => MoveCommand::BackwardLeft,
            '+' => {
                self.speed = self.speed.saturating_add(SPEED_STEP).min(KEY_MAX_SPEED);
                info!("Speed: {}", self.speed);
                return;
            }
            '-' => {
                self.speed = self.speed.saturating_sub(SPEED_STEP).max(KEY_MIN_SPEED);
                info!("Speed: {}", self.speed);
                return;
            }
            c => {
                if let Some(&(_, speed, label)) = SPEED_PRESETS.iter().find(|(k, ..)| *k == c) {
                    self.speed = speed;
                    info!("Speed: {} ({})", label, speed);
                }
                return;
            }
        };

        self.current = MovementCommand::discrete(command, self.speed as i32, now);
        info!("Command: {} | {:?} | Speed: {}", key, command, self.speed);
    }
}

impl CommandSource for KeyboardSource {
    fn name(&self) -> &'static str {
        "Terminal keyboard"
    }

    fn tick(&mut self, now: Duration) {
        if self.current.active && now.saturating_sub(self.current.timestamp) > KEY_EXPIRY {
            self.current = MovementCommand::stopped(now);
        }
    }

    fn command(&self) -> MovementCommand {
        self.current
    }

    fn is_active(&self) -> bool {
        true
    }

    fn reset(&mut self, now: Duration) {
        self.current = MovementCommand::stopped(now);
    }
}
