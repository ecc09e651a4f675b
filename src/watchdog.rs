// Command watchdog
// Note: if the command source goes quiet (app closed, link dropped) the base
// must not keep rolling on the last command. Once nothing new has arrived for
// `timeout`, the watchdog asks for a single all-stop.

use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// A moving command was applied within the timeout window
    Engaged,
    /// Stopped, either explicitly or by expiry
    Halted,
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    last_command_time: Duration,
    state: WatchdogState,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            last_command_time: Duration::ZERO,
            state: WatchdogState::Halted, // Start halted until first command
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn last_command_time(&self) -> Duration {
        self.last_command_time
    }

    /// A moving command was applied at `now`
    pub fn engage(&mut self, now: Duration) {
        self.last_command_time = now;
        self.state = WatchdogState::Engaged;
    }

    /// A stop was applied at `now`
    pub fn halt(&mut self, now: Duration) {
        self.last_command_time = now;
        self.state = WatchdogState::Halted;
    }

    /// Returns true exactly once per ENGAGED -> HALTED expiry; the caller
    /// must stop the motors when it does.
    pub fn poll(&mut self, now: Duration, timeout: Duration) -> bool {
        if self.state == WatchdogState::Halted {
            return false;
        }

        let age = now.saturating_sub(self.last_command_time);
        if age > timeout {
            warn!("Command stale ({:?} old), stopping robot", age);
            self.state = WatchdogState::Halted;
            return true;
        }
        false
    }
}
