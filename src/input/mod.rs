// Command sources
//
// Every way of steering the base (remote vector channel, gamepad, terminal
// keyboard) produces the same MovementCommand. The runtime only talks to an
// InputSource and never cares which variant is behind it.

use std::time::Duration;

use crate::messages::MovementCommand;

pub mod gamepad;
pub mod keyboard;
pub mod vector;

pub use gamepad::{GamepadSource, GamepadState};
pub use keyboard::KeyboardSource;
pub use vector::{VectorChannel, VectorParseError, VectorPayload, parse_vector_message};

/// A link with no traffic for this long is reported as disconnected
pub const LINK_TIMEOUT: Duration = Duration::from_secs(3);

pub trait CommandSource {
    fn name(&self) -> &'static str;

    /// Housekeeping once per loop: expiry, connection tracking
    fn tick(&mut self, now: Duration);

    /// Latest command; re-stamped whenever the source updates it
    fn command(&self) -> MovementCommand;

    /// Whether the upstream link looks alive. Advisory only.
    fn is_active(&self) -> bool;

    /// Drop the current command in favour of a stop stamped `now`.
    /// Speed settings survive.
    fn reset(&mut self, now: Duration);
}

/// Which source drives the base
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    Vector,
    Gamepad,
    Keyboard,
}

#[derive(Debug, Clone)]
pub enum InputSource {
    Vector(VectorChannel),
    Gamepad(GamepadSource),
    Keyboard(KeyboardSource),
}

impl InputSource {
    pub fn new(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Vector => InputSource::Vector(VectorChannel::new()),
            SourceKind::Gamepad => InputSource::Gamepad(GamepadSource::new()),
            SourceKind::Keyboard => InputSource::Keyboard(KeyboardSource::new()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            InputSource::Vector(_) => SourceKind::Vector,
            InputSource::Gamepad(_) => SourceKind::Gamepad,
            InputSource::Keyboard(_) => SourceKind::Keyboard,
        }
    }
}

macro_rules! each_source {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            InputSource::Vector($s) => $body,
            InputSource::Gamepad($s) => $body,
            InputSource::Keyboard($s) => $body,
        }
    };
}

impl CommandSource for InputSource {
    fn name(&self) -> &'static str {
        each_source!(self, s => s.name())
    }

    fn tick(&mut self, now: Duration) {
        each_source!(self, s => s.tick(now))
    }

    fn command(&self) -> MovementCommand {
        each_source!(self, s => s.command())
    }

    fn is_active(&self) -> bool {
        each_source!(self, s => s.is_active())
    }

    fn reset(&mut self, now: Duration) {
        each_source!(self, s => s.reset(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_starts_stopped() {
        for kind in [SourceKind::Vector, SourceKind::Gamepad, SourceKind::Keyboard] {
            let source = InputSource::new(kind);
            assert_eq!(source.kind(), kind);
            assert!(!source.command().active);
        }
    }

    #[test]
    fn test_variant_dispatch() {
        let mut source = InputSource::new(SourceKind::Keyboard);
        if let InputSource::Keyboard(keys) = &mut source {
            keys.on_key('w', Duration::from_millis(3));
        }
        assert!(source.command().active);
        assert_eq!(source.name(), "Terminal keyboard");

        source.reset(Duration::from_millis(4));
        assert!(!source.command().active);
    }
}
