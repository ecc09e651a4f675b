// Remote vector channel: "V:<vy>,<vx>" text messages
//
// Accepted forms (tag is case-insensitive, whitespace around fields ignored):
//   V:1.0,0.3
//   v: -0.5 , 0.25
//   V:0.4,0,-0.2     (optional third field: rotation, positive = counter-clockwise)

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CommandSource, LINK_TIMEOUT};
use crate::messages::{MovementCommand, clamp_unit};

/// Decoded and clamped vector message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorPayload {
    pub vy: f32,
    pub vx: f32,
    pub w: f32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorParseError {
    #[error("Missing 'V:' tag in {0:?}")]
    MissingTag(String),

    #[error("Expected V:vy,vx, got {0:?}")]
    MissingComma(String),

    #[error("Too many fields in {0:?}")]
    TooManyFields(String),

    #[error("Field {field:?} is not a number")]
    NotANumber { field: String },
}

/// Parse a vector message; components are clamped to [-1, 1]
pub fn parse_vector_message(text: &str) -> Result<VectorPayload, VectorParseError> {
    let message = text.trim();
    let rest = message
        .strip_prefix("V:")
        .or_else(|| message.strip_prefix("v:"))
        .ok_or_else(|| VectorParseError::MissingTag(message.to_string()))?;

    let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
    let (vy, vx, w) = match fields.as_slice() {
        [_] => return Err(VectorParseError::MissingComma(message.to_string())),
        [vy, vx] => (*vy, *vx, None),
        [vy, vx, w] => (*vy, *vx, Some(*w)),
        _ => return Err(VectorParseError::TooManyFields(message.to_string())),
    };

    Ok(VectorPayload {
        vy: parse_component(vy)?,
        vx: parse_component(vx)?,
        w: w.map(parse_component).transpose()?.unwrap_or(0.0),
    })
}

fn parse_component(field: &str) -> Result<f32, VectorParseError> {
    match field.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(clamp_unit(v)),
        _ => Err(VectorParseError::NotANumber {
            field: field.to_string(),
        }),
    }
}

/// Command source fed by vector messages from the remote channel
#[derive(Debug, Clone, Default)]
pub struct VectorChannel {
    current: MovementCommand,
    last_message: Option<Duration>,
    connected: bool,
}

impl VectorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one text message. Malformed messages are dropped and leave the
    /// current command untouched. Returns whether the message was accepted.
    pub fn on_message(&mut self, text: &str, now: Duration) -> bool {
        self.last_message = Some(now);
        match parse_vector_message(text) {
            Ok(v) => {
                debug!("Vector received -> vy:{} vx:{} w:{}", v.vy, v.vx, v.w);
                self.current = MovementCommand::vector(v.vy, v.vx, v.w, now);
                true
            }
            Err(e) => {
                warn!("Dropping vector message: {}", e);
                false
            }
        }
    }
}

impl CommandSource for VectorChannel {
    fn name(&self) -> &'static str {
        "Remote vector"
    }

    fn tick(&mut self, now: Duration) {
        let live = self
            .last_message
            .is_some_and(|t| now.saturating_sub(t) < LINK_TIMEOUT);
        if live != self.connected {
            if live {
                info!("Vector channel connected");
            } else {
                info!("Vector channel silent, marking disconnected");
            }
            self.connected = live;
        }
    }

    fn command(&self) -> MovementCommand {
        self.current
    }

    fn is_active(&self) -> bool {
        self.connected
    }

    fn reset(&mut self, now: Duration) {
        self.current = MovementCommand::stopped(now);
    }
}
