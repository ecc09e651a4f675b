// H-bridge output for the TB6612FNG motor drivers
//
// The wheels are driven by a motor co-processor that owns the GPIO and PWM
// peripherals. We talk to it over serial with small framed packets:
// [0xFF, 0xFF, Channel, Length, Instruction, Params..., Checksum]

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serialport::{self, SerialPort};
use tracing::debug;

use crate::config::{PWM_FREQUENCY, PWM_RESOLUTION};

pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set understood by the co-processor
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Setup = 0x01,
    Drive = 0x03,
}

/// Direction pin state for one H-bridge channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Forward,
    Reverse,
    /// Both direction inputs low
    #[default]
    Coast,
}

impl Direction {
    /// Levels for (dir1, dir2)
    pub fn pin_levels(self) -> (bool, bool) {
        match self {
            Direction::Forward => (true, false),
            Direction::Reverse => (false, true),
            Direction::Coast => (false, false),
        }
    }
}

/// Pins and PWM channel wired to one wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelChannel {
    pub pwm_pin: u8,
    pub dir1_pin: u8,
    pub dir2_pin: u8,
    pub pwm_channel: u8,
}

/// Error types for motor output
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PWM channel {channel} was never set up")]
    NotConfigured { channel: u8 },
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Anything that can set direction pins and PWM duty for a wheel channel
pub trait MotorOutput {
    /// Configure pins and PWM for a channel and leave it coasting at zero duty
    fn setup(&mut self, channel: &WheelChannel) -> Result<()>;

    fn write(&mut self, channel: &WheelChannel, direction: Direction, duty: u8) -> Result<()>;
}

/// Serial link to the motor co-processor
pub struct SerialBridge {
    port: Box<dyn SerialPort>,
}

impl SerialBridge {
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Ones' complement of the byte sum of everything after the header
    fn checksum(body: &[u8]) -> u8 {
        !body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
    }

    /// Frame one instruction for a PWM channel. The length byte counts the
    /// instruction, its params and the trailing checksum.
    fn frame(pwm_channel: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let mut frame = HEADER.to_vec();
        frame.extend_from_slice(&[pwm_channel, params.len() as u8 + 2, instruction as u8]);
        frame.extend_from_slice(params);
        frame.push(Self::checksum(&frame[HEADER.len()..]));
        frame
    }

    fn setup_params(channel: &WheelChannel) -> Vec<u8> {
        let mut params = vec![channel.pwm_pin, channel.dir1_pin, channel.dir2_pin];
        params.extend_from_slice(&PWM_FREQUENCY.to_le_bytes());
        params.push(PWM_RESOLUTION);
        params
    }

    fn drive_params(direction: Direction, duty: u8) -> [u8; 2] {
        let (dir1, dir2) = direction.pin_levels();
        [(dir1 as u8) | ((dir2 as u8) << 1), duty]
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()?;
        Ok(())
    }
}

impl MotorOutput for SerialBridge {
    fn setup(&mut self, channel: &WheelChannel) -> Result<()> {
        let frame = Self::frame(channel.pwm_channel, Instruction::Setup, &Self::setup_params(channel));
        debug!("Setup channel {}: {:?}", channel.pwm_channel, channel);
        self.send(&frame)?;
        self.write(channel, Direction::Coast, 0)
    }

    fn write(&mut self, channel: &WheelChannel, direction: Direction, duty: u8) -> Result<()> {
        let frame = Self::frame(
            channel.pwm_channel,
            Instruction::Drive,
            &Self::drive_params(direction, duty),
        );
        self.send(&frame)
    }
}

/// Recorded state of one simulated channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub dir1: bool,
    pub dir2: bool,
    pub duty: u8,
}

#[derive(Debug, Default)]
struct SimulatedState {
    channels: BTreeMap<u8, ChannelState>,
    writes: usize,
}

/// In-memory stand-in for the co-processor.
///
/// Clones share the same recorded state, so a test can keep a handle after
/// handing the bridge to a drive.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBridge {
    state: Arc<Mutex<SimulatedState>>,
    fail_setup: bool,
}

impl SimulatedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bridge whose setup always fails, like an unplugged board
    pub fn failing() -> Self {
        Self {
            fail_setup: true,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn channel(&self, pwm_channel: u8) -> Option<ChannelState> {
        self.state().channels.get(&pwm_channel).copied()
    }

    /// Number of drive writes since construction (setup not counted)
    pub fn writes(&self) -> usize {
        self.state().writes
    }
}

impl MotorOutput for SimulatedBridge {
    fn setup(&mut self, channel: &WheelChannel) -> Result<()> {
        if self.fail_setup {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "simulated bridge offline",
            )));
        }
        self.state()
            .channels
            .insert(channel.pwm_channel, ChannelState::default());
        Ok(())
    }

    fn write(&mut self, channel: &WheelChannel, direction: Direction, duty: u8) -> Result<()> {
        let mut sim = self.state();
        let state = sim
            .channels
            .get_mut(&channel.pwm_channel)
            .ok_or(BridgeError::NotConfigured {
                channel: channel.pwm_channel,
            })?;
        let (dir1, dir2) = direction.pin_levels();
        *state = ChannelState { dir1, dir2, duty };
        sim.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CH: WheelChannel = WheelChannel {
        pwm_pin: 14,
        dir1_pin: 27,
        dir2_pin: 26,
        pwm_channel: 0,
    };

    #[test]
    fn test_forward_drive_frame() {
        // Channel 0 forward at duty 200
        let frame = SerialBridge::frame(
            0,
            Instruction::Drive,
            &SerialBridge::drive_params(Direction::Forward, 200),
        );
        // ~(0 + 4 + 3 + 1 + 200) = ~208 = 47
        assert_eq!(frame, vec![0xFF, 0xFF, 0, 4, 0x03, 0b01, 200, 47]);
    }

    #[test]
    fn test_reverse_drive_frame() {
        let frame = SerialBridge::frame(
            2,
            Instruction::Drive,
            &SerialBridge::drive_params(Direction::Reverse, 90),
        );
        assert_eq!(&frame[2..7], &[2, 4, 0x03, 0b10, 90]);
        assert_eq!(frame[7], SerialBridge::checksum(&frame[2..7]));
    }

    #[test]
    fn test_checksum_wraps_past_255() {
        // 0xF0 + 0x20 = 0x110, low byte 0x10
        assert_eq!(SerialBridge::checksum(&[0xF0, 0x20]), !0x10);
    }

    #[test]
    fn test_setup_params_carry_pwm_config() {
        let params = SerialBridge::setup_params(&CH);
        assert_eq!(&params[..3], &[14, 27, 26]);
        assert_eq!(&params[3..7], &PWM_FREQUENCY.to_le_bytes());
        assert_eq!(params[7], PWM_RESOLUTION);
    }

    #[test]
    fn test_simulated_write_requires_setup() {
        let mut bridge = SimulatedBridge::new();
        assert!(matches!(
            bridge.write(&CH, Direction::Forward, 10),
            Err(BridgeError::NotConfigured { channel: 0 })
        ));

        bridge.setup(&CH).unwrap();
        bridge.write(&CH, Direction::Forward, 10).unwrap();
        assert_eq!(
            bridge.channel(0),
            Some(ChannelState {
                dir1: true,
                dir2: false,
                duty: 10
            })
        );
        assert_eq!(bridge.writes(), 1);
    }

    #[test]
    fn test_clones_share_recorded_state() {
        let handle = SimulatedBridge::new();
        let mut bridge = handle.clone();
        bridge.setup(&CH).unwrap();
        bridge.write(&CH, Direction::Reverse, 33).unwrap();
        drop(bridge);
        assert_eq!(handle.channel(0).map(|c| c.duty), Some(33));
        assert_eq!(handle.writes(), 1);
    }

    #[test]
    fn test_failing_bridge_rejects_setup() {
        let mut bridge = SimulatedBridge::failing();
        assert!(bridge.setup(&CH).is_err());
    }
}
