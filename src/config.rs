// Pins, speeds, timeouts, topics
use std::time::Duration;

// Wheel A: front-left (TB6612FNG #1)
pub const MOTOR_A_PWM_PIN: u8 = 14;
pub const MOTOR_A_DIR1_PIN: u8 = 27;
pub const MOTOR_A_DIR2_PIN: u8 = 26;

// Wheel C: front-right (TB6612FNG #1)
pub const MOTOR_C_PWM_PIN: u8 = 17;
pub const MOTOR_C_DIR1_PIN: u8 = 19;
pub const MOTOR_C_DIR2_PIN: u8 = 18;

// Wheel B: rear-left (TB6612FNG #2)
pub const MOTOR_B_PWM_PIN: u8 = 32;
pub const MOTOR_B_DIR1_PIN: u8 = 33;
pub const MOTOR_B_DIR2_PIN: u8 = 25;

// Wheel D: rear-right (TB6612FNG #2)
pub const MOTOR_D_PWM_PIN: u8 = 21;
pub const MOTOR_D_DIR1_PIN: u8 = 23;
pub const MOTOR_D_DIR2_PIN: u8 = 22;

// PWM output
pub const PWM_FREQUENCY: u32 = 20_000;
pub const PWM_RESOLUTION: u8 = 8;

// Drive magnitudes (0-255)
pub const DEFAULT_SPEED: u8 = 180;
pub const MAX_SPEED: u8 = 200;
pub const MIN_SPEED: u8 = 40;

// How much the optional rotation term of a vector message counts (0..1)
pub const ROTATION_SCALE: f32 = 0.6;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 100;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(500);

// Periodic status log
pub const STATUS_INTERVAL: Duration = Duration::from_secs(15);

// Zenoh topics
pub const TOPIC_CMD_VECTOR: &str = "mecanum/cmd/vector"; // "V:vy,vx" text
pub const TOPIC_CMD_GAMEPAD: &str = "mecanum/cmd/gamepad"; // GamepadState json
pub const TOPIC_RT_WHEELS: &str = "mecanum/rt/wheels"; // actuation
pub const TOPIC_HEALTH: &str = "mecanum/state/health"; // health status

// Serial port for the motor co-processor driving both TB6612FNG boards
pub const MOTOR_PORT: &str = "/dev/ttyUSB0";
pub const MOTOR_BAUDRATE: u32 = 115_200;

// Enable hardware motor control (set to false for simulation/testing)
pub const MOTOR_ENABLED: bool = true;
