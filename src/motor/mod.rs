// Motor control module for the mecanum base
//
// Provides:
// - Mecanum inverse kinematics (discrete movements and planar vectors -> wheel values)
// - H-bridge output over the motor co-processor link (plus a simulated bridge)
// - High-level drive system with per-wheel polarity and the command watchdog

pub mod bridge;
mod driver;
pub mod kinematics;

pub use bridge::{BridgeError, Direction, MotorOutput, SerialBridge, SimulatedBridge, WheelChannel};
pub use driver::{DriveSystem, Wheel, WheelSpec, default_wheels};
pub use kinematics::{WheelValues, body_to_wheels, discrete_to_wheels, vector_to_wheels};
