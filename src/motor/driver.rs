// Mecanum drive system
//
// Owns the four wheels and the command watchdog. This is the only writer of
// wheel state: every drive value goes through `set_wheel_value`.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::bridge::{BridgeError, Direction, MotorOutput, WheelChannel};
use super::kinematics::{
    MAX_DRIVE, WheelValues, body_to_wheels, discrete_to_wheels, is_near_zero,
};
use crate::clock::Clock;
use crate::config::*;
use crate::messages::{MotionMode, MoveCommand, MovementCommand, clamp_unit};
use crate::watchdog::{Watchdog, WatchdogState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Letter used on the wiring diagram
    pub fn label(self) -> &'static str {
        match self {
            Wheel::FrontLeft => "A",
            Wheel::FrontRight => "C",
            Wheel::RearLeft => "B",
            Wheel::RearRight => "D",
        }
    }
}

/// One wheel: its wiring, polarity and last commanded value
#[derive(Debug, Clone)]
pub struct WheelSpec {
    pub wheel: Wheel,
    pub channel: WheelChannel,
    /// Motor is wired mirrored; invert the sign sent to the bridge
    pub reversed: bool,
    current: i16,
}

impl WheelSpec {
    pub fn new(wheel: Wheel, channel: WheelChannel, reversed: bool) -> Self {
        Self {
            wheel,
            channel,
            reversed,
            current: 0,
        }
    }

    /// Last value commanded by the caller, before polarity reversal
    pub fn current(&self) -> i16 {
        self.current
    }
}

/// Wiring of the stock chassis, indexed like `Wheel::ALL`
pub fn default_wheels() -> [WheelSpec; 4] {
    let channel = |pwm_pin, dir1_pin, dir2_pin, pwm_channel| WheelChannel {
        pwm_pin,
        dir1_pin,
        dir2_pin,
        pwm_channel,
    };
    [
        WheelSpec::new(
            Wheel::FrontLeft,
            channel(MOTOR_A_PWM_PIN, MOTOR_A_DIR1_PIN, MOTOR_A_DIR2_PIN, 0),
            false,
        ),
        WheelSpec::new(
            Wheel::FrontRight,
            channel(MOTOR_C_PWM_PIN, MOTOR_C_DIR1_PIN, MOTOR_C_DIR2_PIN, 1),
            false,
        ),
        WheelSpec::new(
            Wheel::RearLeft,
            channel(MOTOR_B_PWM_PIN, MOTOR_B_DIR1_PIN, MOTOR_B_DIR2_PIN, 2),
            false,
        ),
        WheelSpec::new(
            Wheel::RearRight,
            channel(MOTOR_D_PWM_PIN, MOTOR_D_DIR1_PIN, MOTOR_D_DIR2_PIN, 3),
            false,
        ),
    ]
}

/// High-level drive for the mecanum base
pub struct DriveSystem<O: MotorOutput, C: Clock> {
    output: O,
    clock: C,
    wheels: [WheelSpec; 4],
    initialized: bool,
    watchdog: Watchdog,
}

impl<O: MotorOutput, C: Clock> DriveSystem<O, C> {
    pub fn new(output: O, clock: C) -> Self {
        Self::with_wheels(output, clock, default_wheels())
    }

    /// Create with custom wiring. `wheels` must be ordered like `Wheel::ALL`.
    pub fn with_wheels(output: O, clock: C, wheels: [WheelSpec; 4]) -> Self {
        debug_assert!(wheels.iter().zip(Wheel::ALL).all(|(s, w)| s.wheel == w));
        Self {
            output,
            clock,
            wheels,
            initialized: false,
            watchdog: Watchdog::new(),
        }
    }

    /// Set up every wheel channel and leave the base stopped.
    ///
    /// On failure the system stays uninitialized and every actuation call
    /// is a no-op.
    pub fn begin(&mut self) -> Result<(), BridgeError> {
        info!("Initializing motors...");

        for spec in &self.wheels {
            if let Err(e) = self.output.setup(&spec.channel) {
                warn!("Motor {} setup failed: {}", spec.wheel.label(), e);
                return Err(e);
            }
        }

        self.initialized = true;
        self.zero_wheels();
        self.watchdog.halt(self.clock.now());

        info!("Motors initialized successfully");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Drive one wheel. `value` is clamped to [-255, 255].
    pub fn set_wheel_value(&mut self, wheel: Wheel, value: i32) {
        if !self.initialized {
            return;
        }

        let spec = &mut self.wheels[wheel.index()];
        let value = value.clamp(-(MAX_DRIVE as i32), MAX_DRIVE as i32) as i16;
        spec.current = value;

        let applied = if spec.reversed { -value } else { value };
        let direction = match applied {
            v if v > 0 => Direction::Forward,
            v if v < 0 => Direction::Reverse,
            _ => Direction::Coast,
        };
        let duty = applied.unsigned_abs() as u8;

        if let Err(e) = self.output.write(&spec.channel, direction, duty) {
            warn!("Motor {} write failed: {}", wheel.label(), e);
        }
    }

    /// Send one value to each wheel
    pub fn apply_wheels(&mut self, values: WheelValues) {
        self.set_wheel_value(Wheel::FrontLeft, values.front_left as i32);
        self.set_wheel_value(Wheel::FrontRight, values.front_right as i32);
        self.set_wheel_value(Wheel::RearLeft, values.rear_left as i32);
        self.set_wheel_value(Wheel::RearRight, values.rear_right as i32);
    }

    /// Stop all motors immediately. Counts as an explicit stop, so the
    /// watchdog goes HALTED and will not fire again.
    pub fn stop_all_motors(&mut self) {
        if !self.initialized {
            return;
        }
        self.zero_wheels();
        self.watchdog.halt(self.clock.now());
    }

    fn zero_wheels(&mut self) {
        for wheel in Wheel::ALL {
            self.set_wheel_value(wheel, 0);
        }
    }

    /// Execute one of the discrete movements
    pub fn apply_discrete(&mut self, command: MoveCommand, speed: u8) {
        if !self.initialized {
            return;
        }

        let now = self.clock.now();
        let wheels = discrete_to_wheels(command, speed);
        debug!("Discrete {:?} @ {} -> {:?}", command, speed, wheels);
        self.apply_wheels(wheels);

        if command == MoveCommand::Stop {
            self.watchdog.halt(now);
        } else {
            self.watchdog.engage(now);
        }
    }

    /// Execute a planar vector without rotation
    pub fn apply_vector(&mut self, vy: f32, vx: f32) {
        self.apply_vector_with_rotation(vy, vx, 0.0);
    }

    /// Execute a planar vector plus rotation term, all in [-1, 1]
    pub fn apply_vector_with_rotation(&mut self, vy: f32, vx: f32, w: f32) {
        if !self.initialized {
            return;
        }

        let now = self.clock.now();
        let (vy, vx, w) = (clamp_unit(vy), clamp_unit(vx), clamp_unit(w));

        if is_near_zero(vy) && is_near_zero(vx) && is_near_zero(w) {
            self.stop_all_motors();
            return;
        }

        let wheels = body_to_wheels(vy, vx, w);
        debug!("Vector vy={} vx={} w={} -> {:?}", vy, vx, w, wheels);
        self.apply_wheels(wheels);
        self.watchdog.engage(now);
    }

    /// Dispatch a canonical command to the matching mapper
    pub fn apply_command(&mut self, command: &MovementCommand) {
        match command.mode {
            MotionMode::Discrete(cmd) => self.apply_discrete(cmd, command.speed),
            MotionMode::Vector { vy, vx, w } => self.apply_vector_with_rotation(vy, vx, w),
        }
    }

    /// Poll the watchdog; stops the base once when commands went stale.
    /// Returns true when it stopped the motors.
    pub fn check_timeout(&mut self, timeout: Duration) -> bool {
        if !self.initialized {
            return false;
        }

        if self.watchdog.poll(self.clock.now(), timeout) {
            self.zero_wheels();
            return true;
        }
        false
    }

    /// Caller-facing wheel values, independent of polarity wiring
    pub fn wheel_values(&self) -> WheelValues {
        let [a, c, b, d] = self.wheels.each_ref().map(|w| w.current);
        WheelValues::new(a, c, b, d)
    }

    pub fn wheel(&self, wheel: Wheel) -> &WheelSpec {
        &self.wheels[wheel.index()]
    }

    pub fn watchdog_state(&self) -> WatchdogState {
        self.watchdog.state()
    }

    pub fn last_command_time(&self) -> Duration {
        self.watchdog.last_command_time()
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<O: MotorOutput, C: Clock> Drop for DriveSystem<O, C> {
    fn drop(&mut self) {
        // Try to stop motors when the drive is dropped (safety measure)
        if self.initialized {
            info!("Stopping all motors");
            self.zero_wheels();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::motor::bridge::{ChannelState, SimulatedBridge};

    const TIMEOUT: Duration = CMD_TIMEOUT;

    fn drive() -> (DriveSystem<SimulatedBridge, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut drive = DriveSystem::new(SimulatedBridge::new(), clock.clone());
        drive.begin().unwrap();
        (drive, clock)
    }

    fn channel_of(drive: &DriveSystem<SimulatedBridge, ManualClock>, wheel: Wheel) -> ChannelState {
        let ch = drive.wheel(wheel).channel.pwm_channel;
        drive.output().channel(ch).unwrap()
    }

    #[test]
    fn test_begin_leaves_everything_stopped() {
        let (drive, _) = drive();
        assert!(drive.is_initialized());
        assert!(drive.wheel_values().is_zero());
        for wheel in Wheel::ALL {
            assert_eq!(channel_of(&drive, wheel), ChannelState::default());
        }
    }

    #[test]
    fn test_failed_begin_makes_actuation_noop() {
        let mut drive = DriveSystem::new(SimulatedBridge::failing(), ManualClock::new());
        assert!(drive.begin().is_err());
        assert!(!drive.is_initialized());

        drive.apply_discrete(MoveCommand::Forward, 200);
        drive.apply_vector(1.0, 0.0);
        drive.set_wheel_value(Wheel::FrontLeft, 100);
        assert!(!drive.check_timeout(TIMEOUT));
        assert!(drive.wheel_values().is_zero());
        assert_eq!(drive.output().writes(), 0);
    }

    #[test]
    fn test_set_wheel_value_clamps() {
        let (mut drive, _) = drive();
        drive.set_wheel_value(Wheel::FrontLeft, 10_000);
        drive.set_wheel_value(Wheel::RearRight, -300);
        assert_eq!(drive.wheel(Wheel::FrontLeft).current(), 255);
        assert_eq!(drive.wheel(Wheel::RearRight).current(), -255);
        assert_eq!(channel_of(&drive, Wheel::FrontLeft).duty, 255);
        assert_eq!(channel_of(&drive, Wheel::RearRight).duty, 255);
    }

    #[test]
    fn test_direction_pins_follow_sign() {
        let (mut drive, _) = drive();
        drive.set_wheel_value(Wheel::FrontLeft, 120);
        drive.set_wheel_value(Wheel::FrontRight, -80);
        drive.set_wheel_value(Wheel::RearLeft, 0);

        assert_eq!(
            channel_of(&drive, Wheel::FrontLeft),
            ChannelState { dir1: true, dir2: false, duty: 120 }
        );
        assert_eq!(
            channel_of(&drive, Wheel::FrontRight),
            ChannelState { dir1: false, dir2: true, duty: 80 }
        );
        assert_eq!(channel_of(&drive, Wheel::RearLeft), ChannelState::default());
    }

    #[test]
    fn test_reversed_wheel_inverts_output_not_status() {
        let clock = ManualClock::new();
        let mut wheels = default_wheels();
        wheels[Wheel::RearLeft.index()].reversed = true;
        let mut drive = DriveSystem::with_wheels(SimulatedBridge::new(), clock, wheels);
        drive.begin().unwrap();

        drive.apply_discrete(MoveCommand::Forward, 150);
        assert_eq!(drive.wheel_values().as_array(), [150; 4]);
        assert_eq!(
            channel_of(&drive, Wheel::RearLeft),
            ChannelState { dir1: false, dir2: true, duty: 150 }
        );
        assert_eq!(
            channel_of(&drive, Wheel::RearRight),
            ChannelState { dir1: true, dir2: false, duty: 150 }
        );
    }

    #[test]
    fn test_rotate_left_scenario() {
        let (mut drive, _) = drive();
        drive.apply_discrete(MoveCommand::RotateLeft, 180);
        let w = drive.wheel_values();
        assert_eq!(
            (w.front_left, w.front_right, w.rear_left, w.rear_right),
            (-180, 180, -180, 180)
        );
        assert_eq!(drive.watchdog_state(), WatchdogState::Engaged);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut drive, _) = drive();
        drive.apply_discrete(MoveCommand::Right, 100);
        drive.apply_discrete(MoveCommand::Stop, 100);
        assert!(drive.wheel_values().is_zero());
        drive.apply_discrete(MoveCommand::Stop, 100);
        assert!(drive.wheel_values().is_zero());
        assert_eq!(drive.watchdog_state(), WatchdogState::Halted);

        drive.apply_vector(0.5, 0.5);
        drive.apply_vector(0.0, 0.00001);
        assert!(drive.wheel_values().is_zero());
        drive.apply_vector(0.0, 0.0);
        assert!(drive.wheel_values().is_zero());
    }

    #[test]
    fn test_vector_scenarios() {
        let (mut drive, _) = drive();
        drive.apply_vector(1.0, 0.0);
        assert_eq!(drive.wheel_values().as_array(), [255; 4]);

        drive.apply_vector(0.0, 1.0);
        assert_eq!(drive.wheel_values().as_array(), [255, -255, -255, 255]);
    }

    #[test]
    fn test_timeout_forces_single_stop() {
        let (mut drive, clock) = drive();
        clock.set_millis(0);
        drive.apply_discrete(MoveCommand::Forward, 200);

        clock.set_millis(400);
        assert!(!drive.check_timeout(TIMEOUT));
        assert_eq!(drive.wheel_values().as_array(), [200; 4]);

        clock.set_millis(600);
        assert!(drive.check_timeout(TIMEOUT));
        assert!(drive.wheel_values().is_zero());

        let writes = drive.output().writes();
        clock.set_millis(700);
        assert!(!drive.check_timeout(TIMEOUT));
        clock.set_millis(9_000);
        assert!(!drive.check_timeout(TIMEOUT));
        assert_eq!(drive.output().writes(), writes);
    }

    #[test]
    fn test_new_command_reengages_after_halt() {
        let (mut drive, clock) = drive();
        drive.apply_vector(0.3, 0.0);
        clock.set_millis(700);
        assert!(drive.check_timeout(TIMEOUT));

        drive.apply_vector(0.3, 0.0);
        assert_eq!(drive.watchdog_state(), WatchdogState::Engaged);
        assert_eq!(drive.last_command_time(), Duration::from_millis(700));
        clock.set_millis(1_100);
        assert!(!drive.check_timeout(TIMEOUT));
    }

    #[test]
    fn test_stop_all_motors_halts_watchdog() {
        let (mut drive, clock) = drive();
        clock.set_millis(0);
        drive.apply_discrete(MoveCommand::Forward, 200);
        assert_eq!(drive.watchdog_state(), WatchdogState::Engaged);

        clock.set_millis(100);
        drive.stop_all_motors();
        assert!(drive.wheel_values().is_zero());
        assert_eq!(drive.watchdog_state(), WatchdogState::Halted);
        assert_eq!(drive.last_command_time(), Duration::from_millis(100));

        let writes = drive.output().writes();
        clock.set_millis(700);
        assert!(!drive.check_timeout(TIMEOUT));
        assert_eq!(drive.output().writes(), writes);
    }

    #[test]
    fn test_drop_coasts_every_channel() {
        let bridge = SimulatedBridge::new();
        let mut drive = DriveSystem::new(bridge.clone(), ManualClock::new());
        drive.begin().unwrap();
        drive.apply_vector(0.4, 0.7);
        assert!(Wheel::ALL.iter().any(|&w| channel_of(&drive, w).duty > 0));
        let channels: Vec<u8> = Wheel::ALL
            .iter()
            .map(|&w| drive.wheel(w).channel.pwm_channel)
            .collect();

        drop(drive);
        for ch in channels {
            assert_eq!(bridge.channel(ch), Some(ChannelState::default()));
        }
    }

    #[test]
    fn test_drop_before_begin_writes_nothing() {
        let bridge = SimulatedBridge::new();
        drop(DriveSystem::new(bridge.clone(), ManualClock::new()));
        assert_eq!(bridge.writes(), 0);
    }

    #[test]
    fn test_apply_command_dispatches_by_mode() {
        let (mut drive, _) = drive();
        let t = Duration::ZERO;
        drive.apply_command(&MovementCommand::discrete(MoveCommand::ForwardLeft, 90, t));
        assert_eq!(drive.wheel_values().as_array(), [0, 90, 90, 0]);

        drive.apply_command(&MovementCommand::vector(-1.0, 0.0, 0.0, t));
        assert_eq!(drive.wheel_values().as_array(), [-255; 4]);
    }
}
