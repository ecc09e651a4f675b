// 100 Hz control loop
// Each tick: drain incoming messages into the active source, apply the
// source's command if it changed, poll the watchdog, publish wheel state and
// health. The watchdog runs every tick whether or not anything arrived.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{
    LOOP_HZ, MOTOR_BAUDRATE, MOTOR_ENABLED, STATUS_INTERVAL, TOPIC_CMD_GAMEPAD, TOPIC_CMD_VECTOR,
    TOPIC_HEALTH, TOPIC_RT_WHEELS,
};
use crate::input::{CommandSource, GamepadState, InputSource, SourceKind};
use crate::messages::RuntimeHealth;
use crate::motor::{DriveSystem, MotorOutput, SerialBridge, SimulatedBridge, WheelValues};
use crate::watchdog::WatchdogState;

/// Settings chosen at startup
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub port: String,
    pub simulate: bool,
    pub timeout: Duration,
    pub source: SourceKind,
}

pub struct Runtime<O: MotorOutput, C: Clock> {
    drive: DriveSystem<O, C>,
    source: InputSource,
    timeout: Duration,
    last_applied: Option<Duration>,
    last_status: Duration,
    health: RuntimeHealth,
}

impl<O: MotorOutput, C: Clock> Runtime<O, C> {
    pub fn new(drive: DriveSystem<O, C>, source: InputSource, timeout: Duration) -> Self {
        let health = if drive.is_initialized() {
            RuntimeHealth::CmdStale // Start stale until first cmd
        } else {
            RuntimeHealth::MotorsOffline
        };
        Self {
            drive,
            source,
            timeout,
            last_applied: None,
            last_status: Duration::ZERO,
            health,
        }
    }

    pub fn drive(&self) -> &DriveSystem<O, C> {
        &self.drive
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Text message from the vector topic
    pub fn on_vector_message(&mut self, text: &str) {
        let now = self.drive.clock().now();
        match &mut self.source {
            InputSource::Vector(channel) => {
                channel.on_message(text, now);
            }
            other => debug!("Ignoring vector message, source is {}", other.name()),
        }
    }

    /// Pad snapshot from the gamepad topic
    pub fn on_gamepad_state(&mut self, state: &GamepadState) {
        let now = self.drive.clock().now();
        match &mut self.source {
            InputSource::Gamepad(pad) => pad.update(state, now),
            other => debug!("Ignoring gamepad state, source is {}", other.name()),
        }
    }

    /// Key press from the terminal
    pub fn on_key(&mut self, key: char) {
        let now = self.drive.clock().now();
        if let InputSource::Keyboard(keys) = &mut self.source {
            keys.on_key(key, now);
        }
    }

    /// Run one control tick and return the wheel values now applied
    pub fn tick(&mut self) -> WheelValues {
        let now = self.drive.clock().now();

        // 1. Let the source expire stale input and track its link
        self.source.tick(now);

        // 2. Apply the latest command only if it is new
        let command = self.source.command();
        if self.last_applied != Some(command.timestamp) {
            self.last_applied = Some(command.timestamp);
            self.drive.apply_command(&command);
        }

        // 3. Watchdog. A stale command is dropped from the source as well, so
        // the base only moves again on fresh input.
        if self.drive.check_timeout(self.timeout) {
            self.source.reset(now);
            self.last_applied = Some(self.source.command().timestamp);
        }

        self.health = if !self.drive.is_initialized() {
            RuntimeHealth::MotorsOffline
        } else {
            match self.drive.watchdog_state() {
                WatchdogState::Engaged => RuntimeHealth::Ok,
                WatchdogState::Halted => RuntimeHealth::CmdStale,
            }
        };

        if now.saturating_sub(self.last_status) > STATUS_INTERVAL {
            self.last_status = now;
            info!("{}", self.status_line());
        }

        self.drive.wheel_values()
    }

    pub fn status_line(&self) -> String {
        let w = self.drive.wheel_values();
        format!(
            "Motors A:{} C:{} B:{} D:{} | {}: {} | {:?}",
            w.front_left,
            w.front_right,
            w.rear_left,
            w.rear_right,
            self.source.name(),
            if self.source.is_active() { "ON" } else { "OFF" },
            self.health
        )
    }
}

/// Leaves raw mode however the loop exits
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let clock = MonotonicClock::new();

    if options.simulate || !MOTOR_ENABLED {
        info!("Motor output is simulated");
        return run_with(SimulatedBridge::new(), clock, options).await;
    }

    info!("Opening motor bridge on {}", options.port);
    match SerialBridge::open(&options.port, MOTOR_BAUDRATE) {
        Ok(bridge) => run_with(bridge, clock, options).await,
        Err(e) => {
            // Keep serving health so the operator can see the fault
            error!("Motor bridge unavailable: {}", e);
            run_with(SimulatedBridge::failing(), clock, options).await
        }
    }
}

async fn run_with<O: MotorOutput>(
    output: O,
    clock: MonotonicClock,
    options: RuntimeOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut drive = DriveSystem::new(output, clock);
    if let Err(e) = drive.begin() {
        error!("Motor initialization failed, actuation disabled: {}", e);
    }

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_vector = session.declare_subscriber(TOPIC_CMD_VECTOR).await?;
    let sub_gamepad = session.declare_subscriber(TOPIC_CMD_GAMEPAD).await?;
    let pub_wheels = session.declare_publisher(TOPIC_RT_WHEELS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(drive, InputSource::new(options.source), options.timeout);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    let keyboard = runtime.source().kind() == SourceKind::Keyboard;
    let _raw_mode = if keyboard {
        info!("Keys: w/s/a/d move, q/e rotate, t/r/g/f diagonals, x stop, 1-4 +/- speed, Esc quit");
        Some(RawModeGuard::enable()?)
    } else {
        None
    };

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, source: {}",
        LOOP_HZ,
        options.timeout.as_millis(),
        runtime.source().name()
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_VECTOR, TOPIC_CMD_GAMEPAD);
    info!("Publishing to: {}, {}", TOPIC_RT_WHEELS, TOPIC_HEALTH);

    'control: loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break 'control;
            }
        }

        // 1. Drain all pending messages (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_vector.try_recv() {
            let payload = sample.payload().to_bytes();
            runtime.on_vector_message(&String::from_utf8_lossy(&payload));
        }
        while let Ok(Some(sample)) = sub_gamepad.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<GamepadState>(&payload) {
                Ok(state) => runtime.on_gamepad_state(&state),
                Err(e) => warn!("Failed to parse gamepad state: {}", e),
            }
        }
        if keyboard {
            while event::poll(Duration::ZERO)? {
                if let Event::Key(KeyEvent {
                    code,
                    kind,
                    modifiers,
                    ..
                }) = event::read()?
                {
                    if kind != KeyEventKind::Press {
                        continue;
                    }
                    match code {
                        KeyCode::Esc => break 'control,
                        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                            break 'control;
                        }
                        KeyCode::Char(c) => runtime.on_key(c),
                        _ => {}
                    }
                }
            }
        }

        // 2. Apply command + watchdog
        let wheels = runtime.tick();

        // 3. Publish wheel state
        let wheels_json = serde_json::to_string(&wheels)?;
        pub_wheels.put(wheels_json).await?;

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }

    info!("{}", runtime.status_line());
    Ok(())
}
