// Gamepad bridge smoke test: plays a short button script onto the gamepad topic
//
// Usage: cargo run --example gamepad_publisher
// Run the runtime with `--source gamepad --simulate` and watch mecanum/rt/wheels.

use std::time::Duration;

use tracing::info;

use mecanum_zenoh_runtime::config::TOPIC_CMD_GAMEPAD;
use mecanum_zenoh_runtime::input::GamepadState;

const FRAME: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_GAMEPAD).await?;

    let script = [
        ("Forward", GamepadState { up: true, ..Default::default() }),
        ("Forward-left", GamepadState { up: true, left: true, ..Default::default() }),
        ("Strafe right", GamepadState { right: true, ..Default::default() }),
        ("Rotate left", GamepadState { square: true, ..Default::default() }),
        ("Release", GamepadState::default()),
    ];

    for (label, state) in script {
        info!("{}", label);
        let json = serde_json::to_string(&state)?;
        // Hold for one second
        for _ in 0..20 {
            publisher.put(json.clone()).await?;
            tokio::time::sleep(FRAME).await;
        }
    }

    info!("Done; the runtime should now report cmd_stale");
    Ok(())
}
