// Keyboard teleop over the vector channel: WASD move, Z/X rotate, R/F speed, Q quit
// Publishes "V:vy,vx,w" text at ~50Hz.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use mecanum_zenoh_runtime::config::TOPIC_CMD_VECTOR;

const SCALES: [f32; 3] = [0.3, 0.6, 1.0];
const INPUT_TIMEOUT_MS: u64 = 100; // Reset vector after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_VECTOR).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, Q=quit");
    print_scale(0);

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut scale_idx: usize = 0;

    let mut vy = 0.0f32;
    let mut vx = 0.0f32;
    let mut w = 0.0f32;
    let mut last_movement_input = Instant::now();

    loop {
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let s = SCALES[scale_idx];

                match code {
                    KeyCode::Char('w') if pressed => {
                        vy = s;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        vy = -s;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        vx = -s;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        vx = s;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('z') if pressed => {
                        w = s;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        w = -s;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('r') if pressed => {
                        scale_idx = (scale_idx + 1).min(2);
                        print_scale(scale_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        scale_idx = scale_idx.saturating_sub(1);
                        print_scale(scale_idx);
                    }
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,
                    _ => {}
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            vy = 0.0;
            vx = 0.0;
            w = 0.0;
        }

        publisher.put(format!("V:{:.3},{:.3},{:.3}", vy, vx, w)).await?;
    }

    Ok(())
}

fn print_scale(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Scale: {} ({})", label, SCALES[idx]);
}
