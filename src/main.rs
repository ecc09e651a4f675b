use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mecanum_zenoh_runtime::config::{CMD_TIMEOUT, MOTOR_PORT};
use mecanum_zenoh_runtime::input::SourceKind;
use mecanum_zenoh_runtime::runtime::{self, RuntimeOptions};

/// Mecanum base runtime: command sources in, wheel drive out
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port of the motor co-processor
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,

    /// Do not touch hardware, drive a simulated bridge
    #[arg(long)]
    simulate: bool,

    /// Stop the base when no new command arrives for this long
    #[arg(long, default_value_t = CMD_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Which command source steers the base
    #[arg(long, value_enum, default_value_t = SourceKind::Vector)]
    source: SourceKind,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let options = RuntimeOptions {
        port: args.port,
        simulate: args.simulate,
        timeout: Duration::from_millis(args.timeout_ms),
        source: args.source,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
