/**
 * ROV Bridge Binary
 *
 * Runs the topside bridge that:
 * 1. Finds the microcontroller's serial port and opens it
 * 2. Samples the gamepad every 10 ms
 * 3. Sends thruster and claw commands down the link
 * 4. Logs telemetry coming back up
 *
 * Usage: rov_bridge [--config FILE] [--port DEVICE] [--log-level LEVEL] [--json]
 */

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser};
use eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;

use rov_bridge::pubsub::{CONTROL_TOPIC, TELEMETRY_TOPIC};
use rov_bridge::rov::{InputSource, ScriptedInput};
use rov_bridge::uart::{LinkOptions, PortFilter, SerialLink};
use rov_bridge::{ControlChannel, ControlLoop, Publisher, RovConfig, Subscriber, TelemetryChannel, Topic};

const TELEMETRY_CAPACITY: usize = 256;
const CONTROL_CAPACITY: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "rov_bridge", version, about = "Topside ROV control bridge")]
struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial device to use instead of discovery
    #[arg(long, value_name = "DEVICE")]
    port: Option<String>,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .wrap_err_with(|| format!("invalid log level: {}", cli.log_level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true);
    let installed = if cli.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| eyre::eyre!("installing log subscriber: {e}"))
}

#[cfg(feature = "gamepad")]
fn input_source() -> Box<dyn InputSource> {
    match rov_bridge::rov::gamepad::GamepadInput::new() {
        Ok(pad) => Box::new(pad),
        Err(e) => {
            tracing::error!(error = %e, "gamepad backend unavailable, running without input");
            Box::new(ScriptedInput::absent())
        }
    }
}

#[cfg(not(feature = "gamepad"))]
fn input_source() -> Box<dyn InputSource> {
    tracing::warn!("built without gamepad support, sending neutral commands");
    Box::new(ScriptedInput::idle("dry-run"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let mut cfg = match &cli.config {
        Some(path) => RovConfig::load(path).wrap_err_with(|| format!("loading {}", path.display()))?,
        None => RovConfig::default(),
    };
    if cli.port.is_some() {
        cfg.serial.port = cli.port.clone();
    }

    let telemetry: Arc<TelemetryChannel> = Topic::shared(TELEMETRY_TOPIC, TELEMETRY_CAPACITY);
    let control: Arc<ControlChannel> = Topic::shared(CONTROL_TOPIC, CONTROL_CAPACITY);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)).wrap_err("installing Ctrl-C handler")?;
    }

    //telemetry consumer stands in for the display
    let consumer = {
        let sub = Subscriber::new(Arc::clone(&telemetry));
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("rov-telemetry".into())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Some(msg) = sub.recv_timeout(Duration::from_millis(100)) {
                        let fields = serde_json::Value::Object(msg.into_inner());
                        tracing::info!(telemetry = %fields, "telemetry");
                    }
                }
            })
            .wrap_err("spawning telemetry consumer")?
    };

    let filter = PortFilter::resolve(cfg.serial.port.as_deref(), cfg.serial.port_prefix.as_deref());
    let mut link = SerialLink::connect(&filter, LinkOptions::from(&cfg.serial), Publisher::new(Arc::clone(&telemetry)));

    let mut control_loop = ControlLoop::new(input_source(), &cfg, link.sender(), Publisher::new(control))
        .with_screenshot_hook(|| tracing::info!("screenshot requested"));
    control_loop.run(&stop);

    link.shutdown();
    if consumer.join().is_err() {
        tracing::warn!("telemetry consumer panicked");
    }
    Ok(())
}
