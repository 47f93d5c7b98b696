use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{info, warn};

use deconz_sensor::{PlatformConfig, SensorChange, SensorPlatform, Wait};
use deconz_stream::config::{DEFAULT_HOST, DEFAULT_PORT};
use deconz_stream::logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
use deconz_stream::{BridgeConfig, EventBridge, Transport};

/// How often the main loop checks for Ctrl-C and a closed connection
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// deCONZ presence monitor
///
/// Connects to a gateway's event stream, attaches one motion sensor per
/// `--sensor` and prints every presence update until Ctrl-C or until the
/// gateway closes the connection.
#[derive(Parser, Debug)]
#[command(name = "deconz-monitor")]
#[command(about = "Print presence changes streamed from a deCONZ gateway")]
#[command(version)]
pub struct Args {
    /// Gateway host
    #[arg(long, env = "DECONZ_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Gateway event port
    #[arg(short, long, env = "DECONZ_PORT", default_value = DEFAULT_PORT)]
    pub port: String,

    /// Framing of the event stream
    #[arg(long, value_enum, default_value_t = TransportArg::Websocket)]
    pub transport: TransportArg,

    /// Sensor to attach, as `ID=NAME` or just `ID`
    #[arg(short, long = "sensor", value_name = "ID[=NAME]", value_parser = parse_sensor, required = true)]
    pub sensors: Vec<(u32, String)>,

    /// Connect timeout in seconds
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// Show repeated updates that do not change a sensor's state
    #[arg(long)]
    pub show_repeats: bool,

    /// Verbose logging with thread names and source locations.
    /// Without it, `DECONZ_LOG_MODE` picks the mode when set
    #[arg(short = 'v', long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Websocket,
    Lines,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Websocket => Transport::WebSocket,
            TransportArg::Lines => Transport::Lines,
        }
    }
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout == 0 {
            return Err(anyhow::anyhow!("Connect timeout must be positive"));
        }
        Ok(())
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new()
            .with_host(self.host.clone())
            .with_port(self.port.clone())
            .with_transport(self.transport.into())
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
    }

    /// Later occurrences of an identifier win
    pub fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            sensors: self.sensors.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_sensor(value: &str) -> Result<(u32, String), String> {
    let (id, name) = match value.split_once('=') {
        Some((id, name)) => (id.trim(), name.trim()),
        None => (value.trim(), ""),
    };

    id.parse::<u32>()
        .map(|id| (id, name.to_string()))
        .map_err(|_| format!("sensor id must be a non-negative integer, got {:?}", id))
}

fn init_monitor_logging(debug: bool, env_mode: Option<&str>) -> Result<(), LoggingError> {
    match (debug, env_mode) {
        (true, _) => init_logging(LoggingMode::Debug),
        (false, Some(_)) => init_logging_from_env(),
        (false, None) => init_logging(LoggingMode::Development),
    }
}

fn print_change(change: &SensorChange) {
    println!(
        "{} {} ({}) {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        change.name,
        change.sensor_id,
        if change.is_on { "motion" } else { "clear" }
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    let env_mode = std::env::var("DECONZ_LOG_MODE").ok();
    init_monitor_logging(args.debug, env_mode.as_deref())
        .context("Failed to initialize logging")?;

    let config = args.bridge_config();
    let bridge = EventBridge::start(config)
        .with_context(|| format!("Failed to connect to gateway at {}:{}", args.host, args.port))?;
    info!("Listening on {}", bridge.target());

    let platform = SensorPlatform::setup(&bridge.registry(), &args.platform_config());
    for sensor in platform.sensors() {
        info!("Watching {} ({})", sensor.name(), sensor.id());
    }

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    let changes = platform.changes();
    loop {
        if stop_rx.try_recv().is_ok() {
            info!("Interrupted, shutting down");
            break;
        }
        if !bridge.is_running() {
            warn!("Gateway closed the event stream");
            break;
        }

        match changes.wait(POLL_INTERVAL) {
            Wait::Change(change) => {
                if args.show_repeats || change.is_change() {
                    print_change(&change);
                }
            }
            Wait::Timeout => {}
            Wait::Closed => {
                warn!("All sensors detached");
                break;
            }
        }
    }

    bridge.shutdown()?;
    for change in changes.drain() {
        if args.show_repeats || change.is_change() {
            print_change(&change);
        }
    }
    println!("{}", bridge.stats());
    drop(platform);

    Ok(())
}
