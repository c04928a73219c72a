//! `digimesh`: program a DigiMesh module and print what it hears.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use digimesh_api::{Address64, ReadOutcome};
use digimesh_driver::telemetry::describe_metrics;
use digimesh_driver::{
    DriverResult, MeshModule, ModuleConfig, ModuleEvent, NeighborTarget, ReadLoop,
    DEFAULT_LINK_TEST_ITERATIONS, DEFAULT_LINK_TEST_PAYLOAD,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port (first available port when omitted)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate the module should run at
    #[arg(short, long)]
    baud: Option<u32>,

    /// Network id, in hex
    #[arg(long, value_parser = parse_hex_u16)]
    network_id: Option<u16>,

    /// API mode: 0 transparent, 1 API, 2 API with escaping
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    api_mode: Option<u8>,

    /// Node type: 0 router, 2 end point
    #[arg(long)]
    node_type: Option<u8>,

    /// Directory for the raw frame log
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Do not write a raw frame log
    #[arg(long)]
    no_raw_log: bool,

    /// Run network discovery after startup
    #[arg(long)]
    discover: bool,

    /// Ask this module for its neighbors after startup
    #[arg(long)]
    neighbors: bool,

    /// Broadcast a text message after startup
    #[arg(long)]
    broadcast: Option<String>,

    /// Trace the route to a node, given as 16 hex characters
    #[arg(long, value_parser = parse_address)]
    trace: Option<Address64>,

    /// Run a link quality test on every hop reported by a trace route
    #[arg(long)]
    link_test: bool,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("'{}': {}", s, e))
}

fn parse_address(s: &str) -> Result<Address64, String> {
    if s.len() != 16 {
        return Err(format!("'{}' must be 16 hex characters", s));
    }
    Address64::parse(&s[..8], &s[8..]).map_err(|e| e.to_string())
}

impl Args {
    fn load_config(&self) -> DriverResult<ModuleConfig> {
        let mut config = match &self.config {
            Some(path) => ModuleConfig::from_file(path)?,
            None => ModuleConfig::default(),
        };
        if let Some(port) = &self.port {
            config.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if let Some(network_id) = self.network_id {
            config.network_id = network_id;
        }
        if let Some(api_mode) = self.api_mode {
            config.api_mode = api_mode;
        }
        if let Some(node_type) = self.node_type {
            config.node_type = node_type;
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if self.no_raw_log {
            config.log_dir = None;
        }
        Ok(config)
    }
}

fn handle_outcome(module: &MeshModule, outcome: ReadOutcome, link_test: bool) {
    let batch = match outcome {
        ReadOutcome::Transparent(bytes) => {
            println!("{}", String::from_utf8_lossy(&bytes));
            return;
        }
        ReadOutcome::Frames(batch) => batch,
    };

    for event in batch.frames.iter().filter_map(ModuleEvent::from_frame) {
        println!("{}", event);
        if let ModuleEvent::RouteHop {
            responder,
            receiver,
        } = event
        {
            if link_test {
                let result = module.link_quality_test(
                    &responder,
                    &receiver,
                    DEFAULT_LINK_TEST_PAYLOAD,
                    DEFAULT_LINK_TEST_ITERATIONS,
                );
                if let Err(e) = result {
                    warn!("link test {} -> {} failed: {}", responder, receiver, e);
                }
            }
        }
    }
}

fn run(args: Args) -> DriverResult<()> {
    let config = args.load_config()?;
    let poll_interval = config.poll_interval();

    let module = Arc::new(MeshModule::open(config)?);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst)) {
        warn!("could not install Ctrl-C handler: {}", e);
    }

    let (reader, outcomes) = ReadLoop::spawn(module.clone(), poll_interval);

    if args.discover {
        module.network_discover()?;
    }
    if args.neighbors {
        module.find_neighbors(NeighborTarget::Local)?;
    }
    if let Some(text) = &args.broadcast {
        module.broadcast_data(text.as_bytes())?;
    }
    if let Some(destination) = &args.trace {
        module.trace_route(destination)?;
    }

    info!("listening, press Ctrl-C to stop");
    while running.load(Ordering::SeqCst) {
        match outcomes.recv_timeout(Duration::from_millis(500)) {
            Ok(outcome) => handle_outcome(&module, outcome, args.link_test),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    reader.stop();
    info!("stopped");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    describe_metrics();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_unreachable() => {
            error!("module unreachable: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
