//! CAN Stream Ingest
//!
//! Command-line service that reads the serial stream of a CAN bridge board
//! and ships decoded signals to InfluxDB. It uses the can-stream-decoder
//! library and adds:
//! - Serial port access
//! - Batched, retried writes to the time-series store
//! - Heartbeat logging and graceful shutdown on SIGINT/SIGTERM

use anyhow::{Context, Result};
use can_stream_decoder::FrameDecoder;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod buffer;
mod config;
mod heartbeat;
mod influx;
mod ingest;
mod point;
mod source;
mod writer;

#[cfg(test)]
mod testing;

use influx::{InfluxClient, TimeSeriesClient};
use ingest::{Ingestor, LoopSettings, ShutdownSignal};
use point::Point;
use source::{ByteSource, SerialSource};
use writer::TelemetryWriter;

/// CAN Stream Ingest - Decode serial CAN traffic into InfluxDB
#[derive(Parser, Debug)]
#[command(name = "can-stream-ingest")]
#[command(about = "Decode CAN frames from a serial bridge and write them to InfluxDB", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest frames from the serial port into InfluxDB
    Run(RunArgs),
    /// Print raw serial chunks as hex, for wiring checks
    Dump(DumpArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Serial port, overrides [serial] port
    #[arg(long, value_name = "PORT")]
    port: Option<String>,

    /// Baud rate, overrides [serial] baud_rate
    #[arg(long, value_name = "BAUD")]
    baud: Option<u32>,

    /// Path to DBC file(s) (can be repeated), overrides [dbc] files
    #[arg(long, value_name = "FILE")]
    dbc: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Serial port to read
    #[arg(long, value_name = "PORT")]
    port: String,

    /// Baud rate
    #[arg(long, value_name = "BAUD", default_value_t = 230_400)]
    baud: u32,

    /// Maximum bytes per read
    #[arg(long, value_name = "BYTES", default_value_t = 504)]
    chunk_size: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    log::info!("CAN Stream Ingest v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_stream_decoder::VERSION);

    match cli.command {
        Command::Run(args) => run_ingest(args),
        Command::Dump(args) => run_dump(args),
    }
}

/// Load configuration, connect everything, and ingest until shutdown
fn run_ingest(args: RunArgs) -> Result<()> {
    log::info!("Loading configuration from: {:?}", args.config);
    let mut config = config::load_config(&args.config)?;
    config.apply_overrides(args.port, args.baud, args.dbc);
    config.validate()?;

    let mut decoder = FrameDecoder::new();
    for dbc_path in &config.dbc.files {
        decoder
            .add_dbc(dbc_path)
            .with_context(|| format!("Failed to load DBC file {:?}", dbc_path))?;
    }
    let stats = decoder.database_stats();
    log::info!(
        "Signal database: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );

    let options = config.writer.write_options();
    let mut client = InfluxClient::new(&config.influx, options.clone())
        .context("Failed to create InfluxDB client")?;
    log::info!(
        "InfluxDB ready: {} org={} bucket={}",
        client.url(),
        config.influx.org,
        config.influx.bucket
    );

    let source = SerialSource::open(
        &config.serial.port,
        config.serial.baud_rate,
        Duration::from_millis(config.serial.timeout_ms),
    )?;
    let time_policy = config.writer.time_policy();
    log::info!(
        "Listening for CAN messages on {} @ {} (point time: {})",
        config.serial.port,
        config.serial.baud_rate,
        time_policy
    );

    check_store(&mut client);
    if config.influx.smoke_test {
        write_smoke_test(&mut client, &config.influx.smoke_test_host);
    }

    let shutdown = ShutdownSignal::install()?;
    let writer = TelemetryWriter::new(client, &options, time_policy);
    let ingestor = Ingestor::new(
        source,
        decoder,
        writer,
        shutdown,
        LoopSettings {
            chunk_size: config.serial.chunk_size,
            heartbeat_interval: config.writer.heartbeat_interval(),
        },
    );

    let stats = ingestor.run()?;
    log::info!(
        "Done: {} bytes in {} chunks, {} frames, {} points written",
        stats.bytes_read,
        stats.chunks_read,
        stats.frames,
        stats.writer.points_written
    );
    Ok(())
}

/// Startup health check; failure is logged, not fatal
fn check_store<C: TimeSeriesClient>(client: &mut C) {
    log::info!("Pinging InfluxDB...");
    match client.ping() {
        Ok(()) => log::info!("InfluxDB ping OK"),
        Err(e) => log::warn!("InfluxDB ping failed: {}", e),
    }
}

/// Write one `smoke_test` point straight through; failure is logged, not fatal
fn write_smoke_test<C: TimeSeriesClient>(client: &mut C, host: &str) {
    let timestamp_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let point = Point::new("smoke_test", timestamp_ns)
        .tag("host", host)
        .field("value", 1.0);

    match client.write(&[point]).and_then(|_| client.flush()) {
        Ok(()) => log::info!("Wrote smoke_test point (measurement=smoke_test)"),
        Err(e) => log::warn!("Smoke write failed: {}", e),
    }
}

/// Print every non-empty read as hex until interrupted
fn run_dump(args: DumpArgs) -> Result<()> {
    let mut port = SerialSource::open(&args.port, args.baud, Duration::from_millis(1000))?;
    let shutdown = ShutdownSignal::install()?;
    log::info!("Dumping {} @ {}", args.port, args.baud);

    while !shutdown.is_requested() {
        let chunk = port
            .poll(args.chunk_size)
            .with_context(|| format!("Reading {} failed", args.port))?;
        if !chunk.is_empty() {
            println!("{}", source::hex_dump(&chunk));
        }
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
