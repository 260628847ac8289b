//! inkstrip: colorize a webtoon chapter slice by slice.
//!
//! Reads a directory of indexed slice images, joins them into one strip,
//! cuts the strip at dark divider bands, sends each artwork segment to a
//! colorization service, restores structural black, and writes output
//! slices with the original slice heights and naming.
//!
//! # Usage
//!
//! ```text
//! inkstrip [OPTIONS] <INPUT_DIR> <OUTPUT_DIR>
//! ```

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use inkstrip_io::{DebugDump, HttpColorizer, load_memory, load_slices, save_memory, write_slices};
use inkstrip_pipeline::StripConfig;
use inkstrip_run::{
    ColorMemory, Colorizer, DEFAULT_INSTRUCTIONS, Passthrough, RetryConfig, RunConfig, RunOutput,
    Runner,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Segment, colorize, and reassemble a webtoon strip.
#[derive(Parser)]
#[command(name = "inkstrip", version)]
struct Cli {
    /// Directory of input slices named `prefix + digits + extension`.
    input_dir: PathBuf,

    /// Directory for output slices.
    output_dir: PathBuf,

    /// Every channel below this counts as dark.
    #[arg(long, default_value_t = StripConfig::DEFAULT_DARK_THRESHOLD)]
    dark_threshold: u8,

    /// Minimum height of a dark band to cut at.
    #[arg(long, default_value_t = StripConfig::DEFAULT_MIN_GAP_HEIGHT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    min_gap: u32,

    /// Fraction of non-dark pixels a safe row may contain (0.0-1.0).
    #[arg(long, default_value_t = StripConfig::DEFAULT_EDGE_TOLERANCE)]
    edge_tolerance: f64,

    /// Segments shorter than this are merged into a neighbor.
    #[arg(long, default_value_t = StripConfig::DEFAULT_MIN_SEGMENT_HEIGHT)]
    min_segment: u32,

    /// Resize output slices to this width.
    #[arg(long)]
    output_width: Option<u32>,

    /// Resize output slices to this height.
    #[arg(long)]
    output_height: Option<u32>,

    /// Full strip config as a JSON string.
    ///
    /// When provided, the individual tuning flags above are ignored.
    /// The JSON must be a valid `StripConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Colorizer attempts per segment, including the first.
    #[arg(long, default_value_t = RetryConfig::DEFAULT_MAX_ATTEMPTS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_attempts: u32,

    /// API key for the colorization service.
    #[arg(long, env = "INKSTRIP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Image-edit endpoint URL.
    #[arg(long, default_value = inkstrip_io::http::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Model name sent with each request.
    #[arg(long, default_value = inkstrip_io::http::DEFAULT_MODEL)]
    model: String,

    /// Base instructions for every segment.
    #[arg(long, default_value = DEFAULT_INSTRUCTIONS)]
    instructions: String,

    /// JSON file of learned colors, read at start and written at the end.
    #[arg(long)]
    learned_colors: Option<PathBuf>,

    /// Verbose logging and per-segment images under `<OUTPUT_DIR>/debug`.
    #[arg(long)]
    debug: bool,

    /// Print the run report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Skip the colorization service and pass canvases straight back.
    #[arg(long)]
    dry_run: bool,
}

/// Build a [`RunConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the strip config is parsed from it
/// and the individual tuning flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<RunConfig, String> {
    let strip = match cli.config_json {
        Some(ref json) => {
            serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
        }
        None => StripConfig {
            dark_threshold: cli.dark_threshold,
            min_gap_height: cli.min_gap,
            edge_tolerance: cli.edge_tolerance,
            min_segment_height: cli.min_segment,
            output_width: cli.output_width,
            output_height: cli.output_height,
            ..StripConfig::default()
        },
    };
    strip.validate().map_err(|e| e.to_string())?;

    Ok(RunConfig {
        strip,
        retry: RetryConfig {
            max_attempts: cli.max_attempts,
            ..RetryConfig::default()
        },
        instructions: cli.instructions.clone(),
    })
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "inkstrip=debug,inkstrip_pipeline=debug,inkstrip_run=debug,inkstrip_io=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(debug)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            tracing::error!("{msg}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;

    // Input errors are fatal before any processing starts.
    let set = load_slices(&cli.input_dir).map_err(|e| e.to_string())?;
    let http = if cli.dry_run {
        None
    } else {
        let key = cli.api_key.clone().unwrap_or_default();
        Some(HttpColorizer::new(&cli.endpoint, key, &cli.model).map_err(|e| e.to_string())?)
    };
    let memory = match cli.learned_colors {
        Some(ref path) => load_memory(path).map_err(|e| e.to_string())?,
        None => ColorMemory::default(),
    };
    let mut dump = if cli.debug {
        Some(DebugDump::create(cli.output_dir.join("debug")).map_err(|e| e.to_string())?)
    } else {
        None
    };

    let output = match http {
        Some(ref colorizer) => execute(&config, colorizer, &set.slices, memory, &mut dump).await,
        None => execute(&config, &Passthrough, &set.slices, memory, &mut dump).await,
    }?;

    let naming = set
        .output_naming(output.slices.len())
        .ok_or_else(|| "no output naming available".to_string())?;
    write_slices(
        &cli.output_dir,
        &naming,
        output.slices.iter().map(|s| &s.image),
    )
    .map_err(|e| e.to_string())?;
    if let Some(ref path) = cli.learned_colors {
        save_memory(path, &output.memory).map_err(|e| e.to_string())?;
    }
    if let Some(ref dump) = dump
        && dump.failures() > 0
    {
        tracing::warn!(failures = dump.failures(), "some debug images were not written");
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output.report)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", output.report.report());
    }
    Ok(())
}

async fn execute<C: Colorizer>(
    config: &RunConfig,
    colorizer: &C,
    slices: &[inkstrip_pipeline::Slice],
    memory: ColorMemory,
    dump: &mut Option<DebugDump>,
) -> Result<RunOutput, String> {
    Runner::new(config, colorizer)
        .run(slices, memory, dump)
        .await
        .map_err(|e| e.to_string())
}
