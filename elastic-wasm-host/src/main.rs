//! `elastic-wasm`: run a field-processing guest module against one event
//!
//! # Usage
//!
//! ```bash
//! # Run a guest against an event file
//! elastic-wasm guest.wasm --event event.json
//!
//! # Supply fields inline and print the resulting event
//! elastic-wasm guest.wasm --field message="hello world" --field count=3 --print-event
//!
//! # Cap guest CPU usage
//! elastic-wasm guest.wasm --fuel 10000000
//! ```

use anyhow::Context;
use clap::Parser;
use elastic_wasm_host::loader::DEFAULT_MAX_STACK_SIZE;
use elastic_wasm_host::record::parse_field_assignment;
use elastic_wasm_host::tracing_support::{self, TracingConfig, TracingFormat};
use elastic_wasm_host::{Event, FieldValue, HostConfig, HostContext, Supervisor};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "elastic-wasm",
    version,
    about = "Run a sandboxed field-processing guest module"
)]
struct Cli {
    /// Guest module to run
    #[arg(value_name = "WASM")]
    module: PathBuf,

    /// JSON object used as the event
    #[arg(long, value_name = "FILE", env = "ELASTIC_WASM_EVENT")]
    event: Option<PathBuf>,

    /// Set an event field; VALUE is parsed as JSON, or taken as a string
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, FieldValue)>,

    /// Fuel budget for the guest (unlimited when omitted)
    #[arg(long, env = "ELASTIC_WASM_FUEL")]
    fuel: Option<u64>,

    /// Maximum WASM stack size in bytes
    #[arg(
        long,
        value_name = "BYTES",
        env = "ELASTIC_WASM_MAX_STACK",
        default_value_t = DEFAULT_MAX_STACK_SIZE
    )]
    max_stack: usize,

    /// Log output format
    #[arg(
        long,
        value_enum,
        env = "ELASTIC_WASM_LOG_FORMAT",
        default_value = "compact"
    )]
    log_format: TracingFormat,

    /// Print the event as JSON after the guest finished
    #[arg(long)]
    print_event: bool,
}

fn parse_field(input: &str) -> Result<(String, FieldValue), String> {
    parse_field_assignment(input).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        ..Default::default()
    };
    if let Err(e) = tracing_support::init_subscriber(tracing_config) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(return_code) => {
            println!("{}", return_code);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut event = match &cli.event {
        Some(path) => Event::from_json_file(path)?,
        None => Event::new(),
    };
    event.extend(cli.fields);

    let mut config = HostConfig::default().with_max_stack_size(cli.max_stack);
    if let Some(fuel) = cli.fuel {
        config = config.with_fuel_limit(fuel);
    }

    let supervisor = Supervisor::new(config).context("failed to create module host")?;
    let completion = supervisor
        .run_file(&cli.module, HostContext::new(event))
        .with_context(|| format!("failed to run {}", cli.module.display()))?;

    if cli.print_event {
        println!("{}", completion.record.to_json_pretty()?);
    }

    Ok(completion.return_code)
}
