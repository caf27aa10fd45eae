use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use llrpc_client::{Client, ClientConfig};
use tracing::{debug, warn};

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod capabilities;
pub mod info;
pub mod inventory;
pub mod reader_config;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// Connect to a reader and print connection metadata.
    Info(ConnectArgs),
    /// Print the reader's capabilities.
    Capabilities(ConnectArgs),
    /// Print the reader's current configuration.
    ReaderConfig(ConnectArgs),
    /// Run the configured ROSpec and print tag reports.
    Inventory(InventoryArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Info(args) => info::run(args, format),
        Command::Capabilities(args) => capabilities::run(args, format),
        Command::ReaderConfig(args) => reader_config::run(args, format),
        Command::Inventory(args) => inventory::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Client configuration file (JSON).
    pub config: PathBuf,
    /// Override the reader host from the configuration file.
    #[arg(long, env = "LLRPC_HOST")]
    pub host: Option<String>,
    /// Override the reader port from the configuration file.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Use this ROSpec ID instead of the configured one.
    #[arg(long)]
    pub rospec_id: Option<u32>,
    /// Stop after N RO_ACCESS_REPORT messages.
    #[arg(long)]
    pub reports: Option<usize>,
    /// Stop after this long (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub report_timeout: String,
}

pub fn load_config(args: &ConnectArgs) -> CliResult<ClientConfig> {
    let context = args.config.display().to_string();
    let mut config =
        ClientConfig::from_path(&args.config).map_err(|err| client_error(&context, err))?;
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate().map_err(|err| client_error(&context, err))?;
    Ok(config)
}

pub fn connect(args: &ConnectArgs) -> CliResult<Client> {
    let config = load_config(args)?;
    let addr = config.addr();
    debug!(%addr, "connecting");
    Client::connect(config).map_err(|err| client_error(&addr, err))
}

/// Close, logging rather than failing: the command's own result wins.
pub fn close_quietly(client: &Client) {
    if let Err(err) = client.close() {
        warn!(error = %err, "close failed");
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
