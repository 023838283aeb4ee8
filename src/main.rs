mod commands;

use clap::{ArgAction, Parser, Subcommand};
use commands::convert::{ConvertArgs, convert_command};
use commands::inspect::{InspectArgs, inspect_command};
use std::error::Error;
use std::io;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rec2gpx",
    version,
    about = "Convert OwnTracks recorder logs into GPX tracks"
)]
struct Cli {
    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Filter a recorder log and write it as a GPX track")]
    Convert(ConvertArgs),
    #[command(about = "Show point count and time span of a recorder log")]
    Inspect(InspectArgs),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Convert(args) => convert_command(&args),
        Commands::Inspect(args) => inspect_command(&args),
    }
}
