//! Backgrounder CLI
//!
//! Starts background checks on a Backgrounder server and renders the
//! streamed progress and final report in the terminal.

use backgrounder::cli;
use backgrounder_logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

/// Exit code after Ctrl-C, as shells report SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "backgrounder", about = "Streaming background checks from the command line")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a background check and stream its progress
    Check(cli::check::CheckArgs),

    /// Replay a captured event stream through the renderer
    Replay(cli::replay::ReplayArgs),

    /// Show resolved configuration
    Config(cli::config::ConfigArgs),
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Check(args) => args.json,
        Commands::Replay(args) => args.json,
        Commands::Config(args) => args.json,
    }
}

fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Check(args) => cli::check::run(args),
        Commands::Replay(args) => cli::replay::run(args),
        Commands::Config(args) => cli::config::run(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);
    let progress_ui = !json_mode && !matches!(cli.command, Commands::Config(_));

    let _log_guard = match init_logging(LogConfig {
        app_name: "backgrounder",
        verbose: cli.verbose,
        progress_ui,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.downcast_ref::<cli::Interrupted>().is_some() => {
            eprintln!("Cancelled.");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else if let Some(helpful) = err.downcast_ref::<cli::error::HelpfulError>() {
                eprint!("{}", helpful);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
