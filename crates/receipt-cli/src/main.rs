mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "receipts",
    about = "Generate and mail donation receipts from form responses",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .receipts/)
    #[arg(long, global = true, env = "RECEIPTS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .receipts/ with config, response sheet and document template
    Init,

    /// Record a form response and attach its trigger flag
    Respond(cmd::respond::RespondArgs),

    /// Tick the trigger flag on a row, running the pipeline for it
    Check {
        /// Response row (1-based, header is row 1)
        row: u32,
    },

    /// Clear the trigger flag on a row so it can be re-triggered
    Uncheck {
        row: u32,
    },

    /// Attach trigger flags to rows that are missing one
    Backfill,

    /// Show document and delivery status per row
    Status {
        /// Only this row
        row: Option<u32>,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Respond(args) => cmd::respond::run(&root, args, cli.json),
        Commands::Check { row } => cmd::check::check(&root, row, cli.json),
        Commands::Uncheck { row } => cmd::check::uncheck(&root, row, cli.json),
        Commands::Backfill => cmd::backfill::run(&root, cli.json),
        Commands::Status { row } => cmd::status::run(&root, row, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
