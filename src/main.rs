//! Sluice CLI - create, join and tick play-by-mail games from the shell.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sluice::SimConfig;
use tracing::info;

/// Sluice - a gate and force-flow territory game
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the game files
    #[arg(long, global = true, default_value = "games")]
    store: PathBuf,

    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    format: cli::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a game that waits for players
    New {
        /// Game id (letters, digits, '-' and '_')
        id: String,

        /// Seats to fill before the game starts
        #[arg(short, long, default_value = "2")]
        players: usize,

        /// Ticks per day (1-4)
        #[arg(short, long, default_value = "2")]
        ticks_per_day: u8,

        /// IANA timezone the tick hours are read in
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Most gate commands per player per tick
        #[arg(long, default_value = "10")]
        command_limit: usize,

        /// Board rows (3-26)
        #[arg(long, default_value = "10")]
        rows: u16,

        /// Board columns (3-99)
        #[arg(long, default_value = "10")]
        cols: u16,

        /// Board seed (default: random)
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Take a seat in an open game
    Join {
        /// Game id
        id: String,

        /// Player address
        address: String,
    },

    /// Submit gate commands for the next tick
    Submit {
        /// Game id
        id: String,

        /// Player address
        address: String,

        /// File holding the commands (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run ticks: one game now, or every game that is due
    Tick {
        /// Game to tick immediately (default: all due games)
        id: Option<String>,

        /// Treat this RFC 3339 time as now
        #[arg(long)]
        now: Option<String>,
    },

    /// Show a game and its board
    Show {
        /// Game id
        id: String,

        /// Show the view of this player
        #[arg(long)]
        player: Option<String>,
    },

    /// Show when games tick next
    Next {
        /// Game id (default: every game)
        id: Option<String>,
    },
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = SimConfig::load_or_default();
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    info!(store = %args.store.display(), "Sluice v{}", env!("CARGO_PKG_VERSION"));

    let ctx = cli::Context {
        store: args.store,
        format: args.format,
        config,
    };

    let result = match args.command {
        Commands::New {
            id,
            players,
            ticks_per_day,
            timezone,
            command_limit,
            rows,
            cols,
            seed,
        } => {
            let settings = sluice::GameSettings {
                required_players: players,
                ticks_per_day,
                timezone,
                command_limit,
                rows,
                cols,
                seed: seed.unwrap_or_else(cli::random_seed),
            };
            cli::game::create(&ctx, &id, settings)
        }
        Commands::Join { id, address } => cli::game::join(&ctx, &id, &address),
        Commands::Submit { id, address, file } => cli::game::submit(&ctx, &id, &address, file),
        Commands::Tick { id, now } => cli::tick::execute(&ctx, id.as_deref(), now.as_deref()),
        Commands::Show { id, player } => cli::game::show(&ctx, &id, player.as_deref()),
        Commands::Next { id } => cli::tick::next(&ctx, id.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
