//! Game lifecycle commands: new, join, submit, show.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use chrono::Utc;
use sluice::{GameRecord, GameSettings, GameStatus, GameStore};

use super::output::{format_game, JsonGame};
use super::{CliError, Context, OutputFormat};

/// Print a game overview in the requested format.
fn print_game(ctx: &Context, record: &GameRecord) -> Result<(), CliError> {
    let state = match record.status {
        GameStatus::Open => None,
        GameStatus::InProgress | GameStatus::Complete => Some(record.load_state()?),
    };
    let next = record.next_tick()?;
    match ctx.format {
        OutputFormat::Text => print!("{}", format_game(record, state.as_ref(), next)),
        OutputFormat::Json => {
            let json = JsonGame::new(record, state.as_ref(), next);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

/// Execute the new command.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the id is taken.
pub(crate) fn create(ctx: &Context, id: &str, settings: GameSettings) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let record = GameRecord::new(id, settings, Utc::now())?;
    store.create(&record)?;
    print_game(ctx, &record)
}

/// Execute the join command.
///
/// # Errors
///
/// Returns an error if the game is not open or the address already joined.
pub(crate) fn join(ctx: &Context, id: &str, address: &str) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let now = Utc::now();
    let mut seat = 0;
    let record = store.modify(id, &mut |record| {
        seat = record.join(address, now, &ctx.config)?;
        Ok(())
    })?;
    if ctx.format == OutputFormat::Text {
        println!("{address} joined {id} as player {seat}");
        if record.status == GameStatus::InProgress {
            println!("All seats taken; the game has started.");
        }
        println!();
    }
    print_game(ctx, &record)
}

/// Execute the submit command.
///
/// Replaces the player's pending commands. A submission with any invalid
/// command is rejected whole and the previous one is kept.
///
/// # Errors
///
/// Returns an error listing every problem if the submission is rejected.
pub(crate) fn submit(
    ctx: &Context,
    id: &str,
    address: &str,
    file: Option<PathBuf>,
) -> Result<(), CliError> {
    let text = match file {
        Some(path) => fs::read_to_string(&path)
            .map_err(|e| CliError::new(format!("Failed to read {}: {e}", path.display())))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    let store = ctx.open_store()?;
    let record = store.load(id)?;
    let (seat, canonical) = record.prepare_submission(address, &text)?;
    store.store_commands(id, seat, &canonical)?;

    match ctx.format {
        OutputFormat::Text => {
            println!("Accepted for player {seat} in {id}:");
            if canonical.is_empty() {
                println!("  (no gate changes)");
            }
            for line in canonical.lines() {
                println!("  {line}");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({ "id": id, "player": seat, "commands": canonical });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the game cannot be loaded.
pub(crate) fn show(ctx: &Context, id: &str, player: Option<&str>) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let record = store.load(id)?;

    if let Some(address) = player {
        let seat = record
            .player_id(address)
            .ok_or_else(|| CliError::new(format!("{address} is not playing in {id}")))?;
        if ctx.format == OutputFormat::Text {
            match record.pending.get(&seat) {
                Some(text) => println!("Pending commands for player {seat}:\n{text}\n"),
                None => println!("No pending commands for player {seat}.\n"),
            }
        }
    }

    print_game(ctx, &record)
}
