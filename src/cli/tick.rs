//! Tick commands: run ticks and list upcoming ones.

use chrono::{DateTime, Utc};
use sluice::report::tick_report;
use sluice::store::{MailboxNotifier, Notice};
use sluice::{run_due_ticks, run_tick, GameStore};

use super::output::JsonTick;
use super::{CliError, Context, OutputFormat};

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    match now {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| CliError::new(format!("'{text}' is not an RFC 3339 time: {e}"))),
        None => Ok(Utc::now()),
    }
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        println!("To: {}", notice.to);
        println!("Subject: {}", notice.subject);
        println!();
        println!("{}", notice.body);
    }
}

/// Execute the tick command.
///
/// With an id the game ticks immediately, whatever its schedule. Without
/// one, every game whose slot has passed ticks once.
///
/// # Errors
///
/// Returns an error if a forced tick fails, or if the sweep cannot list
/// the store. Failures of individual games in a sweep are reported, not
/// returned.
pub(crate) fn execute(ctx: &Context, id: Option<&str>, now: Option<&str>) -> Result<(), CliError> {
    let now = parse_now(now)?;
    let store = ctx.open_store()?;
    let mailbox = MailboxNotifier::new();

    if let Some(id) = id {
        let outcome = run_tick(&store, &mailbox, id, &ctx.config, now)?;
        match ctx.format {
            OutputFormat::Text => {
                let record = store.load(id)?;
                let state = record.load_state()?;
                print!("{}", tick_report(&state, &outcome, None));
                println!();
                print_notices(&mailbox.take());
            }
            OutputFormat::Json => {
                let json = JsonTick::from_outcome(id, &outcome);
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        return Ok(());
    }

    let entries = run_due_ticks(&store, &mailbox, &ctx.config, now)?;
    match ctx.format {
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No games are due.");
            }
            for entry in &entries {
                match &entry.result {
                    Ok(tick) => println!("{}: played tick {tick}", entry.id),
                    Err(e) => println!("{}: FAILED: {e}", entry.id),
                }
            }
            println!();
            print_notices(&mailbox.take());
        }
        OutputFormat::Json => {
            let json: Vec<JsonTick> = entries
                .iter()
                .map(|e| JsonTick::swept(&e.id, e.result.clone().map_err(|err| err.to_string())))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

/// Execute the next command.
///
/// # Errors
///
/// Returns an error if the store cannot be read or a schedule is invalid.
pub(crate) fn next(ctx: &Context, id: Option<&str>) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let ids = match id {
        Some(id) => vec![id.to_string()],
        None => store.list()?,
    };

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let record = store.load(&id)?;
        let next = record.next_tick()?;
        let local = match next {
            Some(at) => Some(at.with_timezone(&record.timezone()?).to_rfc3339()),
            None => None,
        };
        rows.push((id, next, local));
    }

    match ctx.format {
        OutputFormat::Text => {
            for (id, next, local) in &rows {
                match (next, local) {
                    (Some(at), Some(local)) => println!("{id}: {} ({local} local)", at.to_rfc3339()),
                    _ => println!("{id}: not scheduled"),
                }
            }
        }
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = rows
                .iter()
                .map(|(id, next, local)| serde_json::json!({ "id": id, "next_tick": next, "local": local }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}
