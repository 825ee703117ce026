//! Tick times.
//!
//! Games tick at fixed local hours in their own timezone:
//!
//! | ticks/day | local hours            |
//! |-----------|------------------------|
//! | 1         | 20:00                  |
//! | 2         | 08:00, 20:00           |
//! | 3         | 08:00, 14:00, 20:00    |
//! | 4         | 02:00, 08:00, 14:00, 20:00 |

use chrono::{DateTime, Days, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Local tick hours, indexed by ticks per day - 1.
const SLOT_HOURS: [&[u32]; 4] = [&[20], &[8, 20], &[8, 14, 20], &[2, 8, 14, 20]];

/// Longest daylight-saving gap searched past a missing slot.
const MAX_GAP_MINUTES: i64 = 180;

/// Error computing a tick time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Only 1 to 4 ticks per day are supported.
    #[error("{0} ticks per day is not supported (use 1-4)")]
    UnsupportedTicksPerDay(u8),
    /// Not an IANA timezone name.
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
    /// No slot could be placed after the given time.
    #[error("no tick slot found after {0}")]
    NoSlot(DateTime<Utc>),
}

/// Local tick hours for a game.
///
/// # Errors
///
/// Returns [`ScheduleError::UnsupportedTicksPerDay`] outside 1-4.
pub fn slot_hours(ticks_per_day: u8) -> Result<&'static [u32], ScheduleError> {
    usize::from(ticks_per_day)
        .checked_sub(1)
        .and_then(|i| SLOT_HOURS.get(i))
        .copied()
        .ok_or(ScheduleError::UnsupportedTicksPerDay(ticks_per_day))
}

/// Parse an IANA timezone name such as `Europe/Berlin`.
///
/// # Errors
///
/// Returns [`ScheduleError::UnknownTimezone`] if the name is not known.
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

/// Resolve a local wall-clock time to an instant.
///
/// Ambiguous times take the earlier instant; times inside a gap move to
/// the first valid minute after it.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    (0..=MAX_GAP_MINUTES)
        .filter_map(|minutes| local.checked_add_signed(TimeDelta::minutes(minutes)))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
        .map(|t| t.with_timezone(&Utc))
}

/// The first tick slot strictly after `last`.
///
/// # Errors
///
/// Returns [`ScheduleError`] for an unsupported tick count, or if no slot
/// can be resolved in the next few days.
pub fn next_tick(
    last: DateTime<Utc>,
    tz: Tz,
    ticks_per_day: u8,
) -> Result<DateTime<Utc>, ScheduleError> {
    let hours = slot_hours(ticks_per_day)?;
    let today = last.with_timezone(&tz).date_naive();

    for offset in 0..3 {
        let Some(day) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        for &hour in hours {
            let Some(local) = day.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            if let Some(at) = resolve_local(tz, local)
                && at > last
            {
                return Ok(at);
            }
        }
    }

    Err(ScheduleError::NoSlot(last))
}

/// Whether a game last ticked at `last` is due at `now`.
///
/// # Errors
///
/// Returns [`ScheduleError`] if the schedule cannot be computed.
pub fn is_due(
    last: DateTime<Utc>,
    tz: Tz,
    ticks_per_day: u8,
    now: DateTime<Utc>,
) -> Result<bool, ScheduleError> {
    Ok(next_tick(last, tz, ticks_per_day)? <= now)
}
