//! One-shot expression builder.
//!
//! Converts an absolute instant into a 7-field cron expression that matches
//! exactly that second. Day-of-week is always a wildcard; the year field pins
//! the expression to a single instant.

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};

/// Lead applied when the requested instant is no longer in the future.
pub const ONE_SHOT_LEAD: Duration = Duration::seconds(1);

/// Build a cron expression that fires once at `target`, evaluated at `now`.
///
/// Works at whole-second resolution. If `target`, truncated to the second,
/// is not strictly after `now`, the expression targets `now + 1s` instead so
/// that it always matches an instant that can still arrive.
pub fn one_shot_expression(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    expression_for(effective_target(target, now))
}

/// The instant a one-shot expression built at `now` will actually fire.
pub fn effective_target(target: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let target = truncate_to_second(target);
    if target > now {
        target
    } else {
        truncate_to_second(now + ONE_SHOT_LEAD)
    }
}

fn truncate_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(Duration::seconds(1))
        .unwrap_or(instant)
}

fn expression_for(instant: DateTime<Utc>) -> String {
    format!(
        "{} {} {} {} {} * {}",
        instant.second(),
        instant.minute(),
        instant.hour(),
        instant.day(),
        instant.month(),
        instant.year()
    )
}
