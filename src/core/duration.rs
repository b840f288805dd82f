//! ISO-8601 duration parsing for log query lookback windows

use chrono::{DateTime, Duration, Utc};

use crate::error::{ToolError, ToolOutcome};

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parses `PnYnMnWnDTnHnMnS`. Years count as 365 days and months as 30 days;
/// any component may carry a decimal fraction (`.` or `,`).
pub fn parse_iso8601_duration(input: &str) -> ToolOutcome<Duration> {
    let invalid = || ToolError::invalid(format!("'{}' is not a valid ISO-8601 duration", input));

    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix('P')
        .or_else(|| trimmed.strip_prefix('p'))
        .ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    let (date_part, time_part) = match body.find(|c: char| c == 'T' || c == 't') {
        Some(idx) => {
            let time = &body[idx + 1..];
            if time.is_empty() {
                return Err(invalid());
            }
            (&body[..idx], Some(time))
        }
        None => (body, None),
    };

    let mut seconds = 0.0;
    seconds += sum_components(
        date_part,
        &[
            ('Y', 365.0 * SECONDS_PER_DAY),
            ('M', 30.0 * SECONDS_PER_DAY),
            ('W', 7.0 * SECONDS_PER_DAY),
            ('D', SECONDS_PER_DAY),
        ],
    )
    .ok_or_else(invalid)?;
    if let Some(time) = time_part {
        seconds += sum_components(
            time,
            &[('H', SECONDS_PER_HOUR), ('M', SECONDS_PER_MINUTE), ('S', 1.0)],
        )
        .ok_or_else(invalid)?;
    }

    let millis = (seconds * 1_000.0).round();
    if !millis.is_finite() || millis > i64::MAX as f64 {
        return Err(invalid());
    }
    Duration::try_milliseconds(millis as i64).ok_or_else(invalid)
}

/// Sums `<number><designator>` pairs. Designators must appear in the order
/// given by `units`, each at most once.
fn sum_components(part: &str, units: &[(char, f64)]) -> Option<f64> {
    let mut total = 0.0;
    let mut next_unit = 0;
    let mut number = String::new();

    for ch in part.chars() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            number.push(if ch == ',' { '.' } else { ch });
            continue;
        }

        let designator = ch.to_ascii_uppercase();
        let offset = units[next_unit..].iter().position(|(d, _)| *d == designator)?;
        let (_, factor) = units[next_unit + offset];
        next_unit += offset + 1;

        if number.is_empty() {
            return None;
        }
        let value: f64 = number.parse().ok()?;
        total += value * factor;
        number.clear();
    }

    if number.is_empty() {
        Some(total)
    } else {
        None
    }
}

/// Formats `[now - lookback, now]` as an ISO-8601 interval. Fails when the
/// start falls outside the representable date range.
pub fn lookback_interval(now: DateTime<Utc>, lookback: Duration) -> ToolOutcome<String> {
    let start = now.checked_sub_signed(lookback).ok_or_else(|| {
        ToolError::invalid(format!(
            "lookback of {} days reaches before the earliest supported date",
            lookback.num_days()
        ))
    })?;
    Ok(format!("{}/{}", start.to_rfc3339(), now.to_rfc3339()))
}
