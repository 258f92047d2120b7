// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and sync-window computation.

use chrono::{DateTime, Days, NaiveTime, SecondsFormat, TimeZone, Timelike, Utc};

use crate::error::AppError;

/// Hour at which a logical day begins. Tasks scheduled between midnight and
/// this hour belong to the previous logical day, so "today's schedule"
/// queries at 02:30 still return yesterday evening's window.
pub const DAY_BOUNDARY_HOUR: u32 = 3;

/// Time range covering exactly one logical day, in UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compute the sync window for the logical day `day_offset` days away from
/// the logical day containing `now`.
///
/// The window runs from 03:00 local time to 03:00 local time the next
/// calendar day. `now` values before 03:00 are snapped to the previous
/// logical day first, then the signed offset is applied (-1 = yesterday,
/// 0 = today, +1 = tomorrow).
pub fn logical_day_window<Tz: TimeZone>(
    now: DateTime<Tz>,
    day_offset: i64,
) -> Result<SyncWindow, AppError> {
    let anchor_date = if now.hour() < DAY_BOUNDARY_HOUR {
        now.date_naive()
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Date underflow")))?
    } else {
        now.date_naive()
    };

    let start_date = if day_offset >= 0 {
        anchor_date.checked_add_days(Days::new(day_offset as u64))
    } else {
        anchor_date.checked_sub_days(Days::new(day_offset.unsigned_abs()))
    }
    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Day offset out of range")))?;

    let end_date = start_date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Date overflow")))?;

    let boundary = NaiveTime::from_hms_opt(DAY_BOUNDARY_HOUR, 0, 0)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Invalid boundary hour")))?;

    let tz = now.timezone();
    let start = resolve_local(&tz, start_date.and_time(boundary))?;
    let end = resolve_local(&tz, end_date.and_time(boundary))?;

    Ok(SyncWindow {
        start: start.with_timezone(&Utc),
        end: end.with_timezone(&Utc),
    })
}

/// Resolve a naive local timestamp to an instant. DST-ambiguous times take
/// the earlier mapping; times skipped by a forward transition slide one hour
/// later.
fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    naive: chrono::NaiveDateTime,
) -> Result<DateTime<Tz>, AppError> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Ok(dt);
    }

    let shifted = naive + chrono::Duration::hours(1);
    tz.from_local_datetime(&shifted)
        .earliest()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Unresolvable local time {}", naive)))
}
