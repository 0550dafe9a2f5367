//! Recurrence engine: daily/weekly/monthly cadence math.
//!
//! Two rules live here. [`next_occurrence`] seeds a new recurrence: the
//! candidate is "today at the configured time" (or the upcoming Monday, or
//! the first of next month), pushed forward by one cadence unit when the
//! candidate has already passed. [`advance_from`] rolls a recurrence forward
//! after an occurrence completes: one cadence unit from the reference
//! instant, never from the stale next-run, so late batches do not produce a
//! burst of catch-up occurrences.
//!
//! All computation happens in the policy's local timezone and the result is
//! converted to UTC before it is returned.

use chrono::{DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use syndica_domain::{Cadence, Result, SyndicaError, TimeOfDay};

/// Parse an IANA timezone name as stored on posts and policies.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SyndicaError::InvalidSchedule(format!("invalid timezone '{name}'")))
}

/// Compute the first run instant for a newly created recurrence.
///
/// A candidate equal to `reference` counts as already passed.
pub fn next_occurrence(
    cadence: Cadence,
    time_of_day: TimeOfDay,
    timezone: Tz,
    reference: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let local = reference.with_timezone(&timezone);
    let today = local.date_naive();

    let candidate_date = match cadence {
        Cadence::Daily => today,
        Cadence::Weekly => upcoming_monday(today),
        Cadence::Monthly => first_of_next_month(today)?,
    };

    let candidate = resolve_local(timezone, candidate_date, time_of_day);
    if candidate.with_timezone(&Utc) > reference {
        return Ok(candidate.with_timezone(&Utc));
    }

    let pushed = match cadence {
        Cadence::Daily => candidate_date + Duration::days(1),
        Cadence::Weekly => candidate_date + Duration::days(7),
        Cadence::Monthly => add_one_month(candidate_date)?,
    };
    Ok(resolve_local(timezone, pushed, time_of_day).with_timezone(&Utc))
}

/// Compute the next run instant after an occurrence has been dispatched.
///
/// Advances exactly one cadence unit from `reference` at the configured
/// time-of-day.
pub fn advance_from(
    cadence: Cadence,
    time_of_day: TimeOfDay,
    timezone: Tz,
    reference: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let today = reference.with_timezone(&timezone).date_naive();

    let next_date = match cadence {
        Cadence::Daily => today + Duration::days(1),
        Cadence::Weekly => today + Duration::days(7),
        Cadence::Monthly => add_one_month(today)?,
    };

    Ok(resolve_local(timezone, next_date, time_of_day).with_timezone(&Utc))
}

/// The next Monday strictly after `date`.
fn upcoming_monday(date: NaiveDate) -> NaiveDate {
    let ahead = (7 - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(if ahead == 0 { 7 } else { i64::from(ahead) })
}

fn first_of_next_month(date: NaiveDate) -> Result<NaiveDate> {
    let first = date.with_day(1).ok_or_else(|| {
        SyndicaError::Internal(format!("failed to normalise date {date} to start of month"))
    })?;
    first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| SyndicaError::Internal(format!("date overflow advancing {date} by a month")))
}

/// One month forward with day-of-month clamping (Jan 31 -> Feb 28/29).
fn add_one_month(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(1))
        .ok_or_else(|| SyndicaError::Internal(format!("date overflow advancing {date} by a month")))
}

/// Map a local date + wall-clock time to a concrete instant.
///
/// Ambiguous local times (DST fall-back) resolve to the earliest mapping; a
/// nonexistent local time (DST spring-forward gap) rolls forward one hour at
/// a time until a valid instant exists.
fn resolve_local(timezone: Tz, date: NaiveDate, time_of_day: TimeOfDay) -> DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(u32::from(time_of_day.hour), u32::from(time_of_day.minute), 0)
        .unwrap_or(NaiveTime::MIN);
    let mut naive = date.and_time(time);
    loop {
        match timezone.from_local_datetime(&naive) {
            LocalResult::Single(instant) => return instant,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => naive += Duration::hours(1),
        }
    }
}
