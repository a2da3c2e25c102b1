// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Series expansion.
//!
//! Translates the source application's recurrence descriptor into a
//! canonical `DTSTART`/`RRULE` rule, enumerates concrete occurrences within
//! a window, and honours series exceptions: every exception's original date
//! lands in a skip-set, and exceptions carrying a replacement item are
//! emitted directly with their override fields. An exception always wins
//! over the rule-driven occurrence for its date.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc, Weekday};
use rrule::RRuleSet;

use crate::normalize::{infer_all_day, resolve_timestamps};
use crate::source::{Frequency, RawAppointment, SeriesDescriptor, Termination};
use crate::timezone::{local_to_utc, utc_to_local, ZonePair};

/// Fallback occurrence length when no source yields a positive duration.
const FALLBACK_DURATION_MINUTES: i64 = 30;

/// Cap on enumerated occurrences per series. Windows span a few months;
/// a daily rule stays far below this.
const ENUMERATION_CAP: u16 = 800;

/// The absolute window occurrences are enumerated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionWindow {
    /// Inclusive lower bound.
    pub from: DateTime<Utc>,
    /// Inclusive upper bound.
    pub to: DateTime<Utc>,
}

impl ExpansionWindow {
    /// Whether an instant falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant <= self.to
    }
}

/// One concrete occurrence of a series, in source-local and absolute time.
///
/// Override fields are `Some` only when the occurrence stems from an
/// exception that carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceInfo {
    /// Start wall-clock time in the source zone.
    pub start_local: NaiveDateTime,
    /// End wall-clock time in the source zone.
    pub end_local: NaiveDateTime,
    /// Start instant.
    pub start_utc: DateTime<Utc>,
    /// End instant.
    pub end_utc: DateTime<Utc>,
    /// All-day flag, inherited from the series or computed by an override.
    pub is_all_day: bool,
    /// Subject override from an exception.
    pub subject: Option<String>,
    /// Body override from an exception.
    pub body: Option<String>,
    /// Location override from an exception.
    pub location: Option<String>,
}

/// Expands a series master into occurrences within `window`.
///
/// Returns an empty set (with a warning) when the master's timestamps are
/// unusable or the descriptor cannot be expressed as a rule; exception
/// overrides that fall inside the window are still emitted in that case.
#[must_use]
pub fn expand_series(
    master: &RawAppointment,
    zones: &ZonePair,
    window: &ExpansionWindow,
    tolerance: Duration,
) -> Vec<OccurrenceInfo> {
    let Some(descriptor) = &master.series else {
        return Vec::new();
    };

    let Some((master_start_local, master_start_utc)) = resolve_timestamps(
        zones.source,
        master.start_local,
        master.start_utc,
        tolerance,
    ) else {
        tracing::warn!(
            global_id = master.global_id,
            subject = master.subject,
            "series master has no usable start time, skipping series"
        );
        return Vec::new();
    };

    let master_end = resolve_timestamps(zones.source, master.end_local, master.end_utc, tolerance);
    let duration = base_duration(descriptor, master_start_utc, master_end, master);

    let series_all_day = infer_all_day(
        master.is_all_day,
        master_start_local,
        master_start_local + duration,
    );

    // Exceptions first: original dates feed the skip-set, replacements in
    // the window are emitted directly.
    let mut skip_dates = BTreeSet::new();
    let mut occurrences = Vec::new();
    for exception in &descriptor.exceptions {
        skip_dates.insert(exception.original_date);
        let Some(replacement) = &exception.replacement else {
            continue;
        };
        if let Some(occurrence) =
            override_occurrence(replacement, zones, window, duration, tolerance)
        {
            occurrences.push(occurrence);
        }
    }

    match build_rule(descriptor, zones, master_start_local) {
        Some(rule) => match rule.parse::<RRuleSet>() {
            Ok(rule_set) => {
                let tz: rrule::Tz = chrono::Utc.into();
                // after/before are exclusive; widen by a second to make the
                // window inclusive.
                let after = (window.from - Duration::seconds(1)).with_timezone(&tz);
                let before = (window.to + Duration::seconds(1)).with_timezone(&tz);
                let result = rule_set.after(after).before(before).all(ENUMERATION_CAP);
                if result.limited {
                    tracing::warn!(
                        global_id = master.global_id,
                        cap = ENUMERATION_CAP,
                        "series enumeration hit the cap, tail occurrences dropped"
                    );
                }

                for instant in &result.dates {
                    let start_local = instant.naive_local();
                    if skip_dates.contains(&start_local.date()) {
                        continue;
                    }
                    let start_utc = instant.with_timezone(&Utc);
                    let end_utc = start_utc + duration;
                    occurrences.push(OccurrenceInfo {
                        start_local,
                        end_local: utc_to_local(zones.source, end_utc),
                        start_utc,
                        end_utc,
                        is_all_day: series_all_day,
                        subject: None,
                        body: None,
                        location: None,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(
                    global_id = master.global_id,
                    rule,
                    error = %e,
                    "recurrence rule rejected, skipping rule-driven occurrences"
                );
            }
        },
        None => {
            tracing::warn!(
                global_id = master.global_id,
                frequency = ?descriptor.frequency,
                "unsupported recurrence descriptor, skipping rule-driven occurrences"
            );
        }
    }

    occurrences.sort_by_key(|o| o.start_utc);
    occurrences
}

/// Resolves the base occurrence duration.
///
/// Resolution order: the pattern's own start/end times, then the master's
/// resolved span, then the appointment's raw wall-clock span. Falls back to
/// 30 minutes (logged) when every option yields a non-positive span.
fn base_duration(
    descriptor: &SeriesDescriptor,
    master_start_utc: DateTime<Utc>,
    master_end: Option<(NaiveDateTime, DateTime<Utc>)>,
    master: &RawAppointment,
) -> Duration {
    if let (Some(start), Some(end)) = (descriptor.pattern_start_time, descriptor.pattern_end_time) {
        let span = end - start;
        if span > Duration::zero() {
            return span;
        }
    }

    if let Some((_, end_utc)) = master_end {
        let span = end_utc - master_start_utc;
        if span > Duration::zero() {
            return span;
        }
    }

    if let (Some(start), Some(end)) = (master.start_local, master.end_local) {
        let span = end - start;
        if span > Duration::zero() {
            return span;
        }
    }

    tracing::warn!(
        global_id = master.global_id,
        "no positive series duration available, falling back to 30 minutes"
    );
    Duration::minutes(FALLBACK_DURATION_MINUTES)
}

/// Materializes an exception's replacement item as an occurrence, when it
/// falls inside the window.
fn override_occurrence(
    replacement: &RawAppointment,
    zones: &ZonePair,
    window: &ExpansionWindow,
    duration: Duration,
    tolerance: Duration,
) -> Option<OccurrenceInfo> {
    let (start_local, start_utc) = resolve_timestamps(
        zones.source,
        replacement.start_local,
        replacement.start_utc,
        tolerance,
    )?;
    if !window.contains(start_utc) {
        return None;
    }

    let (end_local, end_utc) = resolve_timestamps(
        zones.source,
        replacement.end_local,
        replacement.end_utc,
        tolerance,
    )
    .unwrap_or((
        utc_to_local(zones.source, start_utc + duration),
        start_utc + duration,
    ));

    Some(OccurrenceInfo {
        start_local,
        end_local,
        start_utc,
        end_utc,
        is_all_day: infer_all_day(replacement.is_all_day, start_local, end_local),
        subject: Some(replacement.subject.clone()),
        body: Some(replacement.body.clone()),
        location: Some(replacement.location.clone()),
    })
}

/// Renders the descriptor as a `DTSTART`/`RRULE` document for the rule
/// parser. Returns `None` when the descriptor cannot be expressed.
fn build_rule(
    descriptor: &SeriesDescriptor,
    zones: &ZonePair,
    master_start_local: NaiveDateTime,
) -> Option<String> {
    let mut parts = Vec::new();

    let freq = match descriptor.frequency {
        Frequency::Daily => "DAILY",
        Frequency::Weekly => "WEEKLY",
        Frequency::Monthly | Frequency::MonthlyNth => "MONTHLY",
        Frequency::Yearly | Frequency::YearlyNth => "YEARLY",
    };
    parts.push(format!("FREQ={freq}"));
    parts.push(format!("INTERVAL={}", descriptor.interval.max(1)));

    match descriptor.frequency {
        Frequency::Daily => {}
        Frequency::Weekly => {
            if !descriptor.days_of_week.is_empty() {
                parts.push(format!("BYDAY={}", weekday_list(&descriptor.days_of_week)));
            }
        }
        Frequency::Monthly => {
            if let Some(day) = descriptor.day_of_month {
                parts.push(format!("BYMONTHDAY={day}"));
            }
        }
        Frequency::Yearly => {
            if let Some(month) = descriptor.month_of_year {
                parts.push(format!("BYMONTH={month}"));
            }
            if let Some(day) = descriptor.day_of_month {
                parts.push(format!("BYMONTHDAY={day}"));
            }
        }
        Frequency::MonthlyNth | Frequency::YearlyNth => {
            let ordinal = nth_ordinal(descriptor.instance?)?;
            if descriptor.days_of_week.is_empty() {
                return None;
            }
            if descriptor.frequency == Frequency::YearlyNth {
                let month = descriptor.month_of_year?;
                parts.push(format!("BYMONTH={month}"));
            }
            let days = descriptor
                .days_of_week
                .iter()
                .map(|d| format!("{ordinal}{}", weekday_code(*d)))
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("BYDAY={days}"));
        }
    }

    match descriptor.termination {
        Termination::Never => {}
        Termination::AfterOccurrences(count) => parts.push(format!("COUNT={count}")),
        Termination::UntilDate(date) => {
            // UNTIL must be UTC when DTSTART carries a TZID.
            let end_of_day = date.and_time(NaiveTime::from_hms_opt(23, 59, 59)?);
            let until = local_to_utc(zones.source, end_of_day);
            parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
        }
    }

    Some(format!(
        "DTSTART;TZID={}:{}\nRRULE:{}",
        zones.source.name(),
        master_start_local.format("%Y%m%dT%H%M%S"),
        parts.join(";")
    ))
}

/// Nth-instance to RRULE ordinal; 5 and above normalise to "last".
fn nth_ordinal(instance: u8) -> Option<i8> {
    match instance {
        1..=4 => Some(i8::try_from(instance).ok()?),
        5 => Some(-1),
        _ => None,
    }
}

fn weekday_list(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| weekday_code(*d))
        .collect::<Vec<_>>()
        .join(",")
}

const fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}
