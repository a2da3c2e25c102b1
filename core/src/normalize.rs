// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Consolidates raw source appointments into atomic [`Event`] records.
//!
//! The source application reports timestamps in up to two forms (wall clock
//! and instant) that are not always mutually consistent, flags all-day
//! items unreliably, and represents multi-day all-day ranges as
//! midnight-to-midnight intervals. The normalizer reconciles the
//! timestamps, infers the all-day property, chunks multi-day all-day items
//! into one event per day, and drops duplicate signatures.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::event::Event;
use crate::recurrence::OccurrenceInfo;
use crate::source::RawAppointment;
use crate::timezone::{local_to_utc, utc_to_local, within_tolerance, ZonePair};

/// Default tolerance for wall-clock/instant reconciliation, in minutes.
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 1;

/// Resolves a (wall clock, instant) timestamp pair against the source zone.
///
/// Missing halves are derived from the present one. When both are present
/// but disagree beyond `tolerance`, the instant wins and the wall clock is
/// re-derived (with a warning). Returns `None` when both are absent.
#[must_use]
pub fn resolve_timestamps(
    tz: Tz,
    local: Option<NaiveDateTime>,
    utc: Option<DateTime<Utc>>,
    tolerance: Duration,
) -> Option<(NaiveDateTime, DateTime<Utc>)> {
    match (local, utc) {
        (None, None) => None,
        (Some(local), None) => Some((local, local_to_utc(tz, local))),
        (None, Some(utc)) => Some((utc_to_local(tz, utc), utc)),
        (Some(local), Some(utc)) => {
            let derived = utc_to_local(tz, utc);
            if within_tolerance(local, derived, tolerance) {
                Some((local, utc))
            } else {
                tracing::warn!(
                    reported = %local,
                    derived = %derived,
                    "wall clock disagrees with instant beyond tolerance, using instant"
                );
                Some((derived, utc))
            }
        }
    }
}

/// Infers whether an event is all-day.
///
/// True when the source flags it so, or when the span looks like a
/// midnight-to-midnight interval: start at midnight, total length of at
/// least 23 hours, end at midnight or at/after 23:59. The 23-hour floor
/// keeps single days that cross a DST transition in the all-day bucket.
#[must_use]
pub fn infer_all_day(flagged: bool, start_local: NaiveDateTime, end_local: NaiveDateTime) -> bool {
    if flagged {
        return true;
    }

    let midnight = NaiveTime::MIN;
    let late = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(midnight);
    start_local.time() == midnight
        && end_local - start_local >= Duration::hours(23)
        && (end_local.time() == midnight || end_local.time() >= late)
}

/// Per-cycle normalizer. Holds the dedup seen-set; create one per cycle.
#[derive(Debug)]
pub struct Normalizer {
    zones: ZonePair,
    tolerance: Duration,
    seen: HashSet<(String, DateTime<Utc>, DateTime<Utc>)>,
}

impl Normalizer {
    /// Creates a normalizer with the default one-minute tolerance.
    #[must_use]
    pub fn new(zones: ZonePair) -> Self {
        Self::with_tolerance(zones, Duration::minutes(DEFAULT_TOLERANCE_MINUTES))
    }

    /// Creates a normalizer with an explicit tolerance.
    #[must_use]
    pub fn with_tolerance(zones: ZonePair, tolerance: Duration) -> Self {
        Self {
            zones,
            tolerance,
            seen: HashSet::new(),
        }
    }

    /// Normalizes a non-recurring appointment (or a series master treated
    /// as a single item). Returns zero or more atomic events.
    pub fn normalize_appointment(&mut self, raw: &RawAppointment) -> Vec<Event> {
        if raw.is_cancelled {
            return Vec::new();
        }

        let Some((start_local, start_utc)) = resolve_timestamps(
            self.zones.source,
            raw.start_local,
            raw.start_utc,
            self.tolerance,
        ) else {
            tracing::warn!(
                global_id = raw.global_id,
                subject = raw.subject,
                "appointment has no usable start time, discarding"
            );
            return Vec::new();
        };

        let Some((end_local, end_utc)) = resolve_timestamps(
            self.zones.source,
            raw.end_local,
            raw.end_utc,
            self.tolerance,
        ) else {
            tracing::warn!(
                global_id = raw.global_id,
                subject = raw.subject,
                "appointment has no usable end time, discarding"
            );
            return Vec::new();
        };

        let all_day = infer_all_day(raw.is_all_day, start_local, end_local);
        self.emit(
            &raw.subject,
            &raw.body,
            &raw.location,
            &raw.global_id,
            start_local,
            end_local,
            start_utc,
            end_utc,
            all_day,
        )
    }

    /// Normalizes one expanded series occurrence, applying exception
    /// overrides where present.
    pub fn normalize_occurrence(
        &mut self,
        master: &RawAppointment,
        occurrence: &OccurrenceInfo,
    ) -> Vec<Event> {
        let subject = occurrence.subject.as_deref().unwrap_or(&master.subject);
        let body = occurrence.body.as_deref().unwrap_or(&master.body);
        let location = occurrence.location.as_deref().unwrap_or(&master.location);

        self.emit(
            subject,
            body,
            location,
            &master.global_id,
            occurrence.start_local,
            occurrence.end_local,
            occurrence.start_utc,
            occurrence.end_utc,
            occurrence.is_all_day,
        )
    }

    #[expect(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        subject: &str,
        body: &str,
        location: &str,
        global_id: &str,
        start_local: NaiveDateTime,
        end_local: NaiveDateTime,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
        all_day: bool,
    ) -> Vec<Event> {
        if end_utc <= start_utc {
            tracing::warn!(
                global_id,
                subject,
                %start_utc,
                %end_utc,
                "non-positive event span, dropping"
            );
            return Vec::new();
        }

        self.check_target_alignment(global_id, start_local, start_utc);

        let mut events = Vec::new();
        if all_day {
            for (chunk_start, chunk_end) in day_chunks(start_local, end_local) {
                events.push(Event {
                    subject: subject.to_string(),
                    body: body.to_string(),
                    location: location.to_string(),
                    start_local: chunk_start,
                    end_local: chunk_end,
                    start_utc: local_to_utc(self.zones.source, chunk_start),
                    end_utc: local_to_utc(self.zones.source, chunk_end),
                    global_id: global_id.to_string(),
                    is_all_day: true,
                });
            }
        } else {
            events.push(Event {
                subject: subject.to_string(),
                body: body.to_string(),
                location: location.to_string(),
                start_local,
                end_local,
                start_utc,
                end_utc,
                global_id: global_id.to_string(),
                is_all_day: false,
            });
        }

        events.retain(|e| {
            let fresh = self
                .seen
                .insert((e.global_id.clone(), e.start_utc, e.end_utc));
            if !fresh {
                tracing::warn!(
                    global_id = e.global_id,
                    subject = e.subject,
                    start = %e.start_utc,
                    "duplicate event signature, dropping"
                );
            }
            fresh
        });
        events
    }

    /// When source and target zones are the same, the target-derived wall
    /// clock must match the source wall clock. A mismatch indicates a
    /// conversion fault somewhere upstream; logged, not fatal.
    fn check_target_alignment(
        &self,
        global_id: &str,
        start_local: NaiveDateTime,
        start_utc: DateTime<Utc>,
    ) {
        if !self.zones.same_zone() {
            return;
        }
        let derived = utc_to_local(self.zones.target, start_utc);
        if !within_tolerance(start_local, derived, self.tolerance) {
            tracing::warn!(
                global_id,
                source_local = %start_local,
                target_local = %derived,
                "target zone alignment check failed"
            );
        }
    }
}

/// Splits an all-day span into per-day midnight-to-midnight chunks.
///
/// A midnight end is exclusive; any later end time extends into that day.
fn day_chunks(
    start_local: NaiveDateTime,
    end_local: NaiveDateTime,
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let first = start_local.date();
    let day_span = (end_local.date() - first).num_days();
    let days = if end_local.time() == NaiveTime::MIN {
        day_span.max(1)
    } else {
        day_span + 1
    };

    (0..days)
        .filter_map(|offset| {
            let day = first.checked_add_signed(Duration::days(offset))?;
            let next = day.checked_add_signed(Duration::days(1))?;
            Some((day.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN)))
        })
        .collect()
}
