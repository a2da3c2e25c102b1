// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// An atomic calendar event, post-expansion and normalization.
///
/// Events exist only for the duration of a sync cycle. Multi-day all-day
/// appointments have already been chunked into one event per day, and
/// recurring series into one event per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event subject. May be empty.
    pub subject: String,

    /// Event body text.
    pub body: String,

    /// Event location.
    pub location: String,

    /// Start wall-clock time in the source zone.
    pub start_local: NaiveDateTime,

    /// End wall-clock time in the source zone.
    pub end_local: NaiveDateTime,

    /// Start instant. Always after-or-equal the epoch of `start_local`
    /// minus the source zone offset, within the normalizer's tolerance.
    pub start_utc: DateTime<Utc>,

    /// End instant. Invariant: strictly after `start_utc`.
    pub end_utc: DateTime<Utc>,

    /// Stable identifier of the originating appointment or series.
    pub global_id: String,

    /// Whether the event is all-day (date-valued on the wire).
    pub is_all_day: bool,
}

impl Event {
    /// The dedup signature: identity plus the occupied instant span.
    #[must_use]
    pub fn signature(&self) -> (&str, DateTime<Utc>, DateTime<Utc>) {
        (&self.global_id, self.start_utc, self.end_utc)
    }

    /// The instant woven into this event's destination UID.
    ///
    /// Timed events use their start instant. All-day events use the start
    /// of their day read as UTC, so the marker stays stable across zone
    /// configuration changes and names the calendar day it covers.
    #[must_use]
    pub fn occurrence_marker(&self) -> DateTime<Utc> {
        if self.is_all_day {
            Utc.from_utc_datetime(&self.start_local.date().and_time(NaiveTime::MIN))
        } else {
            self.start_utc
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn event(all_day: bool) -> Event {
        let start_local = NaiveDate::from_ymd_opt(2025, 2, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Event {
            subject: "Holiday".to_string(),
            body: String::new(),
            location: String::new(),
            start_local,
            end_local: start_local + chrono::Duration::days(1),
            // Berlin midnight is 23:00Z the previous day.
            start_utc: Utc.with_ymd_and_hms(2025, 2, 9, 23, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2025, 2, 10, 23, 0, 0).unwrap(),
            global_id: "G2".to_string(),
            is_all_day: all_day,
        }
    }

    #[test]
    fn all_day_marker_is_day_start_read_as_utc() {
        assert_eq!(
            event(true).occurrence_marker(),
            Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn timed_marker_is_start_instant() {
        assert_eq!(
            event(false).occurrence_marker(),
            Utc.with_ymd_and_hms(2025, 2, 9, 23, 0, 0).unwrap()
        );
    }
}
