// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Single-event iCalendar encoding and the verify-side decode.
//!
//! Timed events are written with UTC `DTSTART`/`DTEND` and two display
//! alarms (the second one configurable). All-day events are date-valued
//! and carry no alarms: timed reminders on untimed events misbehave in
//! destination clients.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use icalendar::{
    Alarm, Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, EventLike,
    Trigger,
};
use olsync_core::{local_to_utc, Event};

use crate::error::SyncError;

/// Summary used for events without a subject.
const NO_SUBJECT: &str = "No Subject";

/// Encoder options derived from the configuration.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Optional summary prefix, rendered as `[tag]`.
    pub tag: String,
    /// Whether to attach the -PT3M alarm in addition to -PT10M.
    pub include_second_reminder: bool,
}

/// Renders one event as a single-VEVENT iCalendar document.
#[must_use]
pub fn encode_event(event: &Event, uid: &str, options: &EncodeOptions) -> String {
    let summary = summary_of(event, options);

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(uid);
    ics_event.summary(&summary);

    if event.is_all_day {
        ics_event.starts(event.start_local.date());
        ics_event.ends(event.end_local.date());
    } else {
        ics_event.starts(event.start_utc);
        ics_event.ends(event.end_utc);

        ics_event.alarm(Alarm::display(
            &summary,
            Trigger::before_start(Duration::minutes(10)),
        ));
        if options.include_second_reminder {
            ics_event.alarm(Alarm::display(
                &summary,
                Trigger::before_start(Duration::minutes(3)),
            ));
        }
    }

    if !event.body.is_empty() {
        ics_event.description(&event.body);
    }
    if !event.location.is_empty() {
        ics_event.location(&event.location);
    }

    let mut calendar = Calendar::new();
    calendar.push(ics_event.done());
    calendar.done().to_string()
}

fn summary_of(event: &Event, options: &EncodeOptions) -> String {
    let subject = if event.subject.is_empty() {
        NO_SUBJECT
    } else {
        &event.subject
    };
    if options.tag.is_empty() {
        subject.to_string()
    } else {
        format!("[{}] {subject}", options.tag)
    }
}

/// A timestamp as read back from the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedTime {
    /// Date-valued (all-day).
    Date(NaiveDate),
    /// An absolute instant.
    Instant(DateTime<Utc>),
}

/// The verify-relevant fields of a fetched event document.
#[derive(Debug, Clone)]
pub struct ObservedEvent {
    /// SUMMARY, when present.
    pub summary: Option<String>,
    /// DTSTART.
    pub start: ObservedTime,
    /// DTEND, when present.
    pub end: Option<ObservedTime>,
}

impl ObservedEvent {
    /// Whether the observed document matches the desired event.
    ///
    /// Timed events compare instants within `tolerance`; all-day events
    /// compare whole days.
    #[must_use]
    pub fn matches(&self, desired: &Event, tolerance: Duration) -> bool {
        if desired.is_all_day {
            let start_ok = self.start == ObservedTime::Date(desired.start_local.date());
            let end_ok = match self.end {
                None => true,
                Some(end) => end == ObservedTime::Date(desired.end_local.date()),
            };
            return start_ok && end_ok;
        }

        let instant = |t: ObservedTime| match t {
            ObservedTime::Instant(dt) => Some(dt),
            ObservedTime::Date(_) => None,
        };
        let Some(start) = instant(self.start) else {
            return false;
        };
        if (start - desired.start_utc).abs() > tolerance {
            return false;
        }
        match self.end.and_then(instant) {
            Some(end) => (end - desired.end_utc).abs() <= tolerance,
            None => false,
        }
    }

    /// Whether the observed document is date-valued.
    #[must_use]
    pub fn is_all_day(&self) -> bool {
        matches!(self.start, ObservedTime::Date(_))
    }
}

/// Parses a fetched iCalendar document down to its verify-relevant fields.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] when the document does not parse or holds
/// no VEVENT with a DTSTART.
pub fn decode_event(ics: &str) -> Result<ObservedEvent, SyncError> {
    let calendar: Calendar = ics
        .parse()
        .map_err(|e: String| SyncError::Parse(format!("iCalendar parse error: {e}")))?;

    let event = calendar
        .components
        .iter()
        .find_map(|c| match c {
            CalendarComponent::Event(event) => Some(event),
            _ => None,
        })
        .ok_or_else(|| SyncError::Parse("document holds no VEVENT".to_string()))?;

    let start = event
        .get_start()
        .map(observed_time)
        .ok_or_else(|| SyncError::Parse("VEVENT has no DTSTART".to_string()))?;

    Ok(ObservedEvent {
        summary: event.get_summary().map(ToString::to_string),
        start,
        end: event.get_end().map(observed_time),
    })
}

fn observed_time(value: DatePerhapsTime) -> ObservedTime {
    match value {
        DatePerhapsTime::Date(date) => ObservedTime::Date(date),
        DatePerhapsTime::DateTime(dt) => match dt {
            CalendarDateTime::Utc(instant) => ObservedTime::Instant(instant),
            // We only ever write UTC; a floating time in a fetched copy is
            // read back as UTC.
            CalendarDateTime::Floating(naive) => ObservedTime::Instant(naive.and_utc()),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                if let Ok(tz) = tzid.parse::<Tz>() {
                    ObservedTime::Instant(local_to_utc(tz, date_time))
                } else {
                    tracing::warn!(tzid, "unknown TZID in fetched event, reading as UTC");
                    ObservedTime::Instant(date_time.and_utc())
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, TimeZone};

    use super::*;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn timed_event() -> Event {
        Event {
            subject: "Standup".to_string(),
            body: "Daily sync".to_string(),
            location: "Room 4".to_string(),
            start_local: naive(2025, 2, 3, 9, 0),
            end_local: naive(2025, 2, 3, 9, 30),
            start_utc: Utc.with_ymd_and_hms(2025, 2, 3, 8, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2025, 2, 3, 8, 30, 0).unwrap(),
            global_id: "G1".to_string(),
            is_all_day: false,
        }
    }

    fn all_day_event() -> Event {
        Event {
            subject: "Holiday".to_string(),
            body: String::new(),
            location: String::new(),
            start_local: naive(2025, 2, 10, 0, 0),
            end_local: naive(2025, 2, 11, 0, 0),
            start_utc: Utc.with_ymd_and_hms(2025, 2, 9, 23, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2025, 2, 10, 23, 0, 0).unwrap(),
            global_id: "G2".to_string(),
            is_all_day: true,
        }
    }

    #[test]
    fn timed_event_carries_utc_times_and_alarms() {
        let options = EncodeOptions {
            tag: String::new(),
            include_second_reminder: true,
        };
        let ics = encode_event(&timed_event(), "outlook-x-20250203T080000Z", &options);

        assert!(ics.contains("UID:outlook-x-20250203T080000Z"));
        assert!(ics.contains("SUMMARY:Standup"));
        assert!(ics.contains("DTSTART:20250203T080000Z"));
        assert!(ics.contains("DTEND:20250203T083000Z"));
        assert!(ics.contains("DESCRIPTION:Daily sync"));
        assert!(ics.contains("LOCATION:Room 4"));
        assert_eq!(ics.matches("BEGIN:VALARM").count(), 2);
        assert!(ics.contains("TRIGGER:-PT10M"));
        assert!(ics.contains("TRIGGER:-PT3M"));
    }

    #[test]
    fn second_reminder_is_configurable() {
        let options = EncodeOptions::default();
        let ics = encode_event(&timed_event(), "outlook-x-20250203T080000Z", &options);
        assert_eq!(ics.matches("BEGIN:VALARM").count(), 1);
        assert!(!ics.contains("TRIGGER:-PT3M"));
    }

    #[test]
    fn all_day_event_is_date_valued_without_alarms() {
        let options = EncodeOptions {
            tag: String::new(),
            include_second_reminder: true,
        };
        let ics = encode_event(&all_day_event(), "outlook-y-20250210T000000Z", &options);

        assert!(ics.contains("DTSTART;VALUE=DATE:20250210"));
        assert!(ics.contains("DTEND;VALUE=DATE:20250211"));
        assert!(!ics.contains("BEGIN:VALARM"));
    }

    #[test]
    fn tag_prefixes_summary() {
        let options = EncodeOptions {
            tag: "work".to_string(),
            include_second_reminder: true,
        };
        let ics = encode_event(&timed_event(), "u", &options);
        assert!(ics.contains("SUMMARY:[work] Standup"));
    }

    #[test]
    fn empty_subject_becomes_no_subject() {
        let mut event = timed_event();
        event.subject = String::new();
        let ics = encode_event(&event, "u", &EncodeOptions::default());
        assert!(ics.contains("SUMMARY:No Subject"));
    }

    #[test]
    fn timed_round_trip_preserves_instants() {
        let event = timed_event();
        let ics = encode_event(&event, "u", &EncodeOptions::default());
        let observed = decode_event(&ics).unwrap();

        assert_eq!(
            observed.start,
            ObservedTime::Instant(event.start_utc)
        );
        assert_eq!(
            observed.end,
            Some(ObservedTime::Instant(event.end_utc))
        );
        assert!(observed.matches(&event, Duration::zero()));
        assert!(!observed.is_all_day());
    }

    #[test]
    fn all_day_round_trip_preserves_days() {
        let event = all_day_event();
        let ics = encode_event(&event, "u", &EncodeOptions::default());
        let observed = decode_event(&ics).unwrap();

        assert!(observed.is_all_day());
        assert_eq!(
            observed.start,
            ObservedTime::Date(NaiveDate::from_ymd_opt(2025, 2, 10).unwrap())
        );
        assert!(observed.matches(&event, Duration::zero()));
    }

    #[test]
    fn matches_tolerates_small_timed_drift() {
        let event = timed_event();
        let observed = ObservedEvent {
            summary: Some("Standup".to_string()),
            start: ObservedTime::Instant(event.start_utc + Duration::seconds(90)),
            end: Some(ObservedTime::Instant(event.end_utc - Duration::seconds(90))),
        };
        assert!(observed.matches(&event, Duration::minutes(2)));
        assert!(!observed.matches(&event, Duration::minutes(1)));
    }

    #[test]
    fn all_day_mismatch_is_detected() {
        let event = all_day_event();
        let observed = ObservedEvent {
            summary: None,
            start: ObservedTime::Date(NaiveDate::from_ymd_opt(2025, 2, 11).unwrap()),
            end: None,
        };
        assert!(!observed.matches(&event, Duration::minutes(2)));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_event("not a calendar").is_err());
    }

    #[test]
    fn decode_rejects_event_without_dtstart() {
        let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:u\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(decode_event(ics).is_err());
    }
}
