// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Raw source calendar model, as reported by the automation host.
//!
//! These types mirror the shape of the source application's appointment
//! objects: timestamps may be missing or mutually inconsistent, recurrence
//! arrives as a pattern descriptor rather than a rule string, and series
//! exceptions carry the original date plus an optional replacement item.
//! The normalizer and expander turn them into atomic [`crate::Event`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};

/// The window appointments are fetched for, in absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// Inclusive lower bound.
    pub from: DateTime<Utc>,
    /// Inclusive upper bound.
    pub to: DateTime<Utc>,
}

/// A raw appointment as read from the source calendar folder.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct RawAppointment {
    /// Appointment subject. May be empty.
    #[serde(default)]
    pub subject: String,

    /// Appointment body text.
    #[serde(default)]
    pub body: String,

    /// Appointment location.
    #[serde(default)]
    pub location: String,

    /// Stable identifier of the appointment or series.
    #[serde(default)]
    pub global_id: String,

    /// Start wall-clock time in the source zone, when reported.
    #[serde(default)]
    pub start_local: Option<NaiveDateTime>,

    /// End wall-clock time in the source zone, when reported.
    #[serde(default)]
    pub end_local: Option<NaiveDateTime>,

    /// Start instant, when reported.
    #[serde(default)]
    pub start_utc: Option<DateTime<Utc>>,

    /// End instant, when reported.
    #[serde(default)]
    pub end_utc: Option<DateTime<Utc>>,

    /// Whether the source flags the appointment as all-day.
    #[serde(default)]
    pub is_all_day: bool,

    /// Whether the appointment is cancelled. Cancelled items are skipped.
    #[serde(default)]
    pub is_cancelled: bool,

    /// Recurrence descriptor for series masters.
    #[serde(default)]
    pub series: Option<SeriesDescriptor>,
}

/// Recurrence pattern of a series master.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct SeriesDescriptor {
    /// Pattern frequency.
    pub frequency: Frequency,

    /// Interval between pattern steps, in units of the frequency.
    #[serde(default = "default_interval")]
    pub interval: u32,

    /// Day-of-week set for weekly and nth-instance patterns.
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,

    /// Day of month for monthly/yearly patterns.
    #[serde(default)]
    pub day_of_month: Option<u32>,

    /// Month of year (1-12) for yearly patterns.
    #[serde(default)]
    pub month_of_year: Option<u32>,

    /// Nth instance (1..=5) for nth-instance patterns; 5 means "last".
    #[serde(default)]
    pub instance: Option<u8>,

    /// How the series terminates.
    #[serde(default)]
    pub termination: Termination,

    /// Pattern-level start time of day, when reported.
    #[serde(default)]
    pub pattern_start_time: Option<NaiveTime>,

    /// Pattern-level end time of day, when reported.
    #[serde(default)]
    pub pattern_end_time: Option<NaiveTime>,

    /// Series exceptions: removed or overridden occurrences.
    #[serde(default)]
    pub exceptions: Vec<SeriesException>,
}

const fn default_interval() -> u32 {
    1
}

/// Pattern frequency of a recurrence descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum Frequency {
    /// Every `interval` days.
    Daily,
    /// Every `interval` weeks on the masked weekdays.
    Weekly,
    /// Every `interval` months on `day_of_month`.
    Monthly,
    /// Every `interval` months on the nth masked weekday.
    MonthlyNth,
    /// Every `interval` years on `month_of_year`/`day_of_month`.
    Yearly,
    /// Every `interval` years on the nth masked weekday of `month_of_year`.
    YearlyNth,
}

/// How a series terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum Termination {
    /// No end.
    #[default]
    Never,
    /// Ends after a fixed number of occurrences.
    AfterOccurrences(u32),
    /// Ends on a date (inclusive, source-local).
    UntilDate(NaiveDate),
}

/// A series exception.
///
/// The original date always lands in the skip-set; when a replacement is
/// present the occurrence was moved or edited, otherwise it was deleted.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct SeriesException {
    /// Source-local date of the occurrence this exception replaces.
    pub original_date: NaiveDate,

    /// The overriding instance, when the occurrence was not deleted.
    #[serde(default)]
    pub replacement: Option<RawAppointment>,
}
