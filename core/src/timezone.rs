// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Named-zone resolution and wall-clock/UTC conversion.
//!
//! Zone ids from the configuration may be IANA names or the platform-style
//! display names the source application reports. Unknown ids fall back to
//! the host zone with a warning; zone resolution never fails a cycle.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Platform-named zones the source application is known to report, mapped
/// to their IANA equivalents. Not exhaustive; unknown names fall back to
/// the host zone.
const PLATFORM_ZONE_ALIASES: &[(&str, &str)] = &[
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("Central Standard Time", "America/Chicago"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Eastern Standard Time", "America/New_York"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("India Standard Time", "Asia/Kolkata"),
    ("Mountain Standard Time", "America/Denver"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("W. Europe Standard Time", "Europe/Berlin"),
];

/// The source and target zones a cycle operates under.
#[derive(Debug, Clone, Copy)]
pub struct ZonePair {
    /// Zone the source application reports wall-clock times in.
    pub source: Tz,
    /// Zone of the destination calendar.
    pub target: Tz,
}

impl ZonePair {
    /// Resolves both zones from optional configured ids.
    #[must_use]
    pub fn resolve(source_id: Option<&str>, target_id: Option<&str>) -> Self {
        Self {
            source: resolve_zone(source_id),
            target: resolve_zone(target_id),
        }
    }

    /// Whether source and target name the same zone.
    #[must_use]
    pub fn same_zone(&self) -> bool {
        self.source.name() == self.target.name()
    }
}

/// Resolves a configured zone id, falling back to the host zone.
///
/// Accepts IANA ids directly and translates known platform display names.
/// Unknown ids are logged and resolved to the host zone.
#[must_use]
pub fn resolve_zone(id: Option<&str>) -> Tz {
    let Some(id) = id.map(str::trim).filter(|s| !s.is_empty()) else {
        return host_zone();
    };

    if let Ok(tz) = id.parse::<Tz>() {
        return tz;
    }

    if let Some((_, iana)) = PLATFORM_ZONE_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(id))
    {
        if let Ok(tz) = iana.parse::<Tz>() {
            return tz;
        }
    }

    let fallback = host_zone();
    tracing::warn!(zone = id, fallback = fallback.name(), "unknown time zone id, using host zone");
    fallback
}

/// The host's local zone, or UTC when it cannot be determined.
#[must_use]
pub fn host_zone() -> Tz {
    match iana_time_zone::get_timezone() {
        Ok(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(zone = name, "host zone is not a known IANA zone, using UTC");
            Tz::UTC
        }),
        Err(e) => {
            tracing::warn!(error = %e, "failed to determine host zone, using UTC");
            Tz::UTC
        }
    }
}

/// Converts a source-zone wall-clock time to an absolute instant.
///
/// Ambiguous times (clocks rolled back) resolve to the earlier instant;
/// times inside a spring-forward gap are shifted past the gap.
#[must_use]
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Inside a DST gap. Retry one hour later, which lands on the
            // far side of any standard transition.
            let shifted = local + Duration::hours(1);
            tracing::warn!(%local, zone = tz.name(), "wall-clock time inside a DST gap, shifting");
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                    dt.with_timezone(&Utc)
                }
                LocalResult::None => Utc.from_utc_datetime(&local),
            }
        }
    }
}

/// Converts an absolute instant to a wall-clock time in `tz`.
#[must_use]
pub fn utc_to_local(tz: Tz, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// Whether two wall-clock times differ by at most `tolerance`.
#[must_use]
pub fn within_tolerance(a: NaiveDateTime, b: NaiveDateTime, tolerance: Duration) -> bool {
    (a - b).abs() <= tolerance
}
