// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::{Path, PathBuf};

/// The name of the configuration document, discovered next to the executable.
pub const CONFIG_FILE_NAME: &str = "olsync.json";

/// Configuration for the olsync daemon.
///
/// Key names follow the configuration document verbatim; everything except
/// the CalDAV endpoint and credentials has a default.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Base URL of the CalDAV service.
    #[serde(rename = "ICloudCalDavUrl")]
    pub icloud_caldav_url: String,

    /// Basic-auth user.
    #[serde(rename = "ICloudUser")]
    pub icloud_user: String,

    /// Basic-auth password (app-specific).
    #[serde(rename = "ICloudPassword")]
    pub icloud_password: String,

    /// Principal path segment.
    #[serde(rename = "PrincipalId")]
    pub principal_id: String,

    /// Calendar collection id.
    #[serde(rename = "WorkCalendarId")]
    pub work_calendar_id: String,

    /// Delay before the first cycle, in seconds.
    #[serde(rename = "InitialWaitSeconds", default = "default_initial_wait")]
    pub initial_wait_seconds: u64,

    /// Inter-cycle interval, in minutes.
    #[serde(rename = "SyncIntervalMinutes", default = "default_sync_interval")]
    pub sync_interval_minutes: u64,

    /// Forward sync window, in days.
    #[serde(rename = "SyncDaysIntoFuture", default = "default_window_days")]
    pub sync_days_into_future: i64,

    /// Backward sync window, in days.
    #[serde(rename = "SyncDaysIntoPast", default = "default_window_days")]
    pub sync_days_into_past: i64,

    /// Backward inflation of the recurrence expansion window, in days.
    #[serde(rename = "RecurrenceExpansionDaysPast", default = "default_window_days")]
    pub recurrence_expansion_days_past: i64,

    /// Forward inflation of the recurrence expansion window, in days.
    #[serde(rename = "RecurrenceExpansionDaysFuture", default = "default_window_days")]
    pub recurrence_expansion_days_future: i64,

    /// Instance tag woven into managed UIDs.
    #[serde(rename = "SourceId", default)]
    pub source_id: String,

    /// Optional summary prefix, rendered as `[tag]`.
    #[serde(rename = "EventTag", default)]
    pub event_tag: String,

    /// Source time zone id (IANA or platform-named); host-local when unset.
    #[serde(rename = "SourceTimeZoneId", default)]
    pub source_time_zone_id: Option<String>,

    /// Target time zone id (IANA or platform-named); host-local when unset.
    #[serde(rename = "TargetTimeZoneId", default)]
    pub target_time_zone_id: Option<String>,

    /// Whether to attach the second (-PT3M) display alarm.
    #[serde(rename = "IncludeSecondReminder", default = "default_true")]
    pub include_second_reminder: bool,

    /// Log sink level.
    #[serde(rename = "LogLevel", default)]
    pub log_level: LogLevel,
}

const fn default_initial_wait() -> u64 {
    60
}

const fn default_sync_interval() -> u64 {
    3
}

const fn default_window_days() -> i64 {
    30
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Loads the configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the configuration document path next to the executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be determined.
    pub fn discover() -> Result<PathBuf, ConfigError> {
        let exe = std::env::current_exe()
            .map_err(|e| ConfigError::Io(PathBuf::from(CONFIG_FILE_NAME), e.to_string()))?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(CONFIG_FILE_NAME))
    }

    /// The destination calendar collection URL, with a trailing slash.
    #[must_use]
    pub fn calendar_url(&self) -> String {
        format!(
            "{}/{}/calendars/{}/",
            self.icloud_caldav_url.trim_end_matches('/'),
            self.principal_id,
            self.work_calendar_id
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (value, key) in [
            (&self.icloud_caldav_url, "ICloudCalDavUrl"),
            (&self.icloud_user, "ICloudUser"),
            (&self.icloud_password, "ICloudPassword"),
            (&self.principal_id, "PrincipalId"),
            (&self.work_calendar_id, "WorkCalendarId"),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }
        Ok(())
    }
}

/// Log sink level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub enum LogLevel {
    /// Errors only.
    #[serde(alias = "error")]
    Error,
    /// Warnings and errors.
    #[serde(alias = "warn", alias = "Warning", alias = "warning")]
    Warn,
    /// Informational (default).
    #[default]
    #[serde(alias = "info")]
    Info,
    /// Debugging detail.
    #[serde(alias = "debug")]
    Debug,
    /// Everything.
    #[serde(alias = "trace")]
    Trace,
}

impl LogLevel {
    /// The level as a `tracing` filter directive.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Configuration errors.
#[non_exhaustive]
#[derive(Debug)]
pub enum ConfigError {
    /// The document could not be read.
    Io(PathBuf, String),

    /// The document could not be parsed.
    Parse(String),

    /// A required key is missing or empty.
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "failed to read {}: {e}", path.display()),
            Self::Parse(e) => write!(f, "invalid configuration document: {e}"),
            Self::Missing(key) => write!(f, "missing required configuration key: {key}"),
        }
    }
}

impl std::error::Error for ConfigError {}
