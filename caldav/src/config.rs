// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// `CalDAV` endpoint configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CalDavConfig {
    /// Base URL of the `CalDAV` service.
    pub base_url: String,
    /// Principal path segment.
    pub principal_id: String,
    /// Calendar collection id.
    pub calendar_id: String,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Delay before the single transient-failure retry, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout() -> u64 {
    30
}

const fn default_retry_delay() -> u64 {
    5
}

fn default_user_agent() -> String {
    concat!("olsync/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            principal_id: String::new(),
            calendar_id: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout(),
            retry_delay_secs: default_retry_delay(),
            user_agent: default_user_agent(),
        }
    }
}

impl CalDavConfig {
    /// The calendar collection URL, with a trailing slash.
    #[must_use]
    pub fn calendar_url(&self) -> String {
        format!(
            "{}/{}/calendars/{}/",
            self.base_url.trim_end_matches('/'),
            self.principal_id,
            self.calendar_id
        )
    }

    /// The resource URL for one event.
    #[must_use]
    pub fn event_url(&self, uid: &str) -> String {
        format!("{}{uid}.ics", self.calendar_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_collection_and_event_urls() {
        let config = CalDavConfig {
            base_url: "https://caldav.icloud.com/".to_string(),
            principal_id: "123456".to_string(),
            calendar_id: "work".to_string(),
            ..CalDavConfig::default()
        };
        assert_eq!(
            config.calendar_url(),
            "https://caldav.icloud.com/123456/calendars/work/"
        );
        assert_eq!(
            config.event_url("outlook-abc-20250101T000000Z"),
            "https://caldav.icloud.com/123456/calendars/work/outlook-abc-20250101T000000Z.ics"
        );
    }
}
