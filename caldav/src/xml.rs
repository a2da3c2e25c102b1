// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML namespaces used in `WebDAV`/`CalDAV` processing.

/// XML namespaces used in `CalDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// CalendarServer extensions namespace (getctag).
    pub const CALENDARSERVER: &str = "http://calendarserver.org/ns/";
}
