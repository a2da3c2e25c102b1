// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use olsync_core::Cancelled;

/// `CalDAV` client errors.
#[non_exhaustive]
#[derive(Debug)]
pub enum CalDavError {
    /// Authentication rejected (HTTP 401/403). Never retried.
    Auth(u16),

    /// HTTP transport error.
    Http(String),

    /// Unexpected HTTP status.
    Status {
        /// The status code.
        status: u16,
        /// Response body excerpt.
        detail: String,
    },

    /// XML parsing/writing error.
    Xml(String),

    /// Structurally invalid response from the server.
    InvalidResponse(String),

    /// The surrounding scope was cancelled.
    Cancelled,
}

impl CalDavError {
    /// Whether this is an authentication failure (never retried, surfaced
    /// to the user).
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl fmt::Display for CalDavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(status) => write!(f, "authentication rejected (HTTP {status})"),
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Status { status, detail } => write!(f, "unexpected HTTP {status}: {detail}"),
            Self::Xml(e) => write!(f, "XML error: {e}"),
            Self::InvalidResponse(e) => write!(f, "invalid server response: {e}"),
            Self::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for CalDavError {}

impl From<reqwest::Error> for CalDavError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<quick_xml::Error> for CalDavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<std::io::Error> for CalDavError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(format!("IO error: {e}"))
    }
}

impl From<Cancelled> for CalDavError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
