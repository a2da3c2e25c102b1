// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use olsync_caldav::CalDavError;
use olsync_core::Cancelled;
use olsync_outlook::BridgeError;

/// Cycle-level error taxonomy.
///
/// Propagation policy: `Network` and `Parse` are recovered locally and
/// rarely reach the supervisor; `Auth`, `TimedOut` and `HostUnavailable`
/// abort the cycle but not the loop; `Cancelled` aborts the cycle and,
/// when the service scope fired, the loop.
#[non_exhaustive]
#[derive(Debug)]
pub enum SyncError {
    /// The destination rejected our credentials. Surfaced to the user.
    Auth(String),

    /// A cancellation scope fired.
    Cancelled,

    /// The source fetch exceeded its deadline.
    TimedOut,

    /// The source automation host could not be attached.
    HostUnavailable(String),

    /// A non-auth HTTP failure that survived the retry.
    Network(String),

    /// A malformed PROPFIND response or iCalendar document.
    Parse(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(detail) => write!(f, "authentication failed: {detail}"),
            Self::Cancelled => write!(f, "cycle cancelled"),
            Self::TimedOut => write!(f, "source fetch timed out"),
            Self::HostUnavailable(detail) => write!(f, "source host unavailable: {detail}"),
            Self::Network(detail) => write!(f, "network failure: {detail}"),
            Self::Parse(detail) => write!(f, "parse failure: {detail}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<CalDavError> for SyncError {
    fn from(e: CalDavError) -> Self {
        match e {
            CalDavError::Auth(status) => Self::Auth(format!("HTTP {status}")),
            CalDavError::Cancelled => Self::Cancelled,
            CalDavError::Xml(detail) | CalDavError::InvalidResponse(detail) => Self::Parse(detail),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<BridgeError> for SyncError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Timeout => Self::TimedOut,
            BridgeError::Cancelled => Self::Cancelled,
            other => Self::HostUnavailable(other.to_string()),
        }
    }
}

impl From<Cancelled> for SyncError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
