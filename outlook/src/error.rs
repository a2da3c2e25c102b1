// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use olsync_core::Cancelled;

/// Source-host bridge errors.
#[non_exhaustive]
#[derive(Debug)]
pub enum BridgeError {
    /// The host could not be attached after all retries.
    HostUnavailable(String),

    /// The host rejected instance creation with its transient
    /// "server execution failed" condition; retried with backoff.
    ServerExecution(String),

    /// Launching the host process failed.
    Launch(String),

    /// Any other automation-surface failure.
    Automation(String),

    /// The overall fetch deadline elapsed.
    Timeout,

    /// The surrounding scope was cancelled.
    Cancelled,

    /// The affinitised worker thread is gone.
    WorkerGone,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostUnavailable(detail) => write!(f, "automation host unavailable: {detail}"),
            Self::ServerExecution(detail) => write!(f, "server execution failed: {detail}"),
            Self::Launch(detail) => write!(f, "failed to launch automation host: {detail}"),
            Self::Automation(detail) => write!(f, "automation call failed: {detail}"),
            Self::Timeout => write!(f, "source fetch deadline elapsed"),
            Self::Cancelled => write!(f, "bridge call cancelled"),
            Self::WorkerGone => write!(f, "affinitised worker thread is gone"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<Cancelled> for BridgeError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
