// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Contracts for the user-facing collaborators.
//!
//! The tray surface and the system event-log writer live outside the core;
//! the engine only consumes these traits. The default implementations
//! route everything through `tracing`, so a headless deployment still gets
//! a coherent record.

/// Maximum tooltip length the tray surface accepts.
const TOOLTIP_MAX_CHARS: usize = 63;

/// The tray status surface consumed by the engine.
///
/// `update_text` receives at most 63 characters; use [`clamp_tooltip`]
/// when composing free-form text.
pub trait StatusSink: Send + Sync {
    /// The service is idle between cycles.
    fn set_idle(&self);
    /// A cycle is uploading changes.
    fn set_updating(&self);
    /// A destructive wipe is in progress.
    fn set_deleting(&self);
    /// Updates the tooltip text.
    fn update_text(&self, text: &str);
    /// Raises the modal authentication-failure notice.
    fn notify_auth_failure(&self, detail: &str);
}

/// Clamps free-form text to the tray tooltip limit.
#[must_use]
pub fn clamp_tooltip(text: &str) -> String {
    text.chars().take(TOOLTIP_MAX_CHARS).collect()
}

/// Status sink that logs state transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn set_idle(&self) {
        tracing::debug!(state = "idle", "status changed");
    }

    fn set_updating(&self) {
        tracing::debug!(state = "updating", "status changed");
    }

    fn set_deleting(&self) {
        tracing::debug!(state = "deleting", "status changed");
    }

    fn update_text(&self, text: &str) {
        tracing::debug!(text, "status text");
    }

    fn notify_auth_failure(&self, detail: &str) {
        tracing::error!(detail, "authentication failure reported to user");
    }
}

/// Lifecycle milestones mirrored to the system event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    /// The service entered its loop.
    ServiceStarted,
    /// The service left its loop.
    ServiceStopped,
    /// The destination rejected our credentials.
    AuthFailure,
    /// A response or document failed to parse.
    ParseFailure,
}

/// The system event-log writer consumed by the engine.
pub trait LifecycleLog: Send + Sync {
    /// Records one milestone.
    fn record(&self, milestone: Milestone, detail: &str);
}

/// Lifecycle log backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLifecycle;

impl LifecycleLog for LogLifecycle {
    fn record(&self, milestone: Milestone, detail: &str) {
        match milestone {
            Milestone::ServiceStarted | Milestone::ServiceStopped => {
                tracing::info!(?milestone, detail, "lifecycle milestone");
            }
            Milestone::AuthFailure | Milestone::ParseFailure => {
                tracing::error!(?milestone, detail, "lifecycle milestone");
            }
        }
    }
}
