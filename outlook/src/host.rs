// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The automation-host contract and session discipline.

use std::panic::{catch_unwind, AssertUnwindSafe};

use olsync_core::{FetchWindow, RawAppointment};

use crate::error::BridgeError;

/// The source application's automation surface.
///
/// Implementations wrap the platform component-object machinery plus the
/// process helpers that locate and start the host executable. Every method
/// is invoked on the bridge's affinitised worker thread, never concurrently.
pub trait AutomationHost: Send + 'static {
    /// Runs once on the worker thread before any other call; the place to
    /// declare apartment affinity.
    fn init_thread(&mut self) {}

    /// Whether a host process is currently running and reachable.
    fn is_running(&mut self) -> bool;

    /// Starts the host process. Returns once the process has been spawned;
    /// readiness is probed separately.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be started.
    fn launch(&mut self) -> Result<(), BridgeError>;

    /// Creates an automation instance and opens the calendar folder.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ServerExecution`] for the host's transient
    /// instance-creation failure (retried with backoff), any other error
    /// kind otherwise.
    fn connect(&mut self) -> Result<Box<dyn CalendarSession>, BridgeError>;
}

/// An open calendar session on the automation host.
///
/// Implementations hold the chain of native handles (application,
/// namespace, folder, items) and must release them in reverse-acquisition
/// order from [`release`](Self::release).
pub trait CalendarSession {
    /// Reads all appointments intersecting the window. Finite and
    /// non-streamed; the bridge enforces the overall deadline.
    ///
    /// # Errors
    ///
    /// Returns an error when the automation surface fails mid-read.
    fn appointments(&mut self, window: &FetchWindow) -> Result<Vec<RawAppointment>, BridgeError>;

    /// Releases every native handle, in reverse-acquisition order.
    fn release(&mut self);
}

/// Scope guard for a [`CalendarSession`].
///
/// Guarantees `release` runs exactly once when the scope ends, and that a
/// panicking release never crosses the bridge boundary.
pub struct ScopedSession {
    inner: Option<Box<dyn CalendarSession>>,
}

impl ScopedSession {
    /// Wraps a session.
    #[must_use]
    pub fn new(session: Box<dyn CalendarSession>) -> Self {
        Self {
            inner: Some(session),
        }
    }

    /// Reads all appointments intersecting the window.
    ///
    /// # Errors
    ///
    /// Propagates the session's error.
    pub fn appointments(
        &mut self,
        window: &FetchWindow,
    ) -> Result<Vec<RawAppointment>, BridgeError> {
        match self.inner.as_mut() {
            Some(session) => session.appointments(window),
            None => Err(BridgeError::WorkerGone),
        }
    }
}

impl std::fmt::Debug for ScopedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSession")
            .field("open", &self.inner.is_some())
            .finish()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Some(mut session) = self.inner.take() {
            let result = catch_unwind(AssertUnwindSafe(move || session.release()));
            if result.is_err() {
                tracing::warn!("session release panicked, handles may leak");
            }
        }
    }
}

/// Placeholder host for platforms without an automation surface.
///
/// Never reports the host as running and refuses to launch, so every fetch
/// resolves to the host-unavailable path and the supervisor's no-data
/// handling keeps the destination untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableHost;

impl AutomationHost for UnavailableHost {
    fn is_running(&mut self) -> bool {
        false
    }

    fn launch(&mut self) -> Result<(), BridgeError> {
        Err(BridgeError::Launch(
            "no automation host on this platform".to_string(),
        ))
    }

    fn connect(&mut self) -> Result<Box<dyn CalendarSession>, BridgeError> {
        Err(BridgeError::HostUnavailable(
            "no automation host on this platform".to_string(),
        ))
    }
}
