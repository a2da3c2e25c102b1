// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The bridge proper: attach state machine, call-layer retries and the
//! overall fetch deadline.
//!
//! Attach sequence (all on the worker thread): probe the host process and
//! launch it when absent, polling readiness for up to 30s at 1s intervals;
//! then create the automation instance, retrying the host's transient
//! "server execution failed" up to 3 times with 5s backoff; finally one
//! more probe-and-attach before the pass fails. The call layer repeats the
//! whole sequence up to five times with 10s waits. Every wait polls the
//! cancellation scope in sub-second slices.

use std::time::{Duration, Instant};

use olsync_core::{CancelToken, FetchWindow, RawAppointment};

use crate::error::BridgeError;
use crate::host::{AutomationHost, CalendarSession, ScopedSession};
use crate::worker::StaWorker;

/// Bridge timing knobs. [`Default`] carries the production values; tests
/// shrink them.
#[derive(Debug, Clone)]
pub struct BridgeTiming {
    /// How long to wait for a launched host to become ready.
    pub host_ready_timeout: Duration,
    /// Interval between host-ready probes.
    pub probe_interval: Duration,
    /// Instance-creation retries for "server execution failed".
    pub connect_retries: u32,
    /// Backoff between instance-creation retries.
    pub connect_backoff: Duration,
    /// Call-layer repetitions of the whole attach sequence.
    pub attach_attempts: u32,
    /// Wait between attach attempts.
    pub attach_backoff: Duration,
    /// Overall wall-clock deadline for one fetch.
    pub fetch_timeout: Duration,
}

impl Default for BridgeTiming {
    fn default() -> Self {
        Self {
            host_ready_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_secs(1),
            connect_retries: 3,
            connect_backoff: Duration::from_secs(5),
            attach_attempts: 5,
            attach_backoff: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

/// The source-host bridge.
///
/// Owns the affinitised worker; `fetch_appointments` is the only operation
/// the supervisor needs.
#[derive(Debug)]
pub struct OutlookBridge {
    worker: StaWorker,
    timing: BridgeTiming,
}

impl OutlookBridge {
    /// Creates a bridge over the given host with production timing.
    ///
    /// # Errors
    ///
    /// Returns an error when the worker thread cannot be spawned.
    pub fn new(host: Box<dyn AutomationHost>) -> Result<Self, BridgeError> {
        Self::with_timing(host, BridgeTiming::default())
    }

    /// Creates a bridge with explicit timing.
    ///
    /// # Errors
    ///
    /// Returns an error when the worker thread cannot be spawned.
    pub fn with_timing(
        host: Box<dyn AutomationHost>,
        timing: BridgeTiming,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            worker: StaWorker::spawn(host)?,
            timing,
        })
    }

    /// Fetches all appointments intersecting the window.
    ///
    /// Runs attach plus the read on the worker thread under the overall
    /// fetch deadline. The scope is polled by every wait inside the
    /// sequence.
    ///
    /// # Errors
    ///
    /// [`BridgeError::HostUnavailable`] after all retries,
    /// [`BridgeError::Timeout`] when the deadline elapses,
    /// [`BridgeError::Cancelled`] when the scope fires.
    pub async fn fetch_appointments(
        &self,
        window: FetchWindow,
        token: &CancelToken,
    ) -> Result<Vec<RawAppointment>, BridgeError> {
        let timing = self.timing.clone();
        let scope = token.clone();
        let call = self
            .worker
            .run(move |host| fetch_on_worker(host, &window, &timing, &scope));

        match tokio::time::timeout(self.timing.fetch_timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timing.fetch_timeout.as_secs(),
                    "source fetch deadline elapsed"
                );
                Err(BridgeError::Timeout)
            }
        }
    }
}

fn fetch_on_worker(
    host: &mut dyn AutomationHost,
    window: &FetchWindow,
    timing: &BridgeTiming,
    token: &CancelToken,
) -> Result<Vec<RawAppointment>, BridgeError> {
    let session = attach(host, timing, token)?;
    let mut session = ScopedSession::new(session);
    session.appointments(window)
}

/// Call-layer retry loop around the attach sequence.
fn attach(
    host: &mut dyn AutomationHost,
    timing: &BridgeTiming,
    token: &CancelToken,
) -> Result<Box<dyn CalendarSession>, BridgeError> {
    let mut last_error = None;
    for attempt in 1..=timing.attach_attempts.max(1) {
        token.check()?;
        match attach_once(host, timing, token) {
            Ok(session) => return Ok(session),
            Err(BridgeError::Cancelled) => return Err(BridgeError::Cancelled),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "attach attempt failed");
                last_error = Some(e);
            }
        }
        if attempt < timing.attach_attempts {
            blocking_sleep(timing.attach_backoff, timing.probe_interval, token)?;
        }
    }

    Err(BridgeError::HostUnavailable(
        last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string()),
    ))
}

/// One pass of the attach state machine.
fn attach_once(
    host: &mut dyn AutomationHost,
    timing: &BridgeTiming,
    token: &CancelToken,
) -> Result<Box<dyn CalendarSession>, BridgeError> {
    if !host.is_running() {
        host.launch()?;
        wait_until_running(host, timing, token)?;
    }

    let mut last_error = None;
    for retry in 0..timing.connect_retries.max(1) {
        token.check()?;
        match host.connect() {
            Ok(session) => return Ok(session),
            Err(BridgeError::ServerExecution(detail)) => {
                tracing::warn!(retry, detail, "instance creation hit server-execution failure");
                last_error = Some(BridgeError::ServerExecution(detail));
                blocking_sleep(timing.connect_backoff, timing.probe_interval, token)?;
            }
            Err(e) => {
                last_error = Some(e);
                break;
            }
        }
    }

    // One final probe-and-attach before giving up on this pass.
    token.check()?;
    if host.is_running() {
        host.connect()
    } else {
        Err(last_error
            .unwrap_or_else(|| BridgeError::HostUnavailable("host not running".to_string())))
    }
}

fn wait_until_running(
    host: &mut dyn AutomationHost,
    timing: &BridgeTiming,
    token: &CancelToken,
) -> Result<(), BridgeError> {
    let deadline = Instant::now() + timing.host_ready_timeout;
    loop {
        if host.is_running() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BridgeError::HostUnavailable(
                "host process did not become ready".to_string(),
            ));
        }
        blocking_sleep(timing.probe_interval, timing.probe_interval, token)?;
    }
}

/// Sleeps on the worker thread in slices so cancellation is observed
/// within one pacing interval.
fn blocking_sleep(
    total: Duration,
    slice: Duration,
    token: &CancelToken,
) -> Result<(), BridgeError> {
    let slice = slice.min(Duration::from_millis(250)).max(Duration::from_millis(1));
    let deadline = Instant::now() + total;
    loop {
        token.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(slice.min(deadline - now));
    }
}
