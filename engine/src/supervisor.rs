// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The sync supervisor: periodic loop, mutual exclusion, cancellation
//! scopes, first-run wipe and manual full re-sync.
//!
//! Exactly one cycle runs at a time; the cycle lock is held for its whole
//! duration. Each cycle gets a fresh scope parented to the service scope,
//! so stopping the service cancels everything while
//! [`SyncService::trigger_full_resync`] can cancel just the in-flight
//! cycle before taking the lock itself.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use olsync_caldav::{CalDavClient, CalDavConfig};
use olsync_core::{
    sleep, CancelToken, Config, ExpansionWindow, FetchWindow, UidClassifier, ZonePair,
};
use olsync_outlook::{AutomationHost, BridgeError, BridgeTiming, OutlookBridge};

use crate::error::SyncError;
use crate::ics::EncodeOptions;
use crate::pipeline::{materialize, MaterializeParams};
use crate::reconcile::{ReconcileTuning, Reconciler};
use crate::status::{LifecycleLog, Milestone, StatusSink};

/// Supervisor timing knobs. [`Default`] carries the production values;
/// tests shrink them.
#[derive(Debug, Clone, Default)]
pub struct Tuning {
    /// Wait after a destructive wipe for destination caches to settle.
    pub settle_after_wipe: Option<StdDuration>,
    /// Reconciler knobs.
    pub reconcile: ReconcileTuning,
    /// Bridge knobs.
    pub bridge: BridgeTiming,
}

impl Tuning {
    fn settle(&self) -> StdDuration {
        self.settle_after_wipe
            .unwrap_or(StdDuration::from_secs(30))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleMode {
    Normal,
    FullResync,
}

/// The long-lived sync service.
///
/// Cheap to clone; every clone drives the same underlying service.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    zones: ZonePair,
    bridge: OutlookBridge,
    reconciler: Reconciler,
    status: Arc<dyn StatusSink>,
    lifecycle: Arc<dyn LifecycleLog>,
    settle_after_wipe: StdDuration,
    cycle_lock: tokio::sync::Mutex<()>,
    service_scope: CancelToken,
    cycle_scope: Mutex<CancelToken>,
    first_run_done: AtomicBool,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("source_id", &self.inner.config.source_id)
            .finish_non_exhaustive()
    }
}

impl SyncService {
    /// Builds the service with production tuning.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client or the worker thread cannot
    /// be created.
    pub fn new(
        config: Config,
        host: Box<dyn AutomationHost>,
        status: Arc<dyn StatusSink>,
        lifecycle: Arc<dyn LifecycleLog>,
    ) -> Result<Self, SyncError> {
        Self::with_tuning(config, host, status, lifecycle, Tuning::default())
    }

    /// Builds the service with explicit tuning.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client or the worker thread cannot
    /// be created.
    pub fn with_tuning(
        config: Config,
        host: Box<dyn AutomationHost>,
        status: Arc<dyn StatusSink>,
        lifecycle: Arc<dyn LifecycleLog>,
        tuning: Tuning,
    ) -> Result<Self, SyncError> {
        let zones = ZonePair::resolve(
            config.source_time_zone_id.as_deref(),
            config.target_time_zone_id.as_deref(),
        );

        let client = CalDavClient::new(CalDavConfig {
            base_url: config.icloud_caldav_url.clone(),
            principal_id: config.principal_id.clone(),
            calendar_id: config.work_calendar_id.clone(),
            username: config.icloud_user.clone(),
            password: config.icloud_password.clone(),
            ..CalDavConfig::default()
        })?;

        let classifier = UidClassifier::new(&config.source_id);
        let reconciler = Reconciler::new(
            client,
            classifier,
            EncodeOptions {
                tag: config.event_tag.clone(),
                include_second_reminder: config.include_second_reminder,
            },
            Arc::clone(&status),
            tuning.reconcile.clone(),
        );

        let bridge = OutlookBridge::with_timing(host, tuning.bridge.clone())?;

        let service_scope = CancelToken::new();
        let cycle_scope = Mutex::new(service_scope.child());
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                zones,
                bridge,
                reconciler,
                status,
                lifecycle,
                settle_after_wipe: tuning.settle(),
                cycle_lock: tokio::sync::Mutex::new(()),
                service_scope,
                cycle_scope,
                first_run_done: AtomicBool::new(false),
            }),
        })
    }

    /// Cancels the service scope; `run` returns after the in-flight cycle
    /// unwinds.
    pub fn shutdown(&self) {
        self.inner.service_scope.cancel();
    }

    /// Background execution; returns only once the service scope is
    /// cancelled.
    pub async fn run(&self) {
        let inner = &self.inner;
        inner
            .lifecycle
            .record(Milestone::ServiceStarted, "sync loop entered");

        let initial = StdDuration::from_secs(inner.config.initial_wait_seconds);
        if sleep(initial, &inner.service_scope).await.is_ok() {
            let interval = StdDuration::from_secs(inner.config.sync_interval_minutes * 60);
            loop {
                if inner.service_scope.is_cancelled() {
                    break;
                }
                self.execute_cycle(CycleMode::Normal).await;
                if sleep(interval, &inner.service_scope).await.is_err() {
                    break;
                }
            }
        }

        inner
            .lifecycle
            .record(Milestone::ServiceStopped, "sync loop left");
    }

    /// Runs exactly one cycle under the lock. Useful for manual runs.
    pub async fn run_once(&self) {
        self.execute_cycle(CycleMode::Normal).await;
    }

    /// Cancels any in-flight cycle, waits for the lock, then runs an
    /// unfiltered wipe followed by a normal reconciliation.
    pub async fn trigger_full_resync(&self) {
        self.current_cycle_scope().cancel();
        self.execute_cycle(CycleMode::FullResync).await;
    }

    fn current_cycle_scope(&self) -> CancelToken {
        self.inner
            .cycle_scope
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn install_cycle_scope(&self) -> CancelToken {
        let scope = self.inner.service_scope.child();
        *self
            .inner
            .cycle_scope
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = scope.clone();
        scope
    }

    async fn execute_cycle(&self, mode: CycleMode) {
        let scope = self.install_cycle_scope();
        let _guard = self.inner.cycle_lock.lock().await;

        match self.cycle(&scope, mode).await {
            Ok(()) => {}
            Err(SyncError::Cancelled) => {
                if self.inner.service_scope.is_cancelled() {
                    tracing::info!("cycle cancelled by service stop");
                } else {
                    tracing::info!("cycle cancelled, a new cycle takes over");
                }
            }
            Err(SyncError::Auth(detail)) => {
                tracing::error!(detail, "authentication failure, cycle aborted");
                self.inner.status.notify_auth_failure(&detail);
                self.inner.lifecycle.record(Milestone::AuthFailure, &detail);
            }
            Err(e) => {
                // The loop continues; the next cycle converges.
                tracing::error!(error = %e, "cycle failed");
            }
        }

        self.inner.status.set_idle();
    }

    async fn cycle(&self, scope: &CancelToken, mode: CycleMode) -> Result<(), SyncError> {
        let inner = &self.inner;
        scope.check().map_err(SyncError::from)?;
        inner.status.set_updating();

        match mode {
            CycleMode::FullResync => {
                inner.reconciler.wipe(false, scope).await?;
                sleep(inner.settle_after_wipe, scope).await?;
                inner.first_run_done.store(true, Ordering::SeqCst);
            }
            CycleMode::Normal => {
                if !inner.first_run_done.load(Ordering::SeqCst) {
                    inner.reconciler.wipe(true, scope).await?;
                    sleep(inner.settle_after_wipe, scope).await?;
                    inner.first_run_done.store(true, Ordering::SeqCst);
                }
            }
        }

        inner.status.set_updating();

        let (window, expansion) = self.windows();
        let appointments = match inner.bridge.fetch_appointments(window, scope).await {
            Ok(appointments) => appointments,
            Err(BridgeError::Timeout) => return Err(SyncError::TimedOut),
            Err(BridgeError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) => {
                // A source outage is not an empty calendar: without data
                // the stale reap would delete every managed entry, so the
                // cycle ends here and the destination stays untouched.
                tracing::warn!(error = %e, "source host unavailable, skipping reconciliation");
                return Ok(());
            }
        };

        let desired = materialize(
            &appointments,
            &MaterializeParams {
                zones: inner.zones,
                source_id: inner.config.source_id.clone(),
                window,
                expansion,
            },
        );

        let current = match inner.reconciler.snapshot(true, scope).await {
            Ok(current) => current,
            Err(SyncError::Parse(detail)) => {
                tracing::warn!(detail, "enumeration unparsable, proceeding with empty snapshot");
                inner.lifecycle.record(Milestone::ParseFailure, &detail);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        let stats = inner.reconciler.reconcile(&desired, &current, scope).await?;
        tracing::info!(
            desired = desired.len(),
            deleted = stats.deleted,
            uploaded = stats.uploaded,
            verified = stats.verified,
            corrected = stats.corrected,
            failed = stats.failed,
            "cycle finished"
        );
        Ok(())
    }

    fn windows(&self) -> (FetchWindow, ExpansionWindow) {
        let config = &self.inner.config;
        let now = Utc::now();
        let window = FetchWindow {
            from: now - Duration::days(config.sync_days_into_past),
            to: now + Duration::days(config.sync_days_into_future),
        };
        let expansion = ExpansionWindow {
            from: window.from - Duration::days(config.recurrence_expansion_days_past),
            to: window.to + Duration::days(config.recurrence_expansion_days_future),
        };
        (window, expansion)
    }
}
