// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The reconciler: converges the destination collection onto the desired
//! set.
//!
//! Phase A deletes stale managed entries; Phase B upserts every desired
//! event and verifies each write by fetching it back, with one corrective
//! re-PUT on mismatch. Phase A always completes before the first PUT.
//! Only entries recognised as managed are ever deleted.

use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use chrono::Duration;
use olsync_caldav::{CalDavClient, ETag};
use olsync_core::{sleep, CancelToken, Event, UidClassifier};

use crate::error::SyncError;
use crate::ics::{decode_event, encode_event, EncodeOptions};
use crate::status::{clamp_tooltip, StatusSink};

/// Reconciler timing and tolerance knobs. [`Default`] carries the
/// production values; tests shrink them.
#[derive(Debug, Clone)]
pub struct ReconcileTuning {
    /// Pause before each DELETE during a wipe.
    pub wipe_pacing: StdDuration,
    /// Backoff after a failed wipe DELETE.
    pub wipe_error_backoff: StdDuration,
    /// Verify tolerance for timed events.
    pub timed_tolerance: Duration,
}

impl Default for ReconcileTuning {
    fn default() -> Self {
        Self {
            wipe_pacing: StdDuration::from_millis(300),
            wipe_error_backoff: StdDuration::from_secs(5),
            timed_tolerance: Duration::minutes(2),
        }
    }
}

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Stale entries deleted in Phase A.
    pub deleted: usize,
    /// Events uploaded in Phase B.
    pub uploaded: usize,
    /// Uploads that verified clean on the first read-back.
    pub verified: usize,
    /// Uploads that needed the corrective re-PUT.
    pub corrected: usize,
    /// Events that still mismatched (or failed) after the correction.
    pub failed: usize,
}

/// Converges the destination calendar onto the desired event set.
pub struct Reconciler {
    client: CalDavClient,
    classifier: UidClassifier,
    encode_options: EncodeOptions,
    status: std::sync::Arc<dyn StatusSink>,
    tuning: ReconcileTuning,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("classifier", &self.classifier)
            .field("tuning", &self.tuning)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        client: CalDavClient,
        classifier: UidClassifier,
        encode_options: EncodeOptions,
        status: std::sync::Arc<dyn StatusSink>,
        tuning: ReconcileTuning,
    ) -> Self {
        Self {
            client,
            classifier,
            encode_options,
            status,
            tuning,
        }
    }

    /// Enumerates the destination into a `uid → etag` snapshot.
    ///
    /// The etags are carried for a future conditional-upsert path; they do
    /// not drive writes today.
    ///
    /// # Errors
    ///
    /// Propagates client errors; the caller decides whether a parse
    /// failure degrades to an empty snapshot.
    pub async fn snapshot(
        &self,
        filter_managed: bool,
        token: &CancelToken,
    ) -> Result<BTreeMap<String, ETag>, SyncError> {
        let classifier = filter_managed.then_some(&self.classifier);
        Ok(self.client.enumerate(classifier, token).await?)
    }

    /// Runs one reconciliation pass: stale reap, then upsert-and-verify.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Auth`] as soon as the destination rejects
    /// credentials (no further requests are issued) and
    /// [`SyncError::Cancelled`] when the scope fires. Transient failures
    /// on individual entries are logged and skipped.
    pub async fn reconcile(
        &self,
        desired: &BTreeMap<String, Event>,
        current: &BTreeMap<String, ETag>,
        token: &CancelToken,
    ) -> Result<ReconcileStats, SyncError> {
        let mut stats = ReconcileStats::default();

        // Phase A: stale reap. Never touches entries that fail the managed
        // classification, whatever the snapshot was built from.
        for uid in current.keys() {
            token.check().map_err(SyncError::from)?;
            if desired.contains_key(uid) || !self.classifier.is_managed(uid) {
                continue;
            }
            match self.client.delete_event(uid, token).await {
                Ok(()) => {
                    tracing::info!(uid, "deleted stale destination entry");
                    stats.deleted += 1;
                }
                Err(e) if e.is_auth() => return Err(e.into()),
                Err(olsync_caldav::CalDavError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    tracing::warn!(uid, error = %e, "failed to delete stale entry, moving on");
                }
            }
        }

        // Phase B: upsert and verify, in deterministic UID order.
        let total = desired.len();
        for (index, (uid, event)) in desired.iter().enumerate() {
            token.check().map_err(SyncError::from)?;
            self.progress(index + 1, total);

            let body = encode_event(event, uid, &self.encode_options);
            match self.client.put_event(uid, body.clone(), token).await {
                Ok(()) => stats.uploaded += 1,
                Err(e) if e.is_auth() => return Err(e.into()),
                Err(olsync_caldav::CalDavError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    tracing::warn!(uid, error = %e, "upload failed, moving on");
                    stats.failed += 1;
                    continue;
                }
            }

            match self.verify(uid, event, token).await? {
                VerifyOutcome::Match => stats.verified += 1,
                VerifyOutcome::Skipped => {}
                VerifyOutcome::Mismatch => {
                    // One corrective re-write, then a single re-verify.
                    tracing::warn!(uid, "verification mismatch, issuing corrective write");
                    match self.client.put_event(uid, body, token).await {
                        Ok(()) => {}
                        Err(e) if e.is_auth() => return Err(e.into()),
                        Err(e) => {
                            tracing::warn!(uid, error = %e, "corrective write failed");
                            stats.failed += 1;
                            continue;
                        }
                    }
                    match self.verify(uid, event, token).await? {
                        VerifyOutcome::Match => stats.corrected += 1,
                        VerifyOutcome::Skipped => {}
                        VerifyOutcome::Mismatch => {
                            tracing::warn!(uid, "event still mismatched after corrective write");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Deletes every enumerated entry; filtered to managed UIDs unless the
    /// caller disables the filter (manual full re-sync).
    ///
    /// Paced with a small delay before each DELETE; a failed DELETE backs
    /// off and moves on.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Auth`] immediately on an auth rejection and
    /// [`SyncError::Cancelled`] when the scope fires.
    pub async fn wipe(
        &self,
        filter_managed: bool,
        token: &CancelToken,
    ) -> Result<usize, SyncError> {
        self.status.set_deleting();
        let entries = match self.snapshot(filter_managed, token).await {
            Ok(entries) => entries,
            Err(SyncError::Parse(detail)) => {
                tracing::warn!(detail, "enumeration unparsable, nothing to wipe");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        let mut deleted = 0;
        for uid in entries.keys() {
            if filter_managed && !self.classifier.is_managed(uid) {
                continue;
            }
            sleep(self.tuning.wipe_pacing, token)
                .await
                .map_err(SyncError::from)?;
            match self.client.delete_event(uid, token).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_auth() => return Err(e.into()),
                Err(olsync_caldav::CalDavError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    tracing::warn!(uid, error = %e, "wipe delete failed, backing off");
                    sleep(self.tuning.wipe_error_backoff, token)
                        .await
                        .map_err(SyncError::from)?;
                }
            }
        }

        tracing::info!(deleted, filter_managed, "destination wipe finished");
        Ok(deleted)
    }

    async fn verify(
        &self,
        uid: &str,
        event: &Event,
        token: &CancelToken,
    ) -> Result<VerifyOutcome, SyncError> {
        let body = match self.client.fetch_event(uid, token).await {
            Ok(body) => body,
            Err(e) if e.is_auth() => return Err(e.into()),
            Err(olsync_caldav::CalDavError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) => {
                tracing::warn!(uid, error = %e, "verification fetch failed, skipping");
                return Ok(VerifyOutcome::Skipped);
            }
        };

        let observed = match decode_event(&body) {
            Ok(observed) => observed,
            Err(e) => {
                tracing::warn!(uid, error = %e, "verification parse failed, skipping event");
                return Ok(VerifyOutcome::Skipped);
            }
        };

        if observed.is_all_day() != event.is_all_day {
            tracing::warn!(
                uid,
                desired_all_day = event.is_all_day,
                observed_all_day = observed.is_all_day(),
                "all-day flag mismatch between desired and observed"
            );
        }

        if observed.matches(event, self.tuning.timed_tolerance) {
            Ok(VerifyOutcome::Match)
        } else {
            tracing::warn!(
                uid,
                desired_start = %event.start_utc,
                observed = ?observed,
                "observed event differs from desired"
            );
            Ok(VerifyOutcome::Mismatch)
        }
    }

    fn progress(&self, current: usize, total: usize) {
        if total == 0 {
            return;
        }
        let percent = current * 100 / total;
        self.status
            .update_text(&clamp_tooltip(&format!("{current}/{total} ({percent}%)")));
    }
}

enum VerifyOutcome {
    Match,
    Mismatch,
    Skipped,
}
