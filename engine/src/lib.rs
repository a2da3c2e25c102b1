// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation engine and sync supervisor for olsync.
//!
//! Ties the pieces together: the materialization pipeline turns raw source
//! appointments into the desired destination set, the reconciler converges
//! the `CalDAV` collection onto it (delete-then-upsert, verified writes),
//! and the supervisor hosts the periodic loop with mutually exclusive,
//! cancellable cycles.

#![warn(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro
)]

mod error;
mod ics;
mod pipeline;
mod reconcile;
mod status;
mod supervisor;

pub use crate::error::SyncError;
pub use crate::ics::{decode_event, encode_event, EncodeOptions, ObservedEvent, ObservedTime};
pub use crate::pipeline::{materialize, MaterializeParams};
pub use crate::reconcile::{ReconcileStats, ReconcileTuning, Reconciler};
pub use crate::status::{
    clamp_tooltip, LifecycleLog, LogLifecycle, LogStatusSink, Milestone, StatusSink,
};
pub use crate::supervisor::{SyncService, Tuning};
