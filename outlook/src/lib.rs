// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Source automation-host bridge.
//!
//! The source calendar application exposes a component-object automation
//! surface with two hard rules: the host process must be running, and every
//! call must happen on one dedicated thread that declared single-threaded
//! apartment affinity at startup. This crate models the host behind the
//! [`AutomationHost`] contract, runs every call on an affinitised worker
//! thread, and drives the attach/retry state machine around it.
//!
//! The production COM host (and the process helpers that locate and start
//! it) are platform collaborators plugged in by the embedding binary;
//! [`UnavailableHost`] is the placeholder for platforms without one.

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

mod bridge;
mod error;
mod host;
mod worker;

pub use crate::bridge::{BridgeTiming, OutlookBridge};
pub use crate::error::BridgeError;
pub use crate::host::{AutomationHost, CalendarSession, ScopedSession, UnavailableHost};
pub use crate::worker::StaWorker;
