// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The materialization pipeline: raw appointments to the desired
//! destination set.
//!
//! Series masters are expanded over the inflated expansion window, every
//! item runs through the normalizer, and the surviving events inside the
//! sync window are keyed by their managed UID.

use std::collections::BTreeMap;

use olsync_core::{
    build_uid, expand_series, Event, ExpansionWindow, FetchWindow, Normalizer, RawAppointment,
    ZonePair,
};

/// Parameters for one materialization run.
#[derive(Debug, Clone)]
pub struct MaterializeParams {
    /// Source and target zones.
    pub zones: ZonePair,
    /// Instance tag woven into managed UIDs.
    pub source_id: String,
    /// The sync window; only events starting inside it are desired.
    pub window: FetchWindow,
    /// The inflated window series are expanded over.
    pub expansion: ExpansionWindow,
}

/// Builds the desired destination set from a source snapshot.
///
/// The returned map is ordered by UID, which keeps reconciliation order
/// deterministic from one cycle to the next.
#[must_use]
pub fn materialize(
    appointments: &[RawAppointment],
    params: &MaterializeParams,
) -> BTreeMap<String, Event> {
    let tolerance = chrono::Duration::minutes(olsync_core::DEFAULT_TOLERANCE_MINUTES);
    let mut normalizer = Normalizer::new(params.zones);
    let mut desired = BTreeMap::new();

    for raw in appointments {
        if raw.is_cancelled {
            continue;
        }

        let events: Vec<Event> = if raw.series.is_some() {
            expand_series(raw, &params.zones, &params.expansion, tolerance)
                .iter()
                .flat_map(|occurrence| normalizer.normalize_occurrence(raw, occurrence))
                .collect()
        } else {
            normalizer.normalize_appointment(raw)
        };

        for event in events {
            if event.start_utc < params.window.from || event.start_utc > params.window.to {
                continue;
            }
            let uid = build_uid(&params.source_id, &event.global_id, event.occurrence_marker());
            if let Some(previous) = desired.insert(uid, event) {
                tracing::warn!(
                    global_id = previous.global_id,
                    subject = previous.subject,
                    "two events collapsed onto one managed UID, keeping the later one"
                );
            }
        }
    }

    desired
}
