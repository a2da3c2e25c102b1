// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Core data model and materialization pipeline for the olsync daemon.

mod cancel;
mod config;
mod event;
mod normalize;
mod recurrence;
mod source;
mod timezone;
mod uid;

pub use crate::{
    cancel::{sleep, CancelToken, Cancelled},
    config::{Config, ConfigError, LogLevel, CONFIG_FILE_NAME},
    event::Event,
    normalize::{infer_all_day, resolve_timestamps, Normalizer, DEFAULT_TOLERANCE_MINUTES},
    recurrence::{expand_series, ExpansionWindow, OccurrenceInfo},
    source::{
        FetchWindow, Frequency, RawAppointment, SeriesDescriptor, SeriesException, Termination,
    },
    timezone::{host_zone, local_to_utc, resolve_zone, utc_to_local, within_tolerance, ZonePair},
    uid::{build_uid, format_utc_stamp, UidClassifier},
};
