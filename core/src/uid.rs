// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Managed destination identifiers.
//!
//! Destination entries are keyed by a deterministic UID built from the
//! originating appointment id and the occurrence's UTC start:
//!
//! ```text
//! {source_id-}outlook-{sha256(global_id)}-{YYYYMMDDTHHMMSSZ}
//! ```
//!
//! Hashing the source identifier bounds the UID length and keeps possibly
//! private identifiers out of URLs; the start-instant suffix keeps each
//! occurrence of a series individually addressable. The classifier decides
//! whether a destination UID belongs to this instance so the reconciler
//! never touches foreign entries.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Digest used when the originating appointment has no identifier.
const EMPTY_ID_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Formats an instant as the UID suffix (`YYYYMMDDTHHMMSSZ`).
#[must_use]
pub fn format_utc_stamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Builds the managed UID for one occurrence.
#[must_use]
pub fn build_uid(source_id: &str, global_id: &str, start_utc: DateTime<Utc>) -> String {
    let prefix = if source_id.is_empty() {
        "outlook".to_string()
    } else {
        format!("{source_id}-outlook")
    };

    let digest = if global_id.is_empty() {
        EMPTY_ID_DIGEST.to_string()
    } else {
        let mut hasher = Sha256::new();
        hasher.update(global_id.as_bytes());
        format!("{:x}", hasher.finalize())
    };

    format!("{prefix}-{digest}-{}", format_utc_stamp(start_utc))
}

/// Classifies destination UIDs as managed by this instance.
#[derive(Debug, Clone)]
pub struct UidClassifier {
    prefixes: Vec<String>,
}

impl UidClassifier {
    /// Creates a classifier for the given instance tag.
    ///
    /// A UID is managed when, after trimming, it begins with the
    /// instance-qualified `{source_id}-outlook-` prefix or one of the
    /// unqualified `-outlook-` / `outlook-` spellings. A bare
    /// `{source_id}-` prefix is deliberately not honoured: it can swallow
    /// unrelated entries that happen to share a user-chosen source id.
    #[must_use]
    pub fn new(source_id: &str) -> Self {
        let mut prefixes = Vec::with_capacity(3);
        if !source_id.is_empty() {
            prefixes.push(format!("{}-outlook-", source_id.to_ascii_lowercase()));
        }
        prefixes.push("-outlook-".to_string());
        prefixes.push("outlook-".to_string());
        Self { prefixes }
    }

    /// Whether `uid` belongs to this sync instance.
    #[must_use]
    pub fn is_managed(&self, uid: &str) -> bool {
        let uid = uid.trim().to_ascii_lowercase();
        self.prefixes.iter().any(|p| uid.starts_with(p.as_str()))
    }
}
