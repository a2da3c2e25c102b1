// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client for the olsync synchronization daemon.
//!
//! Speaks the subset of `WebDAV`/`CalDAV` (RFC 4791) the reconciler needs:
//! PROPFIND enumeration of a calendar collection, PUT upsert, GET fetch and
//! DELETE of individual event resources, with HTTP Basic authentication and
//! a one-shot delayed retry for transient failures.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing
)]

mod client;
mod config;
mod error;
mod http;
mod request;
mod response;
mod types;
mod xml;

pub use crate::client::CalDavClient;
pub use crate::config::CalDavConfig;
pub use crate::error::CalDavError;
pub use crate::request::EnumerationRequest;
pub use crate::response::{MultiStatusResponse, ResponseItem};
pub use crate::types::ETag;
