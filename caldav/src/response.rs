// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for `WebDAV`/`CalDAV` operations.

use quick_xml::events::Event;

use crate::error::CalDavError;
use crate::types::ETag;

/// `WebDAV` multistatus response, reduced to what enumeration needs.
#[derive(Debug, Clone, Default)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
}

/// Individual response in a multistatus document.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// The resource href.
    pub href: String,
    /// The resource's entity tag, when reported.
    pub etag: ETag,
}

impl MultiStatusResponse {
    /// Parses a multistatus response from XML.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails.
    pub fn from_xml(xml: &str) -> Result<Self, CalDavError> {
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        reader.config_mut().check_end_names = true;

        let mut responses = Vec::new();
        let mut in_response = false;
        let mut in_prop = false;
        let mut href = String::new();
        let mut etag = ETag::default();

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::End(ref e) if e.name().local_name().into_inner() == b"multistatus" => break,
                Event::Eof => break,

                Event::Start(ref e) => match e.name().local_name().into_inner() {
                    b"response" => {
                        in_response = true;
                        href.clear();
                        etag = ETag::default();
                    }
                    b"href" if in_response => {
                        if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                            href = text.unescape()?.to_string();
                        }
                    }
                    b"prop" if in_response => in_prop = true,
                    b"getetag" if in_prop => {
                        if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                            etag = ETag::new(text.unescape()?.to_string());
                        }
                    }
                    _ => {}
                },

                Event::End(ref e) => match e.name().local_name().into_inner() {
                    b"response" if in_response => {
                        in_response = false;
                        if !href.is_empty() {
                            responses.push(ResponseItem {
                                href: std::mem::take(&mut href),
                                etag: std::mem::take(&mut etag),
                            });
                        }
                    }
                    b"prop" => in_prop = false,
                    _ => {}
                },

                _ => {}
            }
            buf.clear();
        }

        Ok(Self { responses })
    }
}

/// Extracts the event UID from a resource href, when the href names an
/// `.ics` resource: the last path segment minus the extension.
#[must_use]
pub fn uid_of_href(href: &str) -> Option<&str> {
    let last = href.trim_end_matches('/').rsplit('/').next()?;
    let uid = last.strip_suffix(".ics")?;
    if uid.is_empty() {
        None
    } else {
        Some(uid)
    }
}
