// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `CalDAV` operations.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Writer;

use crate::error::CalDavError;
use crate::xml::ns;

/// PROPFIND request for enumerating a calendar collection.
///
/// Requests `getetag` per resource plus the collection's `getctag`, the
/// properties the destination snapshot is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumerationRequest;

impl EnumerationRequest {
    /// Creates a new enumeration request.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CalDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        // <d:propfind xmlns:d="DAV:" xmlns:cs="http://calendarserver.org/ns/">
        let mut propfind = BytesStart::new("d:propfind");
        propfind.push_attribute(("xmlns:d", ns::DAV));
        propfind.push_attribute(("xmlns:cs", ns::CALENDARSERVER));
        writer.write_event(Event::Start(propfind))?;

        // <d:prop>
        writer.write_event(Event::Start(BytesStart::new("d:prop")))?;
        writer.write_event(Event::Empty(BytesStart::new("d:getetag")))?;
        writer.write_event(Event::Empty(BytesStart::new("cs:getctag")))?;
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("d:prop")))?;

        // </d:propfind>
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("d:propfind")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| CalDavError::Xml(format!("UTF-8 error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_enumeration_body() {
        let body = EnumerationRequest::new().build().unwrap();
        assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(body.contains("xmlns:d=\"DAV:\""));
        assert!(body.contains("xmlns:cs=\"http://calendarserver.org/ns/\""));
        assert!(body.contains("<d:getetag/>"));
        assert!(body.contains("<cs:getctag/>"));
    }
}
