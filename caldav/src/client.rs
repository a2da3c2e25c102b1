// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client for the destination calendar collection.

use std::collections::BTreeMap;

use olsync_core::{CancelToken, UidClassifier};
use reqwest::Method;

use crate::config::CalDavConfig;
use crate::error::CalDavError;
use crate::http::HttpClient;
use crate::request::EnumerationRequest;
use crate::response::{uid_of_href, MultiStatusResponse};
use crate::types::ETag;

/// `CalDAV` client bound to one calendar collection.
///
/// # Example
///
/// ```ignore
/// use olsync_caldav::{CalDavClient, CalDavConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CalDavConfig {
///     base_url: "https://caldav.icloud.com".to_string(),
///     principal_id: "123456".to_string(),
///     calendar_id: "work".to_string(),
///     username: "user@example.com".to_string(),
///     password: "app-specific".to_string(),
///     ..Default::default()
/// };
///
/// let client = CalDavClient::new(config)?;
/// let snapshot = client.enumerate(None, &olsync_core::CancelToken::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CalDavClient {
    http: HttpClient,
    config: CalDavConfig,
}

impl CalDavClient {
    /// Creates a new `CalDAV` client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: CalDavConfig) -> Result<Self, CalDavError> {
        let http = HttpClient::new(config.clone())?;
        Ok(Self { http, config })
    }

    /// The resource URL for one event.
    #[must_use]
    pub fn event_url(&self, uid: &str) -> String {
        self.config.event_url(uid)
    }

    /// Enumerates the calendar collection into a `uid → etag` snapshot.
    ///
    /// Sends a PROPFIND with `Depth: 1` requesting `getetag`/`getctag` and
    /// collects every response whose href names an `.ics` resource. When a
    /// classifier is given, non-managed UIDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure or a malformed multistatus
    /// document.
    pub async fn enumerate(
        &self,
        classifier: Option<&UidClassifier>,
        token: &CancelToken,
    ) -> Result<BTreeMap<String, ETag>, CalDavError> {
        let url = self.config.calendar_url();
        let body = EnumerationRequest::new().build()?;

        let req = self
            .http
            .build_request(
                Method::from_bytes(b"PROPFIND")
                    .map_err(|e| CalDavError::Http(format!("invalid method: {e}")))?,
                &url,
            )
            .header("Depth", "1")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body);

        let resp = self.http.execute_with_retry(req, token).await?;
        let xml = resp.text().await?;
        let multistatus = MultiStatusResponse::from_xml(&xml)?;

        let mut snapshot = BTreeMap::new();
        for item in multistatus.responses {
            let Some(uid) = uid_of_href(&item.href) else {
                continue;
            };
            if let Some(classifier) = classifier {
                if !classifier.is_managed(uid) {
                    tracing::debug!(uid, "skipping non-managed destination entry");
                    continue;
                }
            }
            snapshot.insert(uid.to_string(), item.etag);
        }
        Ok(snapshot)
    }

    /// Creates or replaces one event resource.
    ///
    /// # Errors
    ///
    /// Returns an error when the PUT fails after the retry.
    pub async fn put_event(
        &self,
        uid: &str,
        ics_body: String,
        token: &CancelToken,
    ) -> Result<(), CalDavError> {
        let req = self
            .http
            .build_request(Method::PUT, &self.config.event_url(uid))
            .header("Content-Type", "text/calendar; charset=utf-8")
            .body(ics_body);

        self.http.execute_with_retry(req, token).await?;
        Ok(())
    }

    /// Fetches one event resource body.
    ///
    /// # Errors
    ///
    /// Returns an error when the GET fails after the retry.
    pub async fn fetch_event(
        &self,
        uid: &str,
        token: &CancelToken,
    ) -> Result<String, CalDavError> {
        let req = self
            .http
            .build_request(Method::GET, &self.config.event_url(uid));
        let resp = self.http.execute_with_retry(req, token).await?;
        Ok(resp.text().await?)
    }

    /// Deletes one event resource.
    ///
    /// # Errors
    ///
    /// Returns an error when the DELETE fails after the retry.
    pub async fn delete_event(&self, uid: &str, token: &CancelToken) -> Result<(), CalDavError> {
        let req = self
            .http
            .build_request(Method::DELETE, &self.config.event_url(uid));
        self.http.execute_with_retry(req, token).await?;
        Ok(())
    }
}
