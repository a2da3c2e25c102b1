// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP client wrapper with authentication, status mapping and the
//! transient-failure retry.

use std::time::Duration;

use olsync_core::{sleep, CancelToken};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

use crate::config::CalDavConfig;
use crate::error::CalDavError;

/// HTTP client for `CalDAV` operations.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: CalDavConfig,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: CalDavConfig) -> Result<Self, CalDavError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    /// Builds a request with basic-auth credentials attached.
    pub fn build_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }

    /// Executes a request and maps the response status.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Auth`] on 401/403, [`CalDavError::Status`]
    /// on any other non-success status, and [`CalDavError::Http`] on
    /// transport failures.
    pub async fn execute(&self, req: RequestBuilder) -> Result<Response, CalDavError> {
        let resp = req.send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CalDavError::Auth(status.as_u16()));
        }

        let detail = resp
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".to_string());
        Err(CalDavError::Status {
            status: status.as_u16(),
            detail: truncate(&detail, 200),
        })
    }

    /// Executes a request with the one-shot delayed retry.
    ///
    /// Any non-authentication failure is retried once after the configured
    /// delay, preserving method and body. Authentication failures are
    /// raised immediately; the retry wait honours the cancellation scope.
    ///
    /// # Errors
    ///
    /// Returns the final error when the retry also fails, or
    /// [`CalDavError::Cancelled`] when the scope fires during the wait.
    pub async fn execute_with_retry(
        &self,
        req: RequestBuilder,
        token: &CancelToken,
    ) -> Result<Response, CalDavError> {
        token.check().map_err(CalDavError::from)?;

        let retry = req.try_clone();
        let err = match self.execute(req).await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => e,
        };

        let Some(retry) = retry else {
            return Err(err);
        };

        tracing::warn!(error = %err, "request failed, retrying once");
        sleep(Duration::from_secs(self.config.retry_delay_secs), token).await?;
        self.execute(retry).await
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", s.get(..end).unwrap_or_default())
    }
}
