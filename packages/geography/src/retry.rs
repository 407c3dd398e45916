//! HTTP retry helpers for transient errors.
//!
//! Resource downloads go through [`send_text`] rather than calling
//! `reqwest::RequestBuilder::send()` directly, so every request gets retry
//! with exponential backoff on timeouts, connection resets, server errors,
//! and rate limiting. Once retries are exhausted the error is returned; the
//! caller treats it as fatal for the conversion that needed the resource.

use std::time::Duration;

use crate::GeoError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s) the total wait before giving
/// up is 30 seconds.
const MAX_RETRIES: u32 = 4;

/// Maximum number of full re-fetch attempts when the response body cannot
/// be read (connection dropped mid-body).
const MAX_BODY_RETRIES: u32 = 2;

/// Sends an HTTP request and returns the response body as a `String`.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`GeoError`] if the request fails after all retries, the server
/// returns a non-retryable status code, or the body cannot be read.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F) -> Result<String, GeoError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;

    loop {
        let response = send_inner(&build_request, MAX_RETRIES).await?;
        let url = response.url().to_string();
        let status = response.status();

        match response.text().await {
            Ok(text) => return Ok(text),
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                body_attempt += 1;
                let delay = Duration::from_secs(1u64 << body_attempt);
                log::warn!(
                    "Body read failed (body retry {body_attempt}/{MAX_BODY_RETRIES}), \
                     re-fetching in {delay:?}...\n  \
                     url: {url}\n  \
                     status: {status}\n  \
                     error: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log::error!(
                    "Body read failed after {MAX_BODY_RETRIES} retries, giving up.\n  \
                     url: {url}\n  \
                     status: {status}\n  \
                     error: {e}"
                );
                return Err(GeoError::Http(e));
            }
        }
    }
}

/// Sends the request built by `build_request`, retrying on transient errors
/// up to `max_retries` times with exponential backoff.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, max_retries: u32) -> Result<reqwest::Response, GeoError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) && attempt < max_retries => {
                log::warn!("  transient error: {e}");
                attempt += 1;
                continue;
            }
            Err(e) => return Err(GeoError::Http(e)),
        };

        let status = response.status();
        let url = response.url().to_string();

        // 429 and 5xx are worth another attempt; other 4xx are permanent.
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if attempt < max_retries {
                log::warn!("  HTTP {status} from {url}");
                attempt += 1;
                continue;
            }
            return Err(GeoError::Fetch {
                url,
                message: format!("HTTP {status} after {max_retries} retries"),
            });
        }

        if status.is_client_error() {
            return Err(GeoError::Fetch {
                url,
                message: format!("HTTP {status}"),
            });
        }

        return Ok(response);
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
