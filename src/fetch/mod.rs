//! HTTP plumbing for dataset downloads and webhook delivery.

mod auth;
mod basic;
mod client;

pub use auth::ApiKey;
pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use serde::Serialize;

/// Downloads `url` and returns the response body.
///
/// # Errors
///
/// Fails on transport errors and on non-success status codes.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// POSTs `body` as JSON to `url`, returning the response status code.
pub async fn post_json<C: HttpClient>(
    client: &C,
    url: &str,
    body: &impl Serialize,
) -> Result<u16> {
    let mut req = reqwest::Request::new(reqwest::Method::POST, url.parse()?);
    req.headers_mut().insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.status().as_u16())
}
