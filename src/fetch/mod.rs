mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::Result;

use crate::error::TransitError;

/// Issues a GET against `url` and returns the raw response body.
///
/// Non-success statuses are an error carrying the status code; the agency
/// adapters rely on this to report upstream failures uniformly.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(TransitError::UpstreamStatus(status).into());
    }

    Ok(resp.bytes().await?.to_vec())
}
