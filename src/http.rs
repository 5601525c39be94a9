//! HTTP client wrapper for talking to the CSW endpoint.
//!
//! Deliberately retry-free: transient transport failures are reported to the
//! caller, which owns per-record retry/skip semantics.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::Result;

/// User agent string identifying this harvester.
const USER_AGENT: &str = concat!("geocat-harvester/", env!("CARGO_PKG_VERSION"));

/// Create a configured HTTP client.
pub fn create_client() -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// POST an XML request body and return the response body as text.
pub fn post_xml(client: &Client, url: &str, body: String) -> Result<String> {
    let response = client
        .post(url)
        .header("Content-Type", "application/xml")
        .body(body)
        .send()?
        .error_for_status()?;
    Ok(response.text()?)
}

/// GET a URL with query parameters and return the response body as text.
pub fn get_text(client: &Client, url: &str, query: &[(&str, &str)]) -> Result<String> {
    let response = client.get(url).query(query).send()?.error_for_status()?;
    Ok(response.text()?)
}
