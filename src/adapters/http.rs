use crate::utils::error::{CtdError, Result};
use crate::utils::validation::is_remote;
use reqwest::Client;

/// Reads a sheet from a local path or with a single GET for http(s) locations.
pub async fn fetch_location(client: &Client, location: &str) -> Result<Vec<u8>> {
    if is_remote(location) {
        tracing::debug!("Fetching {}", location);
        let response = client.get(location).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CtdError::RemoteError {
                url: location.to_string(),
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    } else {
        tracing::debug!("Reading {}", location);
        Ok(tokio::fs::read(location).await?)
    }
}
