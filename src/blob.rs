//! Remote blob tier for the gauge cache.
//!
//! Plain HTTPS GET/PUT against `{endpoint}/{bucket}/{key}`. In multi-instance
//! deployments this tier is the authoritative copy: a freshly started
//! instance can warm from it without waiting for the next scheduled rebuild.

use crate::config::BlobConfig;
use crate::error::{EngineError, Result};
use std::time::Duration;
use tracing::debug;

pub struct BlobStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    key: String,
}

impl BlobStore {
    pub fn new(config: &BlobConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            key: config.key.clone(),
        }
    }

    fn url(&self) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, self.key)
    }

    pub async fn download(&self) -> Result<String> {
        let url = self.url();
        debug!("Downloading blob from {}", url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EngineError::Blob(format!(
                "download of {} returned HTTP {}",
                url,
                response.status()
            )));
        }
        Ok(response.text().await?)
    }

    pub async fn upload(&self, body: String) -> Result<()> {
        let url = self.url();
        debug!("Uploading blob to {} ({} bytes)", url, body.len());
        let response = self
            .client
            .put(&url)
            .header("content-type", "application/json")
            .body(body)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EngineError::Blob(format!(
                "upload to {} returned HTTP {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}
