//! Client side of the `/generate-narration` contract.
//!
//! Posts the user's input to the narration proxy and returns the single
//! generated sentence. Callers treat any error as "no narration".

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NarrationConfig;
use crate::error::NarrationError;

/// Used when the proxy answers 2xx without a narration.
pub const NO_NARRATION_TEXT: &str = "No narration available.";

#[derive(Debug, Serialize, Deserialize)]
pub struct NarrationRequest {
    pub content: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NarrationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait NarrationSource: Send + Sync {
    async fn narrate(&self, content: &str) -> Result<String, NarrationError>;
}

pub struct NarrationClient {
    url: String,
    client: Client,
}

impl NarrationClient {
    pub fn new(config: &NarrationConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            url: config.url.clone(),
            client,
        }
    }
}

#[async_trait]
impl NarrationSource for NarrationClient {
    async fn narrate(&self, content: &str) -> Result<String, NarrationError> {
        debug!("Requesting narration from {}", self.url);

        let resp = self
            .client
            .post(&self.url)
            .json(&NarrationRequest {
                content: content.to_string(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    warn!("Cannot connect to narration proxy at {}", self.url);
                } else if e.is_timeout() {
                    warn!("Narration request timed out");
                }
                e
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<NarrationResponse>().await.unwrap_or_default();
            return Err(NarrationError::Status {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| status.to_string()),
            });
        }

        let body: NarrationResponse = resp.json().await?;
        let narration = body
            .narration
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| NO_NARRATION_TEXT.to_string());
        debug!("Narration: '{narration}'");
        Ok(narration)
    }
}
