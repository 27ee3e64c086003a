use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::types::{DocumentGenerator, GeneratedDocument, GenerationError, GenerationRequest};
use crate::config::GenerationConfig;

/// reqwest-backed generator posting to the document endpoint.
#[derive(Clone)]
pub struct HttpDocumentGenerator {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default = "default_success")]
    success: bool,
    document: Option<GeneratedDocument>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

fn default_success() -> bool {
    true
}

impl HttpDocumentGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.request_timeout) // network-level ceiling, independent of cancellation
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DocumentGenerator for HttpDocumentGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedDocument, GenerationError> {
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "generation endpoint responded");

        if !status.is_success() {
            let message = match serde_json::from_slice::<ErrorBody>(&body) {
                Ok(err) => err.error,
                Err(_) if !body.is_empty() => String::from_utf8_lossy(&body).trim().to_string(),
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(GenerationError::Status { status: status.as_u16(), message });
        }

        let parsed: GenerateResponse = serde_json::from_slice(&body)?;
        match (parsed.success, parsed.document) {
            (true, Some(document)) => Ok(document),
            (true, None) => Err(GenerationError::Rejected("response carried no document".to_string())),
            (false, _) => Err(GenerationError::Rejected(
                parsed.error.unwrap_or_else(|| "generation failed".to_string()),
            )),
        }
    }
}
