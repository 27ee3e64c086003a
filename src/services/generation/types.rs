use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::kernel::fingerprint::InputSnapshot;

/// Side-channel data gathered by the wizard's enrichment calls. Every part is
/// optional; a missing part is simply left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_standards: Option<Value>,
}

impl EnrichmentBundle {
    pub fn is_empty(&self) -> bool {
        self.jurisdiction.is_none()
            && self.company.is_none()
            && self.job_title.is_none()
            && self.market_standards.is_none()
    }
}

/// One call to the collaborator. Built by value when the work is issued so
/// later edits to the wizard state cannot leak into an in-flight request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub form_data: InputSnapshot,
    #[serde(flatten)]
    pub enrichment: EnrichmentBundle,
}

impl GenerationRequest {
    pub fn new(form_data: InputSnapshot, enrichment: EnrichmentBundle) -> Self {
        Self { form_data, enrichment }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("generation response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("generation rejected: {0}")]
    Rejected(String),
}

/// The black-box "generate document" call.
///
/// Implementations must be cancel-safe: dropping the returned future aborts
/// the work from the caller's point of view.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedDocument, GenerationError>;
}
