use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::attempt::GenerationStatus;

/// Why background work is being cancelled. The reason decides whether the
/// slot is wiped or kept around as an outdated marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelReason {
    /// The inputs changed under the attempt.
    FormUpdated,
    /// The user left the step the draft belongs to.
    Navigation,
    /// The result was used and is no longer needed.
    Consumed,
    Manual,
}

impl CancelReason {
    /// Status the slot lands in after this cancellation.
    pub fn resulting_status(self) -> GenerationStatus {
        match self {
            CancelReason::FormUpdated | CancelReason::Navigation => GenerationStatus::Stale,
            CancelReason::Consumed | CancelReason::Manual => GenerationStatus::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CancelReason::FormUpdated => "form-updated",
            CancelReason::Navigation => "navigation",
            CancelReason::Consumed => "consumed",
            CancelReason::Manual => "manual",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown cancel reason {0:?}")]
pub struct UnknownCancelReason(pub String);

impl FromStr for CancelReason {
    type Err = UnknownCancelReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "form-updated" => Ok(CancelReason::FormUpdated),
            "navigation" => Ok(CancelReason::Navigation),
            "consumed" => Ok(CancelReason::Consumed),
            "manual" => Ok(CancelReason::Manual),
            other => Err(UnknownCancelReason(other.to_string())),
        }
    }
}
