pub mod config;
pub mod kernel;
pub mod services;

// Re-export the pieces the wizard talks to
pub use config::GenerationConfig;
pub use kernel::store::BackgroundGeneration;
pub use kernel::{CancelReason, Fingerprint, GenerationStatus};
