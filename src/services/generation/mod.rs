//! Document-generation collaborator.
//!
//! The kernel only sees the [`DocumentGenerator`] trait. The HTTP client is
//! one implementation; tests plug in scripted ones.

pub mod client;
pub mod types;

pub use client::HttpDocumentGenerator;
pub use types::*;
