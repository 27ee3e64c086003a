//! Generation telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside the store's decision logic.
//!
//! # PRIVACY INVARIANT
//! Events must **NEVER** contain user content (form values, fingerprints,
//! document text). Only attempt ids, reasons, durations and counts.

pub mod event;
pub mod metrics;
pub mod recorder;
