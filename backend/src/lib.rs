//! Flight data synchronization backend.
//!
//! Keeps stored flight records current by pulling snapshots from per-airline
//! adapters, reconciling disagreements between sources, and notifying
//! subscribers when a monitored field changes.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
