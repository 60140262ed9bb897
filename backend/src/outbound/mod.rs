//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! This module follows the hexagonal architecture pattern, providing concrete
//! implementations of domain port traits:
//!
//! - **airline**: reqwest-backed airline flight APIs
//! - **memory**: process-local flight store
//! - **notifications**: change-notification subscribers
//! - **metrics**: Prometheus-backed metrics exporters (feature-gated)
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod airline;
pub mod memory;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod notifications;
