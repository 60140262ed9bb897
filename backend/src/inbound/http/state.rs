//! Shared HTTP adapter state.
//!
//! Handlers receive this through `actix_web::web::Data`, so they depend only
//! on the synchronization service and its scheduler.

use std::sync::Arc;

use crate::domain::{SyncScheduler, SynchronizationService};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub sync: Arc<SynchronizationService>,
    pub scheduler: SyncScheduler,
}

impl HttpState {
    /// Bundle the service and the scheduler driving it.
    pub fn new(sync: Arc<SynchronizationService>, scheduler: SyncScheduler) -> Self {
        Self { sync, scheduler }
    }
}
