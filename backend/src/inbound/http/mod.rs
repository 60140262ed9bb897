//! HTTP inbound adapter exposing the synchronization operations.

pub mod conflicts;
pub mod error;
pub mod flights;
pub mod health;
pub mod operations;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod validation;
pub mod webhooks;

use actix_web::{Scope, web};

pub use error::ApiResult;

use crate::domain::Error;

/// Every synchronization route, mounted under `/api/v1/sync`.
pub fn sync_scope() -> Scope {
    web::scope("/api/v1/sync")
        .service(flights::sync_flight)
        .service(flights::batch_sync_flights)
        .service(flights::flight_sync_status)
        .service(conflicts::list_pending_conflicts)
        .service(conflicts::resolve_conflict)
        .service(webhooks::receive_webhook)
        .service(operations::list_circuit_breakers)
        .service(operations::get_circuit_breaker)
        .service(operations::cache_stats)
        .service(operations::clear_cache)
        .service(operations::scheduler_status)
        .service(operations::force_scheduler_run)
        .service(operations::get_sync_config)
        .service(operations::update_sync_config)
}

/// JSON extractor settings rendering malformed bodies as the standard
/// error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _request| {
        Error::invalid_request(format!("malformed JSON body: {err}")).into()
    })
}
