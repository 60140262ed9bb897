//! Server construction and middleware wiring.

mod catalogue;
mod config;
mod settings;
mod state_builders;

pub use config::ServerConfig;
pub use settings::FlightSyncSettings;

#[cfg(feature = "metrics")]
use state_builders::build_sync_metrics;
use state_builders::{build_sync_runtime, drain_notifications};

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
#[cfg(feature = "metrics")]
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use tracing::info;

#[cfg(debug_assertions)]
use flight_sync::doc::ApiDoc;
use flight_sync::inbound::http::health::{HealthState, live, ready};
use flight_sync::inbound::http::state::HttpState;
use flight_sync::inbound::http::{json_config, sync_scope};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
    } = deps;

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(json_config())
        .service(sync_scope())
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

#[cfg(feature = "metrics")]
fn make_metrics() -> std::io::Result<PrometheusMetrics> {
    PrometheusMetricsBuilder::new("flight_sync")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(format!("configure Prometheus metrics: {e}")))
}

/// Construct an Actix HTTP server over a freshly wired sync engine.
///
/// Registers the configured airline adapters, spawns the notification relay,
/// starts the scheduler, and binds the listener.
///
/// # Parameters
/// - `health_state`: shared readiness state updated once the server is initialised.
/// - `config`: pre-built [`ServerConfig`] with binding, engine, and adapter settings.
///
/// # Returns
/// A spawned [`Server`] that must be awaited to drive the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when adapter construction, metric
/// registration, binding the socket, or starting the server fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    #[cfg(feature = "metrics")]
    let prometheus = make_metrics()?;
    #[cfg(feature = "metrics")]
    let metrics = build_sync_metrics(&prometheus.registry)?;
    #[cfg(not(feature = "metrics"))]
    let metrics = state_builders::build_sync_metrics();

    let runtime = build_sync_runtime(&config, metrics)?;
    actix_web::rt::spawn(drain_notifications(runtime.notifications));
    if runtime.http_state.scheduler.start() {
        info!("flight sync scheduler started");
    }

    let http_state = web::Data::new(runtime.http_state);
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        let app = build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
        });

        #[cfg(feature = "metrics")]
        let app = app.wrap(prometheus.clone());

        app
    })
    .bind(config.bind_addr())?
    .run();

    health_state.mark_ready();
    Ok(server)
}

#[cfg(test)]
mod tests {
    //! Route wiring of the assembled application.

    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use flight_sync::domain::ports::NoOpSyncMetrics;
    use flight_sync::domain::SchedulerConfig;
    use flight_sync::domain::sync::SyncServiceConfig;
    use rstest::rstest;
    use serde_json::Value;

    fn deps(health_state: web::Data<HealthState>) -> AppDependencies {
        let config = ServerConfig::new(
            "127.0.0.1:0".parse().expect("addr"),
            SyncServiceConfig::default(),
            SchedulerConfig::default(),
        );
        let runtime =
            build_sync_runtime(&config, Arc::new(NoOpSyncMetrics)).expect("runtime");
        AppDependencies {
            health_state,
            http_state: web::Data::new(runtime.http_state),
        }
    }

    #[rstest]
    #[case(false, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(true, StatusCode::OK)]
    #[actix_web::test]
    async fn readiness_follows_health_state(
        #[case] is_ready: bool,
        #[case] expected: StatusCode,
    ) {
        let health_state = web::Data::new(HealthState::new());
        if is_ready {
            health_state.mark_ready();
        }
        let app = actix_test::init_service(build_app(deps(health_state))).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;

        assert_eq!(res.status(), expected);
    }

    #[rstest]
    #[actix_web::test]
    async fn sync_routes_are_mounted() {
        let health_state = web::Data::new(HealthState::new());
        let app = actix_test::init_service(build_app(deps(health_state))).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/sync/config")
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["service"]["webhookSigningEnabled"], false);
        assert_eq!(body["scheduler"]["enabled"], true);
    }
}
