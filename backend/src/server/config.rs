//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use thiserror::Error;

use flight_sync::domain::SchedulerConfig;
use flight_sync::domain::sync::SyncServiceConfig;
use flight_sync::outbound::airline::HttpAirlineSettings;

use super::catalogue::{CatalogueError, load_catalogue};
use super::settings::{FlightSyncSettings, SettingsError};

/// Failure turning settings into a server configuration.
#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
}

/// Everything needed to build the sync engine and its HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) sync: SyncServiceConfig,
    pub(crate) scheduler: SchedulerConfig,
    pub(crate) adapters: Vec<HttpAirlineSettings>,
}

impl ServerConfig {
    /// Construct a configuration with no airline adapters.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, sync: SyncServiceConfig, scheduler: SchedulerConfig) -> Self {
        Self {
            bind_addr,
            sync,
            scheduler,
            adapters: Vec::new(),
        }
    }

    /// Resolve settings, reading the adapter catalogue when one is named.
    ///
    /// # Errors
    ///
    /// Propagates invalid settings values and catalogue read failures.
    pub fn from_settings(settings: &FlightSyncSettings) -> Result<Self, ServerConfigError> {
        let config = Self::new(
            settings.bind_addr()?,
            settings.sync_config()?,
            settings.scheduler_config()?,
        );
        Ok(match settings.adapters_path.as_deref() {
            Some(path) => config.with_adapters(load_catalogue(path)?),
            None => config,
        })
    }

    /// Attach the airline APIs to register.
    #[must_use]
    pub fn with_adapters(mut self, adapters: Vec<HttpAirlineSettings>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
