pub mod cache;
pub mod catalog;
pub mod config;
pub mod forms;
pub mod gateway;
pub mod listing;
pub mod session;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::gateway::ApiGateway;
use crate::listing::ListingController;
use crate::session::SessionStore;

/// Wires the session store, gateway, cache, and catalog client together and
/// starts the cache garbage-collection sweep.
pub struct App {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub catalog: Arc<CatalogClient>,
    pub listing: Arc<ListingController>,
}

impl App {
    /// Build the app with the session persisted under the configured data dir.
    pub fn new(config: Config) -> Result<Self> {
        let session = Arc::new(SessionStore::open(&config.session.data_dir)?);
        Self::with_session(config, session)
    }

    /// Build the app around an existing session store (tests use an
    /// in-memory one).
    pub fn with_session(config: Config, session: Arc<SessionStore>) -> Result<Self> {
        let gateway = Arc::new(
            ApiGateway::new(&config.api, session.clone())
                .context("Failed to build HTTP client")?,
        );
        let cache = Arc::new(QueryCache::new(config.cache.gc_horizon()));
        cache::spawn_gc_task(cache.clone(), config.cache.gc_interval());

        let catalog = Arc::new(CatalogClient::new(
            gateway,
            cache,
            session.clone(),
            config.cache.clone(),
        ));
        let listing = Arc::new(ListingController::new(
            catalog.clone(),
            config.listing.page_limit,
            config.listing.debounce_delay(),
        ));

        Ok(Self {
            config,
            session,
            catalog,
            listing,
        })
    }
}
