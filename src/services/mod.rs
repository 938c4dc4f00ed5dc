//! Service layer.
//!
//! [`ServiceContainer`] wires the providers, caches, resolver and batch jobs
//! from a [`SkycascadeConfig`]. Every executor it hands out shares one
//! bulkhead, so interactive lookups and batch jobs together never exceed
//! three in-flight Horizons calls.

mod position;

pub use position::{Located, PositionService, PositionSource};

use crate::batch::EphemerisRebuilder;
use crate::config::SkycascadeConfig;
use crate::executor::FetchExecutor;
use crate::models::WatchlistEntry;
use crate::observability::EventBus;
use crate::provider::{Bulkhead, CrossReferenceLookup, EphemerisProvider, HorizonsClient, SbdbClient};
use crate::resolver::{IdentityResolver, OverrideTable};
use crate::storage::{EphemerisCache, IdentifierCache, load_watchlist};
use crate::Result;
use std::sync::Arc;

/// Fully wired services for one process.
pub struct ServiceContainer {
    config: SkycascadeConfig,
    events: EventBus,
    identifier_cache: Arc<IdentifierCache>,
    ephemeris_cache: Arc<EphemerisCache>,
    resolver: IdentityResolver,
}

impl ServiceContainer {
    /// Builds services against the live Horizons and SBDB APIs.
    ///
    /// # Errors
    ///
    /// Returns an error if the override table or a cache file cannot be read.
    pub fn from_config(config: &SkycascadeConfig) -> Result<Self> {
        let provider: Arc<dyn EphemerisProvider> =
            Arc::new(HorizonsClient::new(config.horizons.clone()));
        let lookup: Option<Arc<dyn CrossReferenceLookup>> = config
            .sbdb_enabled
            .then(|| Arc::new(SbdbClient::new(config.sbdb.clone())) as Arc<dyn CrossReferenceLookup>);
        Self::with_providers(config, provider, lookup)
    }

    /// Builds services against the given providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the override table or a cache file cannot be read.
    pub fn with_providers(
        config: &SkycascadeConfig,
        provider: Arc<dyn EphemerisProvider>,
        lookup: Option<Arc<dyn CrossReferenceLookup>>,
    ) -> Result<Self> {
        let events = EventBus::default();
        let bulkhead = Bulkhead::new(config.executor.bulkhead.clone());
        let executor = FetchExecutor::with_bulkhead(provider, config.executor.clone(), bulkhead);

        let overrides = OverrideTable::load(&config.paths.overrides)?;
        let identifier_cache = Arc::new(IdentifierCache::open_with_events(
            &config.paths.identifier_cache,
            Some(events.clone()),
        )?);
        let ephemeris_cache = Arc::new(EphemerisCache::open(&config.paths.ephemeris_cache)?);

        let mut resolver = IdentityResolver::new(executor, overrides, Arc::clone(&identifier_cache));
        if let Some(lookup) = lookup {
            resolver = resolver.with_lookup(lookup);
        }

        tracing::debug!(
            data_dir = %config.paths.data_dir.display(),
            sbdb = resolver.lookup_service().is_some(),
            "Services initialized"
        );

        Ok(Self {
            config: config.clone(),
            events,
            identifier_cache,
            ephemeris_cache,
            resolver,
        })
    }

    /// The configuration the services were built from.
    #[must_use]
    pub const fn config(&self) -> &SkycascadeConfig {
        &self.config
    }

    /// Event bus carrying drift, purge and rebuild events.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// The identity resolver.
    #[must_use]
    pub const fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// The identifier cache.
    #[must_use]
    pub fn identifier_cache(&self) -> Arc<IdentifierCache> {
        Arc::clone(&self.identifier_cache)
    }

    /// The ephemeris cache.
    #[must_use]
    pub fn ephemeris_cache(&self) -> Arc<EphemerisCache> {
        Arc::clone(&self.ephemeris_cache)
    }

    /// Cache-first position service.
    #[must_use]
    pub fn positions(&self) -> PositionService {
        PositionService::new(self.ephemeris_cache(), self.resolver.clone())
    }

    /// Sequential ephemeris cache rebuilder.
    #[must_use]
    pub fn rebuilder(&self) -> EphemerisRebuilder {
        EphemerisRebuilder::new(self.resolver.clone(), self.ephemeris_cache(), self.config.rebuild)
            .with_event_bus(self.events.clone())
    }

    /// Loads both watchlists, comets first.
    ///
    /// # Errors
    ///
    /// Returns an error if a watchlist file exists but cannot be parsed.
    pub fn watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        load_watchlist(&self.config.paths.comets, &self.config.paths.asteroids)
    }
}
