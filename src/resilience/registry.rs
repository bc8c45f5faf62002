//! Named breaker registry.
//!
//! # Responsibilities
//! - Map breaker names to breaker instances
//! - Create breakers lazily on first use from a settings template
//! - Register explicitly configured breakers up front
//!
//! # Design Decisions
//! - At most one breaker per name for the registry's lifetime
//! - Lookup takes a shard read lock; creation re-checks under the shard
//!   write lock (entry API) so concurrent first callers share one instance
//! - Breakers are never removed

use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::schema::{BreakerConfig, BreakerSettings};
use crate::config::validation::ConfigError;
use crate::resilience::circuit_breaker::{Breaker, BreakerSnapshot};
use crate::resilience::clock::{Clock, SystemClock};

/// Process-scoped map from name to breaker.
#[derive(Debug)]
pub struct Registry {
    breakers: DashMap<String, Arc<Breaker>>,
    template: BreakerSettings,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Create an empty registry whose lazily created breakers use `template`.
    pub fn new(template: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            template,
            clock,
        }
    }

    /// Create a registry from configuration, registering every listed breaker.
    pub fn from_config(config: &BreakerConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let registry = Self::new(config.defaults.clone(), clock);
        for settings in &config.breakers {
            registry.register(settings.clone())?;
        }
        tracing::info!(breakers = registry.len(), "Breaker registry loaded");
        Ok(registry)
    }

    /// The process-wide registry: default settings, system clock.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| Registry::new(BreakerSettings::default(), Arc::new(SystemClock)))
    }

    /// Return the breaker called `name`, creating it from the template on first use.
    pub fn resolve(&self, name: &str) -> Result<Arc<Breaker>, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::NameRequired);
        }
        if let Some(breaker) = self.breakers.get(name) {
            return Ok(breaker.clone());
        }

        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let settings = BreakerSettings {
                    name: name.to_string(),
                    ..self.template.clone()
                };
                let breaker = Arc::new(Breaker::from_settings(settings, self.clock.clone())?);
                entry.insert(breaker.clone());
                Ok(breaker)
            }
        }
    }

    /// Build and insert a breaker with explicit settings.
    pub fn register(&self, settings: BreakerSettings) -> Result<Arc<Breaker>, ConfigError> {
        if settings.name.is_empty() {
            return Err(ConfigError::NameRequired);
        }
        match self.breakers.entry(settings.name.clone()) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateName(settings.name)),
            Entry::Vacant(entry) => {
                let breaker = Arc::new(Breaker::from_settings(settings, self.clock.clone())?);
                entry.insert(breaker.clone());
                Ok(breaker)
            }
        }
    }

    /// Look up a breaker without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Breaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.breakers.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|r| r.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
