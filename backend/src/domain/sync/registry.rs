//! Registry of airline adapters, each paired with its own circuit breaker.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::Clock;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::domain::ports::AirlineAdapter;

/// Priority assumed for sources with no registered adapter.
pub const UNREGISTERED_PRIORITY: u32 = 999;

/// An adapter and the breaker that guards its upstream calls.
#[derive(Clone)]
pub struct RegisteredAdapter {
    adapter: Arc<dyn AirlineAdapter>,
    breaker: Arc<CircuitBreaker>,
}

impl RegisteredAdapter {
    /// The adapter.
    pub fn adapter(&self) -> &Arc<dyn AirlineAdapter> {
        &self.adapter
    }

    /// The adapter's breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

/// Adapters keyed by upper-cased airline code.
pub struct AdapterRegistry {
    clock: Arc<dyn Clock>,
    breaker_config: CircuitBreakerConfig,
    adapters: HashMap<String, RegisteredAdapter>,
}

impl AdapterRegistry {
    /// Create an empty registry; breakers created on registration use
    /// `breaker_config`.
    pub fn new(clock: Arc<dyn Clock>, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            clock,
            breaker_config,
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter under its airline code with a fresh breaker.
    ///
    /// A later registration for the same code replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn AirlineAdapter>) {
        let code = normalize_code(adapter.airline_code());
        let breaker = Arc::new(CircuitBreaker::new(
            adapter.name(),
            self.breaker_config,
            Arc::clone(&self.clock),
        ));
        if self
            .adapters
            .insert(code.clone(), RegisteredAdapter { adapter, breaker })
            .is_some()
        {
            tracing::info!(airline = %code, "replaced airline adapter registration");
        }
    }

    /// Adapter for an airline code, if any.
    pub fn get_adapter(&self, airline_code: &str) -> Option<&RegisteredAdapter> {
        self.adapters.get(&normalize_code(airline_code))
    }

    /// Whether an adapter serves `airline_code`.
    pub fn has_adapter(&self, airline_code: &str) -> bool {
        self.adapters.contains_key(&normalize_code(airline_code))
    }

    /// All adapters ordered by ascending priority, then airline code.
    pub fn get_all_adapters(&self) -> Vec<&RegisteredAdapter> {
        let mut adapters: Vec<&RegisteredAdapter> = self.adapters.values().collect();
        adapters.sort_by(|left, right| {
            left.adapter
                .priority()
                .cmp(&right.adapter.priority())
                .then_with(|| left.adapter.airline_code().cmp(right.adapter.airline_code()))
        });
        adapters
    }

    /// Priority of the adapter named `source`, or [`UNREGISTERED_PRIORITY`].
    pub fn priority_of_source(&self, source: &str) -> u32 {
        self.adapters
            .values()
            .find(|registered| registered.adapter.name() == source)
            .map_or(UNREGISTERED_PRIORITY, |registered| registered.adapter.priority())
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapters are registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    //! Registration, lookup, and ordering coverage.

    use super::*;
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};

    use crate::test_support::ScriptedAirlineAdapter;

    #[fixture]
    fn registry() -> AdapterRegistry {
        AdapterRegistry::new(Arc::new(DefaultClock), CircuitBreakerConfig::default())
    }

    #[rstest]
    fn lookups_ignore_code_case(mut registry: AdapterRegistry) {
        registry.register(Arc::new(ScriptedAirlineAdapter::new("LH", "Lufthansa", 1)));

        assert!(registry.has_adapter("lh"));
        assert!(!registry.has_adapter("BA"));
        assert_eq!(
            registry
                .get_adapter("Lh")
                .map(|registered| registered.adapter().name().to_owned()),
            Some("Lufthansa".to_owned())
        );
    }

    #[rstest]
    fn last_registration_wins(mut registry: AdapterRegistry) {
        registry.register(Arc::new(ScriptedAirlineAdapter::new("LH", "Lufthansa", 1)));
        registry.register(Arc::new(ScriptedAirlineAdapter::new("LH", "Aggregator", 5)));

        assert_eq!(registry.len(), 1);
        let registered = registry.get_adapter("LH").expect("adapter registered");
        assert_eq!(registered.adapter().name(), "Aggregator");
        assert_eq!(registered.breaker().name(), "Aggregator");
    }

    #[rstest]
    fn all_adapters_sorted_by_priority(mut registry: AdapterRegistry) {
        registry.register(Arc::new(ScriptedAirlineAdapter::new("BA", "British", 3)));
        registry.register(Arc::new(ScriptedAirlineAdapter::new("LH", "Lufthansa", 1)));
        registry.register(Arc::new(ScriptedAirlineAdapter::new("AF", "AirFrance", 2)));

        let names: Vec<&str> = registry
            .get_all_adapters()
            .into_iter()
            .map(|registered| registered.adapter().name())
            .collect();
        assert_eq!(names, ["Lufthansa", "AirFrance", "British"]);
    }

    #[rstest]
    fn unknown_sources_rank_last(mut registry: AdapterRegistry) {
        registry.register(Arc::new(ScriptedAirlineAdapter::new("LH", "Lufthansa", 1)));

        assert_eq!(registry.priority_of_source("Lufthansa"), 1);
        assert_eq!(registry.priority_of_source("Scraper"), UNREGISTERED_PRIORITY);
    }

    #[rstest]
    fn each_adapter_gets_its_own_breaker(mut registry: AdapterRegistry) {
        registry.register(Arc::new(ScriptedAirlineAdapter::new("LH", "Lufthansa", 1)));
        registry.register(Arc::new(ScriptedAirlineAdapter::new("BA", "British", 2)));

        let lh = registry.get_adapter("LH").expect("LH registered");
        let ba = registry.get_adapter("BA").expect("BA registered");
        lh.breaker().record_failure();

        assert_eq!(lh.breaker().status().failure_count, 1);
        assert_eq!(ba.breaker().status().failure_count, 0);
    }
}
