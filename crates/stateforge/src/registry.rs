use crate::store::StoreDefinition;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Store definitions known by name, for creating stores from a string.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    definitions: BTreeMap<String, Arc<dyn StoreDefinition>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition` under its own name, replacing any previous one.
    pub fn register<D: StoreDefinition>(&mut self, definition: D) -> &mut Self {
        self.register_shared(Arc::new(definition))
    }

    pub fn register_shared(&mut self, definition: Arc<dyn StoreDefinition>) -> &mut Self {
        tracing::debug!(store = %definition.name(), "store registered");
        self.definitions
            .insert(definition.name().to_string(), definition);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StoreDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::State;

    struct Named(&'static str);

    impl StoreDefinition for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn initial_state(&self) -> State {
            State::new()
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = StoreRegistry::new();
        registry.register(Named("Cart")).register(Named("Counter"));

        assert!(registry.exists("Cart"));
        assert!(!registry.exists("Wishlist"));
        assert_eq!(registry.get("Counter").unwrap().name(), "Counter");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Cart", "Counter"]);
    }

    #[test]
    fn reregistering_replaces() {
        let mut registry = StoreRegistry::new();
        registry.register(Named("Cart")).register(Named("Cart"));
        assert_eq!(registry.len(), 1);
    }
}
