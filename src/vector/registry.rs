//! Shared cache of loaded embedding providers.
//!
//! Loading a model is expensive, so one [`EmbeddingRegistry`] is built at
//! startup and passed by reference to every store. It holds at most one
//! provider per model identifier. Initialization of a given identifier runs
//! exactly once even when several threads ask for it at the same time; the
//! losers block on that identifier's slot and receive the winner's instance.
//! Other identifiers are not blocked.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::vector::{EmbeddingGenerator, VectorError};

type Slot = Arc<Mutex<Option<Arc<dyn EmbeddingGenerator>>>>;

/// Registry of embedding providers keyed by model identifier.
#[derive(Default)]
pub struct EmbeddingRegistry {
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for EmbeddingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingRegistry")
            .field("models", &self.loaded_models())
            .finish()
    }
}

impl EmbeddingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the provider for `model`, running `init` if none is loaded.
    ///
    /// A failed `init` leaves the slot empty, so a later call retries.
    pub fn get_or_init<F>(
        &self,
        model: &str,
        init: F,
    ) -> Result<Arc<dyn EmbeddingGenerator>, VectorError>
    where
        F: FnOnce() -> Result<Arc<dyn EmbeddingGenerator>, VectorError>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(model.to_string()).or_default())
        };

        let mut guard = slot.lock();
        if let Some(generator) = guard.as_ref() {
            debug!(model, "Using cached embedding model");
            return Ok(Arc::clone(generator));
        }

        let generator = init()?;
        *guard = Some(Arc::clone(&generator));
        Ok(generator)
    }

    /// Returns the provider for `model` if it is already loaded.
    #[must_use]
    pub fn get(&self, model: &str) -> Option<Arc<dyn EmbeddingGenerator>> {
        let slot = self.slots.lock().get(model).cloned()?;
        let guard = slot.lock();
        guard.as_ref().map(Arc::clone)
    }

    /// Identifiers of all loaded providers, sorted.
    #[must_use]
    pub fn loaded_models(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .slots
            .lock()
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();

        let mut loaded: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| slot.try_lock().is_some_and(|guard| guard.is_some()))
            .map(|(name, _)| name)
            .collect();
        loaded.sort();
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::MockEmbeddingGenerator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn mock() -> Arc<dyn EmbeddingGenerator> {
        Arc::new(MockEmbeddingGenerator::new(4))
    }

    #[test]
    fn test_same_model_initializes_once() {
        let registry = EmbeddingRegistry::new();
        let calls = AtomicUsize::new(0);

        let first = registry
            .get_or_init("mock", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(mock())
            })
            .unwrap();
        let second = registry
            .get_or_init("mock", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(mock())
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.loaded_models(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_concurrent_first_callers_do_not_double_initialize() {
        let registry = Arc::new(EmbeddingRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    registry
                        .get_or_init("shared", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(mock())
                        })
                        .unwrap()
                })
            })
            .collect();

        let generators: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for generator in &generators[1..] {
            assert!(Arc::ptr_eq(&generators[0], generator));
        }
    }

    #[test]
    fn test_failed_init_can_be_retried() {
        let registry = EmbeddingRegistry::new();

        let result = registry.get_or_init("flaky", || {
            Err(VectorError::EmbeddingFailed("no network".to_string()))
        });
        assert!(result.is_err());
        assert!(registry.get("flaky").is_none());

        assert!(registry.get_or_init("flaky", || Ok(mock())).is_ok());
        assert!(registry.get("flaky").is_some());
    }

    #[test]
    fn test_distinct_models_get_distinct_instances() {
        let registry = EmbeddingRegistry::new();
        let a = registry.get_or_init("a", || Ok(mock())).unwrap();
        let b = registry.get_or_init("b", || Ok(mock())).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(
            registry.loaded_models(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
