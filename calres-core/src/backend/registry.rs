use std::sync::Arc;

use crate::backend::{Backend, BackendRegistry};

#[derive(Clone, Default)]
pub struct Registry {
    backends: Vec<Arc<dyn Backend>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend. A later backend with the same identifier replaces the earlier one.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends
            .retain(|b| b.identifier() != backend.identifier());
        self.backends.push(backend);
    }

    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.register(backend);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }
}

impl BackendRegistry for Registry {
    fn backends(&self) -> Vec<Arc<dyn Backend>> {
        self.backends.clone()
    }

    fn backend(&self, id: &str) -> Option<Arc<dyn Backend>> {
        self.backends.iter().find(|b| b.identifier() == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[test]
    fn test_resolve_by_identifier() {
        let registry = Registry::new()
            .with(Arc::new(FakeBackend::new("backend3")))
            .with(Arc::new(FakeBackend::unavailable("backend2")));

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.backend("backend2").map(|b| b.identifier().to_string()),
            Some("backend2".to_string())
        );
        assert!(registry.backend("backend1").is_none());
    }

    #[test]
    fn test_register_replaces_same_identifier() {
        let registry = Registry::new()
            .with(Arc::new(FakeBackend::unavailable("backend3")))
            .with(Arc::new(FakeBackend::new("backend3")));

        assert_eq!(registry.len(), 1);
        let ids: Vec<_> = registry
            .backends()
            .iter()
            .map(|b| b.identifier().to_string())
            .collect();
        assert_eq!(ids, vec!["backend3"]);
    }
}
