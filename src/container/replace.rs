//! Runtime provider replacement.
//!
//! Replace removes the key from both the registry and the graph, registers
//! the new provider or value, and re-tests for cycles. The cached singleton
//! instance (if any) is discarded by the removal; hooks attached after a
//! replacement bind to the new entry; the container's running state is
//! untouched. The old instance's on-stop hooks are not run.

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::registry::{Instance, ProviderFn};

impl Container {
    /// Replaces (or installs) the provider for `key`.
    ///
    /// On a cycle the new registration is rolled back and
    /// `CircularDependency` surfaces; the previous registration is gone
    /// either way.
    pub fn replace(
        &self,
        key: ServiceKey,
        provider: ProviderFn,
        dependencies: Vec<ServiceKey>,
    ) -> DiResult<()> {
        let _reg = self.inner.registration.lock().unwrap();

        self.inner.registry.remove(&key);
        let mut graph = self.inner.graph.write().unwrap();
        graph.remove_node(&key);

        self.inner
            .registry
            .register(key.clone(), provider, dependencies.clone());
        graph.add_node(key.clone(), dependencies);

        if graph.has_cycle() {
            let path = graph.find_cycle_path(&key).unwrap_or_default();
            graph.remove_node(&key);
            drop(graph);
            self.inner.registry.remove(&key);
            return Err(DiError::CircularDependency(path));
        }

        Ok(())
    }

    /// Replaces (or installs) a pre-built value for `key`.
    pub fn replace_value(&self, key: ServiceKey, instance: Instance) -> DiResult<()> {
        let _reg = self.inner.registration.lock().unwrap();

        self.inner.registry.remove(&key);
        let mut graph = self.inner.graph.write().unwrap();
        graph.remove_node(&key);

        self.inner.registry.register_value(key.clone(), instance);
        graph.add_node(key, Vec::new());
        Ok(())
    }
}
