//! Thread-safe storage of service registrations.
//!
//! The registry owns one [`ServiceEntry`] per key: the provider, declared
//! dependencies, cached instance, hook lists, scope metadata, and the
//! bounded pool for pooled services. Readers receive cheap snapshots (every
//! entry field is reference-counted), so no registry lock is ever held
//! across a user callback.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

use crate::container::Container;
use crate::context::Context;
use crate::error::BoxError;
use crate::health::ProbeFn;
use crate::key::ServiceKey;
use crate::scope::Scope;

/// Boxed future used by providers, hooks, decorators, and probes.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A type-erased, shared service instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Construction logic for a service. Receives the resolving context and a
/// container handle for resolving further dependencies.
pub type ProviderFn =
    Arc<dyn Fn(Context, Container) -> BoxFuture<Result<Instance, BoxError>> + Send + Sync>;

/// Lifecycle hook. On-start hooks run in registration order, on-stop hooks
/// in reverse registration order.
pub type HookFn = Arc<dyn Fn(Context) -> BoxFuture<Result<(), BoxError>> + Send + Sync>;

/// Wraps an instance after construction; the returned instance flows into
/// the next decorator in registration order.
pub type DecoratorFn = Arc<
    dyn Fn(Context, Container, Instance) -> BoxFuture<Result<Instance, BoxError>> + Send + Sync,
>;

/// One registration: everything the resolver and orchestrator need to know
/// about a key.
#[derive(Clone)]
pub(crate) struct ServiceEntry {
    pub key: ServiceKey,
    /// Absent for value-only registrations.
    pub provider: Option<ProviderFn>,
    pub dependencies: Vec<ServiceKey>,
    /// `Some` once instantiated; cleared only by removal or replacement.
    pub instance: Option<Instance>,
    pub on_start: Vec<HookFn>,
    pub on_stop: Vec<HookFn>,
    pub scope: Scope,
    pub pool: Option<Arc<ServicePool>>,
    pub lazy: bool,
    pub start_ran: bool,
    pub health: Option<ProbeFn>,
    pub readiness: Option<ProbeFn>,
}

impl ServiceEntry {
    fn new(key: ServiceKey, provider: Option<ProviderFn>, dependencies: Vec<ServiceKey>) -> Self {
        Self {
            key,
            provider,
            dependencies,
            instance: None,
            on_start: Vec::new(),
            on_stop: Vec::new(),
            scope: Scope::default(),
            pool: None,
            lazy: false,
            start_ran: false,
            health: None,
            readiness: None,
        }
    }

    pub fn instantiated(&self) -> bool {
        self.instance.is_some()
    }
}

/// Bounded instance pool for [`Scope::Pooled`] services. Acquire and release
/// never block; a release into a full pool is refused.
pub(crate) struct ServicePool {
    capacity: usize,
    items: Mutex<VecDeque<Instance>>,
}

impl ServicePool {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn try_acquire(&self) -> Option<Instance> {
        self.items.lock().unwrap().pop_front()
    }

    fn try_release(&self, instance: Instance) -> bool {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(instance);
        true
    }
}

/// Keyed entry storage behind a reader-writer lock.
#[derive(Default)]
pub(crate) struct Registry {
    services: RwLock<HashMap<ServiceKey, ServiceEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: ServiceKey, provider: ProviderFn, dependencies: Vec<ServiceKey>) {
        let entry = ServiceEntry::new(key.clone(), Some(provider), dependencies);
        self.services.write().unwrap().insert(key, entry);
    }

    pub fn register_value(&self, key: ServiceKey, instance: Instance) {
        let mut entry = ServiceEntry::new(key.clone(), None, Vec::new());
        entry.instance = Some(instance);
        self.services.write().unwrap().insert(key, entry);
    }

    pub fn has(&self, key: &ServiceKey) -> bool {
        self.services.read().unwrap().contains_key(key)
    }

    /// Snapshot of an entry. Fields are reference-counted, so this is a
    /// shallow copy; instance and pool state are shared with the registry.
    pub fn entry(&self, key: &ServiceKey) -> Option<ServiceEntry> {
        self.services.read().unwrap().get(key).cloned()
    }

    /// Fast path for resolution: the cached instance of a Singleton entry.
    /// Lets repeat resolves of a built singleton skip the resolving-set
    /// guard entirely.
    pub fn instance_fast(&self, key: &ServiceKey) -> Option<Instance> {
        let services = self.services.read().unwrap();
        let entry = services.get(key)?;
        if entry.scope == Scope::Singleton {
            entry.instance.clone()
        } else {
            None
        }
    }

    /// The cached instance, if the entry exists and is instantiated.
    pub fn instance(&self, key: &ServiceKey) -> Option<Instance> {
        self.services
            .read()
            .unwrap()
            .get(key)
            .and_then(|entry| entry.instance.clone())
    }

    pub fn set_instance(&self, key: &ServiceKey, instance: Instance) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.instance = Some(instance);
        }
    }

    pub fn keys(&self) -> Vec<ServiceKey> {
        self.services.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.read().unwrap().len()
    }

    pub fn remove(&self, key: &ServiceKey) {
        self.services.write().unwrap().remove(key);
    }

    pub fn add_on_start(&self, key: &ServiceKey, hook: HookFn) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.on_start.push(hook);
        }
    }

    pub fn add_on_stop(&self, key: &ServiceKey, hook: HookFn) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.on_stop.push(hook);
        }
    }

    pub fn set_scope(&self, key: &ServiceKey, scope: Scope) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.scope = scope;
        }
    }

    pub fn set_pool_size(&self, key: &ServiceKey, size: usize) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.pool = (size > 0).then(|| Arc::new(ServicePool::new(size)));
        }
    }

    pub fn set_lazy(&self, key: &ServiceKey, lazy: bool) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.lazy = lazy;
        }
    }

    pub fn is_lazy(&self, key: &ServiceKey) -> bool {
        self.services
            .read()
            .unwrap()
            .get(key)
            .map(|entry| entry.lazy)
            .unwrap_or(false)
    }

    pub fn set_start_ran(&self, key: &ServiceKey) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.start_ran = true;
        }
    }

    pub fn acquire_from_pool(&self, key: &ServiceKey) -> Option<Instance> {
        let pool = self.services.read().unwrap().get(key)?.pool.clone()?;
        pool.try_acquire()
    }

    pub fn release_to_pool(&self, key: &ServiceKey, instance: Instance) -> bool {
        let pool = self
            .services
            .read()
            .unwrap()
            .get(key)
            .and_then(|entry| entry.pool.clone());
        match pool {
            Some(pool) => pool.try_release(instance),
            None => false,
        }
    }

    pub fn set_health_probe(&self, key: &ServiceKey, probe: ProbeFn) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.health = Some(probe);
        }
    }

    pub fn set_readiness_probe(&self, key: &ServiceKey, probe: ProbeFn) {
        if let Some(entry) = self.services.write().unwrap().get_mut(key) {
            entry.readiness = Some(probe);
        }
    }

    /// Instantiated entries carrying the requested probe, for concurrent
    /// health iteration. Never-instantiated entries are skipped.
    pub fn probe_targets(&self, readiness: bool) -> Vec<(ServiceKey, Instance, ProbeFn)> {
        self.services
            .read()
            .unwrap()
            .values()
            .filter_map(|entry| {
                let instance = entry.instance.clone()?;
                let probe = if readiness {
                    entry.readiness.clone()?
                } else {
                    entry.health.clone()?
                };
                Some((entry.key.clone(), instance, probe))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_instance(n: u32) -> Instance {
        Arc::new(n)
    }

    #[test]
    fn value_registrations_are_instantiated() {
        let registry = Registry::new();
        let key = ServiceKey::from("val");
        registry.register_value(key.clone(), value_instance(5));

        let entry = registry.entry(&key).expect("entry");
        assert!(entry.instantiated());
        assert!(entry.provider.is_none());
        assert!(registry.instance(&key).is_some());
    }

    #[test]
    fn pool_respects_capacity() {
        let registry = Registry::new();
        let key = ServiceKey::from("pooled");
        registry.register_value(key.clone(), value_instance(0));
        registry.set_pool_size(&key, 2);

        assert!(registry.acquire_from_pool(&key).is_none());
        assert!(registry.release_to_pool(&key, value_instance(1)));
        assert!(registry.release_to_pool(&key, value_instance(2)));
        assert!(!registry.release_to_pool(&key, value_instance(3)));

        assert!(registry.acquire_from_pool(&key).is_some());
        assert!(registry.acquire_from_pool(&key).is_some());
        assert!(registry.acquire_from_pool(&key).is_none());
    }

    #[test]
    fn release_without_pool_is_refused() {
        let registry = Registry::new();
        let key = ServiceKey::from("plain");
        registry.register_value(key.clone(), value_instance(0));

        assert!(!registry.release_to_pool(&key, value_instance(1)));
        assert!(!registry.release_to_pool(&ServiceKey::from("ghost"), value_instance(1)));
    }

    #[test]
    fn hook_lists_preserve_order() {
        let registry = Registry::new();
        let key = ServiceKey::from("svc");
        registry.register_value(key.clone(), value_instance(0));

        for _ in 0..3 {
            let hook: HookFn = Arc::new(|_ctx| Box::pin(async { Ok(()) }));
            registry.add_on_start(&key, hook.clone());
            registry.add_on_stop(&key, hook);
        }

        let entry = registry.entry(&key).expect("entry");
        assert_eq!(entry.on_start.len(), 3);
        assert_eq!(entry.on_stop.len(), 3);
    }
}
