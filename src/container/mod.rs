//! The container facade: registration, state machine, and configuration.
//!
//! A [`Container`] is a cheap-clone handle over shared inner state — the
//! registry, the dependency graph, the decorator map, the resolving set, and
//! the lifecycle state machine. Registration mutates registry and graph
//! atomically and rejects cycle-inducing registrations; resolution and
//! lifecycle live in the sibling modules.

mod lifecycle;
mod replace;
mod resolve;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::error::{DiError, DiResult};
use crate::graph::DepGraph;
use crate::key::ServiceKey;
use crate::observer::{Observers, ProvideObserver, ResolveObserver, StartObserver, StopObserver};
use crate::registry::{DecoratorFn, HookFn, Instance, ProviderFn, Registry};
use crate::scope::Scope;

/// Lifecycle state of a container.
///
/// Transitions only along `New -> Starting -> Running -> Stopping ->
/// Stopped` (and `Stopped -> Starting` on restart). `stop` on a non-Running
/// container is a no-op success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    New,
    Starting,
    Running,
    Stopping,
    Stopped,
}

pub(crate) struct ContainerInner {
    pub(crate) registry: Registry,
    pub(crate) graph: RwLock<DepGraph>,
    pub(crate) decorators: RwLock<HashMap<ServiceKey, Vec<DecoratorFn>>>,
    pub(crate) resolving: Mutex<HashSet<ServiceKey>>,
    pub(crate) state: RwLock<ContainerState>,
    pub(crate) observers: Observers,
    pub(crate) shutdown_timeout: Option<Duration>,
    pub(crate) parallel: bool,
    /// Serializes register/replace/remove with their cycle test, so the
    /// registry and graph never diverge mid-mutation.
    pub(crate) registration: Mutex<()>,
}

/// The dependency-injection container.
///
/// Cloning shares the same underlying container; handles are `Send + Sync`
/// and may be used from any task.
///
/// # Examples
///
/// ```
/// use weft_di::{provide, invoke, Container, Context};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let container = Container::new();
/// provide::<Greeter, _, _>(&container, |_ctx, _c| async {
///     Ok(Greeter { greeting: "hello".to_string() })
/// }).unwrap();
///
/// let ctx = Context::background();
/// container.start(&ctx).await.unwrap();
///
/// let greeter = invoke::<Greeter>(&container, &ctx).await.unwrap();
/// assert_eq!(greeter.greeting, "hello");
///
/// container.stop(&ctx).await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Creates a container with default configuration: sequential lifecycle,
    /// no shutdown timeout, no observers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts configuring a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    pub(crate) fn inner(&self) -> &ContainerInner {
        &self.inner
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Registers a provider for `key` with its declared dependencies.
    ///
    /// Fails with `DuplicateService` if the key is taken, and with
    /// `CircularDependency` if the declared edges would close a cycle — in
    /// which case both the entry and the graph node are rolled back.
    pub fn register(
        &self,
        key: ServiceKey,
        provider: ProviderFn,
        dependencies: Vec<ServiceKey>,
    ) -> DiResult<()> {
        {
            let _reg = self.inner.registration.lock().unwrap();
            if self.inner.registry.has(&key) {
                return Err(DiError::DuplicateService(key));
            }

            self.inner
                .registry
                .register(key.clone(), provider, dependencies.clone());
            let mut graph = self.inner.graph.write().unwrap();
            graph.add_node(key.clone(), dependencies);

            if graph.has_cycle() {
                let path = graph.find_cycle_path(&key).unwrap_or_default();
                graph.remove_node(&key);
                drop(graph);
                self.inner.registry.remove(&key);
                return Err(DiError::CircularDependency(path));
            }
        }

        debug!(service = %key, "registered provider");
        self.inner.observers.provided(&key);
        Ok(())
    }

    /// Registers a pre-built instance for `key`. The entry is immediately
    /// instantiated and has no dependencies.
    pub fn register_value(&self, key: ServiceKey, instance: Instance) -> DiResult<()> {
        {
            let _reg = self.inner.registration.lock().unwrap();
            if self.inner.registry.has(&key) {
                return Err(DiError::DuplicateService(key));
            }
            self.inner.registry.register_value(key.clone(), instance);
            self.inner
                .graph
                .write()
                .unwrap()
                .add_node(key.clone(), Vec::new());
        }

        debug!(service = %key, "registered value");
        self.inner.observers.provided(&key);
        Ok(())
    }

    /// Removes a registration and its graph node. Dependents keep their
    /// (now dangling) declared edges; `validate` will report them.
    pub fn remove(&self, key: &ServiceKey) {
        let _reg = self.inner.registration.lock().unwrap();
        self.inner.registry.remove(key);
        self.inner.graph.write().unwrap().remove_node(key);
    }

    pub fn has(&self, key: &ServiceKey) -> bool {
        self.inner.registry.has(key)
    }

    /// Every registered key, in unspecified order.
    pub fn keys(&self) -> Vec<ServiceKey> {
        self.inner.registry.keys()
    }

    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.len() == 0
    }

    /// The cached instance for `key`, if instantiated.
    pub fn instance_of(&self, key: &ServiceKey) -> Option<Instance> {
        self.inner.registry.instance(key)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContainerState {
        *self.inner.state.read().unwrap()
    }

    /// Overrides the scope policy for a key (default Singleton).
    pub fn set_scope(&self, key: &ServiceKey, scope: Scope) {
        self.inner.registry.set_scope(key, scope);
    }

    /// Sets the bounded pool capacity for a pooled key.
    pub fn set_pool_size(&self, key: &ServiceKey, size: usize) {
        self.inner.registry.set_pool_size(key, size);
    }

    /// Marks a key lazy: instantiation and on-start hooks are deferred to
    /// the first resolve while Running.
    pub fn set_lazy(&self, key: &ServiceKey, lazy: bool) {
        self.inner.registry.set_lazy(key, lazy);
    }

    /// Returns a pooled instance to its pool. `false` when the pool is full
    /// (the instance is dropped) or the key has no pool.
    pub fn release(&self, key: &ServiceKey, instance: Instance) -> bool {
        self.inner.registry.release_to_pool(key, instance)
    }

    /// Appends an on-start hook to a key's entry.
    pub fn add_on_start(&self, key: &ServiceKey, hook: HookFn) {
        self.inner.registry.add_on_start(key, hook);
    }

    /// Appends an on-stop hook to a key's entry.
    pub fn add_on_stop(&self, key: &ServiceKey, hook: HookFn) {
        self.inner.registry.add_on_stop(key, hook);
    }

    /// Appends a decorator to a key. Decorators run after construction in
    /// registration order, for every scope.
    pub fn add_decorator(&self, key: ServiceKey, decorator: DecoratorFn) {
        self.inner
            .decorators
            .write()
            .unwrap()
            .entry(key)
            .or_default()
            .push(decorator);
    }

    pub(crate) fn add_health_probe(&self, key: &ServiceKey, probe: crate::health::ProbeFn) {
        self.inner.registry.set_health_probe(key, probe);
    }

    pub(crate) fn add_readiness_probe(&self, key: &ServiceKey, probe: crate::health::ProbeFn) {
        self.inner.registry.set_readiness_probe(key, probe);
    }

    /// Checks the whole graph: every declared dependency resolves to a
    /// registered node and no cycles exist.
    pub fn validate(&self) -> DiResult<()> {
        let graph = self.inner.graph.read().unwrap();
        let missing = graph.validate();
        let cycles = graph.detect_cycles();
        if missing.is_empty() && cycles.is_empty() {
            Ok(())
        } else {
            Err(DiError::ValidationFailed { missing, cycles })
        }
    }

    /// Structured snapshot of the graph and instantiation state, sorted by
    /// key.
    pub fn graph_info(&self) -> GraphInfo {
        let graph = self.inner.graph.read().unwrap();
        let mut keys = self.inner.registry.keys();
        keys.sort();

        let services = keys
            .into_iter()
            .map(|key| {
                let entry = self.inner.registry.entry(&key);
                ServiceInfo {
                    dependencies: graph
                        .dependencies(&key)
                        .map(<[ServiceKey]>::to_vec)
                        .unwrap_or_default(),
                    dependents: graph.dependents(&key),
                    instantiated: entry.as_ref().map(|e| e.instantiated()).unwrap_or(false),
                    scope: entry.map(|e| e.scope).unwrap_or_default(),
                    key,
                }
            })
            .collect();

        GraphInfo { services }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.len())
            .field("state", &self.state())
            .field("parallel", &self.inner.parallel)
            .finish()
    }
}

/// Configuration builder for [`Container`].
///
/// ```
/// use std::time::Duration;
/// use weft_di::Container;
///
/// let container = Container::builder()
///     .parallel(true)
///     .shutdown_timeout(Duration::from_secs(5))
///     .build();
/// assert!(container.is_empty());
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    parallel: bool,
    shutdown_timeout: Option<Duration>,
    observers: Observers,
}

impl ContainerBuilder {
    /// Uses layered-group orchestration on start and stop: services whose
    /// dependencies are all satisfied run concurrently within a level.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Bounds `stop`: the caller's context is wrapped with this timeout and
    /// the deadline is checked between services.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Observes every resolve with its duration and outcome.
    pub fn on_resolve<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ServiceKey, Duration, Option<&DiError>) + Send + Sync + 'static,
    {
        self.observers.on_resolve.push(Arc::new(observer) as ResolveObserver);
        self
    }

    /// Observes every registration.
    pub fn on_provide<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ServiceKey) + Send + Sync + 'static,
    {
        self.observers.on_provide.push(Arc::new(observer) as ProvideObserver);
        self
    }

    /// Observes every service start attempt.
    pub fn on_start<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ServiceKey, Duration, Option<&DiError>) + Send + Sync + 'static,
    {
        self.observers.on_start.push(Arc::new(observer) as StartObserver);
        self
    }

    /// Observes every service stop attempt.
    pub fn on_stop<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ServiceKey, Duration, Option<&DiError>) + Send + Sync + 'static,
    {
        self.observers.on_stop.push(Arc::new(observer) as StopObserver);
        self
    }

    pub fn build(self) -> Container {
        Container {
            inner: Arc::new(ContainerInner {
                registry: Registry::new(),
                graph: RwLock::new(DepGraph::new()),
                decorators: RwLock::new(HashMap::new()),
                resolving: Mutex::new(HashSet::new()),
                state: RwLock::new(ContainerState::New),
                observers: self.observers,
                shutdown_timeout: self.shutdown_timeout,
                parallel: self.parallel,
                registration: Mutex::new(()),
            }),
        }
    }
}

/// Snapshot of the container's graph, from [`Container::graph_info`].
#[derive(Debug, Clone)]
pub struct GraphInfo {
    pub services: Vec<ServiceInfo>,
}

/// Per-service line of a [`GraphInfo`] snapshot.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub key: ServiceKey,
    pub dependencies: Vec<ServiceKey>,
    pub dependents: Vec<ServiceKey>,
    pub instantiated: bool,
    pub scope: Scope,
}
