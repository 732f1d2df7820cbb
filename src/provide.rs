//! Typed provider registration.
//!
//! [`provide`] and [`provide_value`] are the typed front door to
//! [`Container::register`] / [`Container::register_value`]: the service key
//! is minted from the provided type, the factory's return value is erased
//! into a shared instance, and [`ProvideOpts`] carries the per-provider
//! options — name, declared dependencies, lifecycle hooks, scope, pool size,
//! and laziness.

use std::future::Future;
use std::sync::Arc;

use crate::container::Container;
use crate::context::Context;
use crate::error::{BoxError, DiResult};
use crate::key::{key_of, key_of_named, ServiceKey};
use crate::registry::{HookFn, Instance, ProviderFn};
use crate::scope::Scope;

/// Wraps an async closure into a [`HookFn`] for the raw hook APIs.
pub fn hook<F, Fut>(f: F) -> HookFn
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Per-provider registration options.
///
/// ```
/// use weft_di::{provide_with, Container, ProvideOpts, Scope};
///
/// struct Worker;
///
/// let container = Container::new();
/// provide_with::<Worker, _, _>(
///     &container,
///     |_ctx, _c| async { Ok(Worker) },
///     ProvideOpts::new()
///         .named("background")
///         .scope(Scope::Transient),
/// )
/// .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct ProvideOpts {
    pub(crate) name: Option<String>,
    pub(crate) dependencies: Vec<ServiceKey>,
    pub(crate) on_start: Vec<HookFn>,
    pub(crate) on_stop: Vec<HookFn>,
    pub(crate) scope: Option<Scope>,
    pub(crate) pool_size: Option<usize>,
    pub(crate) lazy: bool,
}

impl ProvideOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers under the named key `<type>#<name>`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declares dependency edges for the graph. The graph orders startup and
    /// shutdown by these; resolves done ad-hoc inside the provider body are
    /// only caught at runtime by the re-entrancy guard.
    pub fn dependencies<I>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = ServiceKey>,
    {
        self.dependencies.extend(deps);
        self
    }

    /// Declares a dependency on `D`'s key.
    pub fn depends_on<D: ?Sized>(mut self) -> Self {
        self.dependencies.push(key_of::<D>());
        self
    }

    /// Appends an on-start hook. Hooks run in registration order.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_start.push(hook(f));
        self
    }

    /// Appends an on-stop hook. Hooks run in reverse registration order.
    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_stop.push(hook(f));
        self
    }

    /// Overrides the default Singleton scope.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Bounds the instance pool and implies [`Scope::Pooled`].
    pub fn pool_size(mut self, size: usize) -> Self {
        self.scope = Some(Scope::Pooled);
        self.pool_size = Some(size);
        self
    }

    /// Defers instantiation and on-start hooks to the first resolve while
    /// the container is running.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    fn key_for<T: ?Sized>(&self) -> ServiceKey {
        match &self.name {
            Some(name) => key_of_named::<T>(name),
            None => key_of::<T>(),
        }
    }
}

/// Registers a provider for `T` under its type key.
pub fn provide<T, F, Fut>(container: &Container, factory: F) -> DiResult<()>
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    provide_with::<T, F, Fut>(container, factory, ProvideOpts::new())
}

/// Registers a provider for `T` under the named key `<T>#<name>`.
pub fn provide_named<T, F, Fut>(container: &Container, name: &str, factory: F) -> DiResult<()>
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    provide_with::<T, F, Fut>(container, factory, ProvideOpts::new().named(name))
}

/// Registers a provider for `T` with explicit options.
pub fn provide_with<T, F, Fut>(container: &Container, factory: F, opts: ProvideOpts) -> DiResult<()>
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    let key = opts.key_for::<T>();

    let provider: ProviderFn = Arc::new(move |ctx, c| {
        let fut = factory(ctx, c);
        Box::pin(async move {
            let value = fut.await?;
            Ok(Arc::new(value) as Instance)
        })
    });

    container.register(key.clone(), provider, opts.dependencies.clone())?;
    apply_entry_opts(container, &key, &opts);
    Ok(())
}

/// Registers a pre-built value for `T` under its type key.
pub fn provide_value<T: Send + Sync + 'static>(container: &Container, value: T) -> DiResult<()> {
    provide_value_with(container, value, ProvideOpts::new())
}

/// Registers a pre-built value for `T` under the named key `<T>#<name>`.
pub fn provide_named_value<T: Send + Sync + 'static>(
    container: &Container,
    name: &str,
    value: T,
) -> DiResult<()> {
    provide_value_with(container, value, ProvideOpts::new().named(name))
}

/// Registers a pre-built value for `T` with explicit options. The entry is
/// instantiated immediately, so scope, pool, and lazy options do not apply;
/// hooks do.
pub fn provide_value_with<T: Send + Sync + 'static>(
    container: &Container,
    value: T,
    opts: ProvideOpts,
) -> DiResult<()> {
    register_instance_with::<T>(container, Arc::new(value), &opts)
}

/// Replaces (or installs) the provider for `T`'s type key. The previous
/// registration — including any cached singleton instance — is discarded;
/// the container's running state is untouched.
pub fn replace<T, F, Fut>(container: &Container, factory: F) -> DiResult<()>
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    replace_with::<T, F, Fut>(container, factory, ProvideOpts::new())
}

/// Replaces (or installs) the provider for `T` with explicit options.
pub fn replace_with<T, F, Fut>(container: &Container, factory: F, opts: ProvideOpts) -> DiResult<()>
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    let key = opts.key_for::<T>();

    let provider: ProviderFn = Arc::new(move |ctx, c| {
        let fut = factory(ctx, c);
        Box::pin(async move {
            let value = fut.await?;
            Ok(Arc::new(value) as Instance)
        })
    });

    container.replace(key.clone(), provider, opts.dependencies.clone())?;
    apply_entry_opts(container, &key, &opts);
    Ok(())
}

/// Replaces (or installs) a pre-built value for `T`'s type key.
pub fn replace_value<T: Send + Sync + 'static>(container: &Container, value: T) -> DiResult<()> {
    replace_value_with(container, value, ProvideOpts::new())
}

/// Replaces (or installs) a pre-built value for `T` with explicit options.
pub fn replace_value_with<T: Send + Sync + 'static>(
    container: &Container,
    value: T,
    opts: ProvideOpts,
) -> DiResult<()> {
    let key = opts.key_for::<T>();
    container.replace_value(key.clone(), Arc::new(value))?;
    for hook in &opts.on_start {
        container.add_on_start(&key, hook.clone());
    }
    for hook in &opts.on_stop {
        container.add_on_stop(&key, hook.clone());
    }
    Ok(())
}

pub(crate) fn register_instance_with<T: ?Sized>(
    container: &Container,
    instance: Instance,
    opts: &ProvideOpts,
) -> DiResult<()> {
    let key = opts.key_for::<T>();
    container.register_value(key.clone(), instance)?;
    for hook in &opts.on_start {
        container.add_on_start(&key, hook.clone());
    }
    for hook in &opts.on_stop {
        container.add_on_stop(&key, hook.clone());
    }
    Ok(())
}

fn apply_entry_opts(container: &Container, key: &ServiceKey, opts: &ProvideOpts) {
    for hook in &opts.on_start {
        container.add_on_start(key, hook.clone());
    }
    for hook in &opts.on_stop {
        container.add_on_stop(key, hook.clone());
    }
    if let Some(scope) = opts.scope {
        container.set_scope(key, scope);
    }
    if let Some(size) = opts.pool_size {
        container.set_pool_size(key, size);
    }
    if opts.lazy {
        container.set_lazy(key, true);
    }
}
