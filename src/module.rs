//! Deferred registration modules.
//!
//! A [`Module`] is a lazy, named record of providers, bindings, decorators,
//! and submodules. Nothing touches a container until
//! [`Container::apply`] replays the module onto it, walking depth-first:
//! submodules first (so a parent may bind or decorate over what its
//! submodules provide), then providers, then bindings, then decorators. The
//! first failure inside a module aborts the walk and surfaces
//! `ModuleApplyFailed` naming the module.

use std::future::Future;
use std::sync::Arc;

use crate::bind::{bind_key, decorate_key, CoerceFn};
use crate::container::Container;
use crate::context::Context;
use crate::error::{BoxError, DiError, DiResult};
use crate::key::{key_of, key_of_named};
use crate::provide::{provide_with, register_instance_with, ProvideOpts};
use crate::registry::Instance;

type ApplyFn = Arc<dyn Fn(&Container) -> DiResult<()> + Send + Sync>;

/// A reusable group of registrations.
///
/// ```
/// use weft_di::{invoke, Container, Context, Module};
///
/// struct Config {
///     url: String,
/// }
/// struct Client {
///     url: String,
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let storage = Module::new("storage")
///     .provide_value(Config { url: "db://local".to_string() })
///     .provide::<Client, _, _>(|ctx, c| async move {
///         let config = weft_di::invoke::<Config>(&c, &ctx).await?;
///         Ok(Client { url: config.url.clone() })
///     });
///
/// let container = Container::new();
/// container.apply(&[storage]).unwrap();
///
/// let ctx = Context::background();
/// let client = invoke::<Client>(&container, &ctx).await.unwrap();
/// assert_eq!(client.url, "db://local");
/// # });
/// ```
pub struct Module {
    name: String,
    providers: Vec<ApplyFn>,
    bindings: Vec<ApplyFn>,
    decorators: Vec<ApplyFn>,
    submodules: Vec<Module>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            providers: Vec::new(),
            bindings: Vec::new(),
            decorators: Vec::new(),
            submodules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records a provider registration for `T`.
    pub fn provide<T, F, Fut>(self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        self.provide_opts::<T, F, Fut>(factory, ProvideOpts::new())
    }

    /// Records a provider registration for `T` with options.
    pub fn provide_opts<T, F, Fut>(mut self, factory: F, opts: ProvideOpts) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let factory = Arc::new(factory);
        self.providers.push(Arc::new(move |container: &Container| {
            let factory = Arc::clone(&factory);
            provide_with::<T, _, _>(
                container,
                move |ctx, c| (factory)(ctx, c),
                opts.clone(),
            )
        }));
        self
    }

    /// Records a value registration for `T`. Applying the module to several
    /// containers shares the one instance.
    pub fn provide_value<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.provide_value_opts(value, ProvideOpts::new())
    }

    /// Records a value registration for `T` with options.
    pub fn provide_value_opts<T: Send + Sync + 'static>(
        mut self,
        value: T,
        opts: ProvideOpts,
    ) -> Self {
        let instance: Instance = Arc::new(value);
        self.providers.push(Arc::new(move |container: &Container| {
            register_instance_with::<T>(container, instance.clone(), &opts)
        }));
        self
    }

    /// Records an interface binding from `I` to `T`.
    pub fn bind<I, T, F>(mut self, coerce: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let coerce: CoerceFn<I, T> = Arc::new(coerce);
        self.bindings.push(Arc::new(move |container: &Container| {
            bind_key::<I, T>(container, key_of::<I>(), Arc::clone(&coerce))
        }));
        self
    }

    /// Records a named interface binding from `I#name` to `T`.
    pub fn bind_named<I, T, F>(mut self, name: &str, coerce: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let coerce: CoerceFn<I, T> = Arc::new(coerce);
        let name = name.to_string();
        self.bindings.push(Arc::new(move |container: &Container| {
            bind_key::<I, T>(container, key_of_named::<I>(&name), Arc::clone(&coerce))
        }));
        self
    }

    /// Records a decorator for `T`.
    pub fn decorate<T, F, Fut>(mut self, decorator: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Context, Container, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, BoxError>> + Send + 'static,
    {
        let decorator = Arc::new(decorator);
        self.decorators.push(Arc::new(move |container: &Container| {
            let decorator = Arc::clone(&decorator);
            decorate_key::<T, _, _>(container, key_of::<T>(), move |ctx, c, instance| {
                (decorator)(ctx, c, instance)
            });
            Ok(())
        }));
        self
    }

    /// Nests a submodule. Submodules apply before this module's own
    /// providers, bindings, and decorators.
    pub fn include(mut self, submodule: Module) -> Self {
        self.submodules.push(submodule);
        self
    }

    fn apply_to(&self, container: &Container) -> DiResult<()> {
        for submodule in &self.submodules {
            submodule.apply_to(container)?;
        }
        for provider in &self.providers {
            provider(container)?;
        }
        for binding in &self.bindings {
            binding(container)?;
        }
        for decorator in &self.decorators {
            decorator(container)?;
        }
        Ok(())
    }
}

impl Container {
    /// Replays each module onto this container, depth-first. A failure
    /// inside a module surfaces `ModuleApplyFailed` naming it; earlier
    /// modules' registrations remain applied.
    pub fn apply(&self, modules: &[Module]) -> DiResult<()> {
        for module in modules {
            module
                .apply_to(self)
                .map_err(|source| DiError::ModuleApplyFailed {
                    module: module.name.clone(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}
