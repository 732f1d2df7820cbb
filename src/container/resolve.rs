//! Scope-aware resolution.
//!
//! Resolution reads an entry snapshot, honors its scope policy, delegates to
//! the provider, applies decorators, and records the instance. A
//! per-container resolving set catches cycles that the static graph cannot
//! see (ad-hoc resolves inside provider bodies that bypass declared
//! dependencies); construction of a given key is therefore at-most-once, and
//! a concurrent resolve of a key already under construction fails with
//! `CircularDependency` rather than double-constructing.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::container::{Container, ContainerInner, ContainerState};
use crate::context::Context;
use crate::error::{DiError, DiResult, ErrorKind};
use crate::key::ServiceKey;
use crate::registry::{BoxFuture, Instance, ServiceEntry};
use crate::scope::Scope;

/// Removes the key from the resolving set when a resolve completes, whether
/// by success, error, or panic unwind.
struct ResolvingGuard {
    inner: Arc<ContainerInner>,
    key: ServiceKey,
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        self.inner.resolving.lock().unwrap().remove(&self.key);
    }
}

impl Container {
    /// Resolves an instance for `key` according to its scope policy.
    ///
    /// Every call emits a `Resolved` observer event with the elapsed time,
    /// including failed resolves.
    pub async fn resolve(&self, ctx: &Context, key: &ServiceKey) -> DiResult<Instance> {
        self.resolve_key(ctx.clone(), key.clone()).await
    }

    /// Boxed recursive entry point; dependency resolution re-enters here.
    pub(crate) fn resolve_key(
        &self,
        ctx: Context,
        key: ServiceKey,
    ) -> BoxFuture<DiResult<Instance>> {
        let container = self.clone();
        Box::pin(async move {
            let started = Instant::now();

            // Cached singletons skip the resolving-set guard, so concurrent
            // resolves of an already-built dependency never collide in it.
            if let Some(instance) = container.registry().instance_fast(&key) {
                container
                    .inner()
                    .observers
                    .resolved(&key, started.elapsed(), None);
                return Ok(instance);
            }

            let result = container.resolve_guarded(ctx, key.clone()).await;
            container
                .inner()
                .observers
                .resolved(&key, started.elapsed(), result.as_ref().err());
            result
        })
    }

    async fn resolve_guarded(&self, ctx: Context, key: ServiceKey) -> DiResult<Instance> {
        let _guard = {
            let mut resolving = self.inner().resolving.lock().unwrap();
            if !resolving.insert(key.clone()) {
                debug!(service = %key, "circular resolution detected");
                return Err(DiError::CircularDependency(vec![key]));
            }
            ResolvingGuard {
                inner: Arc::clone(&self.inner),
                key: key.clone(),
            }
        };

        let Some(entry) = self.registry().entry(&key) else {
            return Err(DiError::ServiceNotFound(key));
        };

        match entry.scope {
            Scope::Singleton => self.resolve_singleton(&ctx, &key, entry).await,
            Scope::Transient => self.construct(&ctx, &key, &entry).await,
            Scope::Request => self.resolve_request(&ctx, &key, &entry).await,
            Scope::Pooled => self.resolve_pooled(&ctx, &key, &entry).await,
        }
    }

    async fn resolve_singleton(
        &self,
        ctx: &Context,
        key: &ServiceKey,
        entry: ServiceEntry,
    ) -> DiResult<Instance> {
        if let Some(instance) = entry.instance {
            return Ok(instance);
        }

        let instance = self.construct(ctx, key, &entry).await?;

        // A lazy singleton first constructed while the container is Running
        // owes its on-start hooks now. The instance is cached only after the
        // hooks succeed, so a failed lazy start is retried wholesale.
        if entry.lazy && !entry.start_ran && self.state() == ContainerState::Running {
            self.run_lazy_start(ctx, key, &entry).await?;
        }

        self.registry().set_instance(key, instance.clone());
        Ok(instance)
    }

    /// Shared construction path: declared dependencies, provider, decorators.
    async fn construct(
        &self,
        ctx: &Context,
        key: &ServiceKey,
        entry: &ServiceEntry,
    ) -> DiResult<Instance> {
        for dep in &entry.dependencies {
            if let Err(err) = self.resolve_key(ctx.clone(), dep.clone()).await {
                return Err(DiError::ResolutionFailed {
                    key: key.clone(),
                    source: Box::new(err),
                });
            }
        }

        let provider = entry.provider.clone().ok_or_else(|| DiError::ResolutionFailed {
            key: key.clone(),
            source: "registered as a value; no provider to invoke".into(),
        })?;

        let instance = provider(ctx.clone(), self.clone())
            .await
            .map_err(|source| DiError::ProviderFailed {
                key: key.clone(),
                source,
            })?;

        self.apply_decorators(ctx, key, instance).await
    }

    async fn apply_decorators(
        &self,
        ctx: &Context,
        key: &ServiceKey,
        mut instance: Instance,
    ) -> DiResult<Instance> {
        let decorators = {
            let map = self.inner().decorators.read().unwrap();
            map.get(key).cloned().unwrap_or_default()
        };

        for decorator in decorators {
            instance = decorator(ctx.clone(), self.clone(), instance)
                .await
                .map_err(|source| match source.downcast::<DiError>() {
                    Ok(di) if di.kind() == ErrorKind::DecoratorTypeMismatch => *di,
                    Ok(di) => DiError::DecoratorFailed {
                        key: key.clone(),
                        source: di,
                    },
                    Err(source) => DiError::DecoratorFailed {
                        key: key.clone(),
                        source,
                    },
                })?;
        }
        Ok(instance)
    }

    async fn run_lazy_start(
        &self,
        ctx: &Context,
        key: &ServiceKey,
        entry: &ServiceEntry,
    ) -> DiResult<()> {
        let started = Instant::now();
        let mut start_err = None;

        for hook in &entry.on_start {
            debug!(service = %key, "running lazy on_start hook");
            if let Err(source) = hook(ctx.clone()).await {
                start_err = Some(DiError::StartupFailed {
                    key: key.clone(),
                    source,
                });
                break;
            }
        }

        if start_err.is_none() {
            self.registry().set_start_ran(key);
        }
        self.inner()
            .observers
            .started(key, started.elapsed(), start_err.as_ref());
        match start_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn resolve_request(
        &self,
        ctx: &Context,
        key: &ServiceKey,
        entry: &ServiceEntry,
    ) -> DiResult<Instance> {
        let Some(scope) = ctx.request_scope() else {
            return Err(DiError::ScopeNotFound(key.clone()));
        };

        if let Some(instance) = scope.get(key) {
            return Ok(instance);
        }

        let instance = self.construct(ctx, key, entry).await?;
        scope.set(key.clone(), instance.clone());
        Ok(instance)
    }

    async fn resolve_pooled(
        &self,
        ctx: &Context,
        key: &ServiceKey,
        entry: &ServiceEntry,
    ) -> DiResult<Instance> {
        if let Some(instance) = self.registry().acquire_from_pool(key) {
            return Ok(instance);
        }
        self.construct(ctx, key, entry).await
    }
}
