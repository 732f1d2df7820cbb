//! Lifecycle orchestration: ordered startup and shutdown.
//!
//! Start walks the graph's startup order (or its parallel level groups),
//! resolving each non-lazy service and running its on-start hooks; the first
//! failure short-circuits and the container stays in Starting. Stop walks
//! the reverse order, skipping never-instantiated entries, running on-stop
//! hooks in reverse registration order, collecting errors rather than
//! aborting, and honoring the shutdown deadline between services. The final
//! state after stop is always Stopped.

use std::time::Instant;

use tracing::debug;

use crate::container::{Container, ContainerState};
use crate::context::Context;
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;

impl Container {
    /// Starts every non-lazy service in dependency order.
    ///
    /// Allowed from `New` or `Stopped` only; other states fail with
    /// `ContainerAlreadyStarted`. On success the container is `Running`. On
    /// failure the first error surfaces as `StartupFailed` and the container
    /// remains in `Starting`; tearing down partially started services is
    /// left to the caller.
    pub async fn start(&self, ctx: &Context) -> DiResult<()> {
        {
            let mut state = self.inner.state.write().unwrap();
            match *state {
                ContainerState::New | ContainerState::Stopped => {
                    *state = ContainerState::Starting;
                }
                _ => return Err(DiError::ContainerAlreadyStarted),
            }
        }

        if self.inner.parallel {
            self.start_parallel(ctx).await?;
        } else {
            self.start_sequential(ctx).await?;
        }

        *self.inner.state.write().unwrap() = ContainerState::Running;
        debug!("container running");
        Ok(())
    }

    async fn start_sequential(&self, ctx: &Context) -> DiResult<()> {
        let order = self.inner.graph.read().unwrap().startup_order()?;
        for key in order {
            self.start_service(ctx, &key).await?;
        }
        Ok(())
    }

    async fn start_parallel(&self, ctx: &Context) -> DiResult<()> {
        let groups = self.inner.graph.read().unwrap().parallel_startup_groups()?;
        for group in groups {
            self.start_group(ctx, group.keys).await?;
        }
        Ok(())
    }

    /// Starts one level group. Every dependency of the group finished in an
    /// earlier group, so members start concurrently and the group joins
    /// before returning; the first collected error surfaces after the join.
    async fn start_group(&self, ctx: &Context, keys: Vec<ServiceKey>) -> DiResult<()> {
        if keys.len() == 1 {
            return self.start_service(ctx, &keys[0]).await;
        }

        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if self.registry().is_lazy(&key) {
                continue;
            }
            let container = self.clone();
            let ctx = ctx.clone();
            let task_key = key.clone();
            handles.push((
                key,
                tokio::spawn(async move { container.start_service(&ctx, &task_key).await }),
            ));
        }

        let mut first_err = None;
        for (key, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(DiError::StartupFailed {
                    key,
                    source: Box::new(join_err),
                }),
            };
            if first_err.is_none() {
                first_err = result.err();
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub(crate) async fn start_service(&self, ctx: &Context, key: &ServiceKey) -> DiResult<()> {
        if self.registry().is_lazy(key) {
            return Ok(());
        }

        let started = Instant::now();

        if let Err(err) = self.resolve(ctx, key).await {
            let err = DiError::StartupFailed {
                key: key.clone(),
                source: Box::new(err),
            };
            self.inner
                .observers
                .started(key, started.elapsed(), Some(&err));
            return Err(err);
        }

        let Some(entry) = self.registry().entry(key) else {
            return Ok(());
        };

        let mut start_err = None;
        for hook in &entry.on_start {
            debug!(service = %key, "running on_start hook");
            if let Err(source) = hook(ctx.clone()).await {
                start_err = Some(DiError::StartupFailed {
                    key: key.clone(),
                    source,
                });
                break;
            }
        }

        self.registry().set_start_ran(key);
        self.inner
            .observers
            .started(key, started.elapsed(), start_err.as_ref());
        match start_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stops every instantiated service in reverse dependency order.
    ///
    /// A no-op success unless the container is `Running`. When a shutdown
    /// timeout is configured the caller's context is wrapped with it; the
    /// deadline is checked between services and, once expired, remaining
    /// services are skipped and a `Timeout` is collected. Per-hook failures
    /// are collected without aborting. The container ends `Stopped`
    /// regardless; collected errors aggregate into `ShutdownFailed`.
    pub async fn stop(&self, ctx: &Context) -> DiResult<()> {
        {
            let mut state = self.inner.state.write().unwrap();
            if *state != ContainerState::Running {
                return Ok(());
            }
            *state = ContainerState::Stopping;
        }

        let ctx = match self.inner.shutdown_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        let errors = if self.inner.parallel {
            self.stop_parallel(&ctx).await
        } else {
            self.stop_sequential(&ctx).await
        };

        *self.inner.state.write().unwrap() = ContainerState::Stopped;
        debug!("container stopped");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::ShutdownFailed(errors))
        }
    }

    async fn stop_sequential(&self, ctx: &Context) -> Vec<DiError> {
        let order = match self.inner.graph.read().unwrap().shutdown_order() {
            Ok(order) => order,
            Err(err) => return vec![err],
        };

        let mut errors = Vec::new();
        for key in order {
            if let Some(err) = ctx.err() {
                errors.push(err);
                break;
            }
            errors.extend(self.stop_service(ctx, &key).await);
        }
        errors
    }

    async fn stop_parallel(&self, ctx: &Context) -> Vec<DiError> {
        let groups = match self.inner.graph.read().unwrap().parallel_shutdown_groups() {
            Ok(groups) => groups,
            Err(err) => return vec![err],
        };

        let mut errors = Vec::new();
        for group in groups {
            if let Some(err) = ctx.err() {
                errors.push(err);
                break;
            }
            errors.extend(self.stop_group(ctx, group.keys).await);
        }
        errors
    }

    async fn stop_group(&self, ctx: &Context, keys: Vec<ServiceKey>) -> Vec<DiError> {
        if keys.len() == 1 {
            return self.stop_service(ctx, &keys[0]).await;
        }

        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if self.registry().instance(&key).is_none() {
                continue;
            }
            let container = self.clone();
            let ctx = ctx.clone();
            let task_key = key.clone();
            handles.push((
                key,
                tokio::spawn(async move { container.stop_service(&ctx, &task_key).await }),
            ));
        }

        let mut errors = Vec::new();
        for (key, handle) in handles {
            match handle.await {
                Ok(errs) => errors.extend(errs),
                Err(join_err) => errors.push(DiError::StopFailed {
                    key,
                    source: Box::new(join_err),
                }),
            }
        }
        errors
    }

    /// Runs one service's on-stop hooks in reverse registration order,
    /// collecting every failure. Skips entries that were never instantiated.
    async fn stop_service(&self, ctx: &Context, key: &ServiceKey) -> Vec<DiError> {
        let Some(entry) = self.registry().entry(key) else {
            return Vec::new();
        };
        if !entry.instantiated() {
            return Vec::new();
        }

        let started = Instant::now();
        let mut errors = Vec::new();

        for hook in entry.on_stop.iter().rev() {
            debug!(service = %key, "running on_stop hook");
            if let Err(source) = hook(ctx.clone()).await {
                errors.push(DiError::StopFailed {
                    key: key.clone(),
                    source,
                });
            }
        }

        self.inner
            .observers
            .stopped(key, started.elapsed(), errors.first());
        errors
    }
}
