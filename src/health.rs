//! Health and readiness probing over instantiated services.
//!
//! Instances are stored type-erased, so capability dispatch is explicit: a
//! service that implements [`HealthCheck`] or [`ReadinessCheck`] is wired
//! with [`Container::add_health_check`] / [`Container::add_readiness_check`],
//! which install a downcasting probe on its registry entry. Probing then
//! iterates every *instantiated* entry with a probe and runs all probes
//! concurrently; services that were never instantiated are skipped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::container::Container;
use crate::context::Context;
use crate::error::{BoxError, DiError, DiResult};
use crate::key::{key_of, key_of_named, ServiceKey};
use crate::registry::{BoxFuture, Instance};

/// Outcome of a single probe dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Up,
    Down,
    /// The probe could not be dispatched (the stored instance was not the
    /// wired type).
    Unknown,
}

/// One probe result, as returned by [`Container::health`].
#[derive(Debug)]
pub struct HealthReport {
    pub name: ServiceKey,
    pub status: HealthStatus,
    pub error: Option<BoxError>,
    pub latency: Duration,
}

/// Liveness capability. Implement on a service and wire it with
/// [`Container::add_health_check`].
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self, ctx: &Context) -> Result<(), BoxError>;
}

/// Readiness capability. Implement on a service and wire it with
/// [`Container::add_readiness_check`].
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn readiness_check(&self, ctx: &Context) -> Result<(), BoxError>;
}

pub(crate) enum ProbeOutcome {
    Up,
    Down(BoxError),
    NotApplicable,
}

/// Downcasting adapter from an erased instance to its capability trait.
pub(crate) type ProbeFn = Arc<dyn Fn(Context, Instance) -> BoxFuture<ProbeOutcome> + Send + Sync>;

fn health_probe<T: HealthCheck + 'static>() -> ProbeFn {
    Arc::new(|ctx, instance| {
        Box::pin(async move {
            match instance.downcast::<T>() {
                Ok(typed) => match typed.health_check(&ctx).await {
                    Ok(()) => ProbeOutcome::Up,
                    Err(err) => ProbeOutcome::Down(err),
                },
                Err(_) => ProbeOutcome::NotApplicable,
            }
        })
    })
}

fn readiness_probe<T: ReadinessCheck + 'static>() -> ProbeFn {
    Arc::new(|ctx, instance| {
        Box::pin(async move {
            match instance.downcast::<T>() {
                Ok(typed) => match typed.readiness_check(&ctx).await {
                    Ok(()) => ProbeOutcome::Up,
                    Err(err) => ProbeOutcome::Down(err),
                },
                Err(_) => ProbeOutcome::NotApplicable,
            }
        })
    })
}

impl Container {
    /// Wires the [`HealthCheck`] implementation of `T` to the entry keyed by
    /// `T`'s type.
    pub fn add_health_check<T: HealthCheck + 'static>(&self) {
        self.add_health_probe(&key_of::<T>(), health_probe::<T>());
    }

    /// Wires the [`HealthCheck`] implementation of `T` to the named entry
    /// `T#name`.
    pub fn add_health_check_named<T: HealthCheck + 'static>(&self, name: &str) {
        self.add_health_probe(&key_of_named::<T>(name), health_probe::<T>());
    }

    /// Wires the [`ReadinessCheck`] implementation of `T` to the entry keyed
    /// by `T`'s type.
    pub fn add_readiness_check<T: ReadinessCheck + 'static>(&self) {
        self.add_readiness_probe(&key_of::<T>(), readiness_probe::<T>());
    }

    /// Wires the [`ReadinessCheck`] implementation of `T` to the named entry
    /// `T#name`.
    pub fn add_readiness_check_named<T: ReadinessCheck + 'static>(&self, name: &str) {
        self.add_readiness_probe(&key_of_named::<T>(name), readiness_probe::<T>());
    }

    /// Liveness: runs every wired health probe over instantiated entries and
    /// fails with `HealthCheckFailed` on the first `Down` report seen.
    /// Report order is unspecified.
    pub async fn live(&self, ctx: &Context) -> DiResult<()> {
        first_down(self.run_probes(ctx, false).await)
    }

    /// Readiness: like [`live`](Container::live), over readiness probes.
    pub async fn ready(&self, ctx: &Context) -> DiResult<()> {
        first_down(self.run_probes(ctx, true).await)
    }

    /// Runs every wired health probe and returns all reports.
    pub async fn health(&self, ctx: &Context) -> Vec<HealthReport> {
        self.run_probes(ctx, false).await
    }

    async fn run_probes(&self, ctx: &Context, readiness: bool) -> Vec<HealthReport> {
        let targets = self.registry().probe_targets(readiness);

        let mut handles = Vec::with_capacity(targets.len());
        for (key, instance, probe) in targets {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let outcome = probe(ctx, instance).await;
                let latency = started.elapsed();
                match outcome {
                    ProbeOutcome::Up => HealthReport {
                        name: key,
                        status: HealthStatus::Up,
                        error: None,
                        latency,
                    },
                    ProbeOutcome::Down(err) => HealthReport {
                        name: key,
                        status: HealthStatus::Down,
                        error: Some(err),
                        latency,
                    },
                    ProbeOutcome::NotApplicable => HealthReport {
                        name: key,
                        status: HealthStatus::Unknown,
                        error: None,
                        latency,
                    },
                }
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(report) = handle.await {
                reports.push(report);
            }
        }
        reports
    }
}

fn first_down(reports: Vec<HealthReport>) -> DiResult<()> {
    for report in reports {
        if report.status == HealthStatus::Down {
            return Err(DiError::HealthCheckFailed {
                name: report.name,
                source: report.error,
            });
        }
    }
    Ok(())
}
