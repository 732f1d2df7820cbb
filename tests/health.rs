use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use weft_di::{
    provide, provide_with, BoxError, Container, Context, ErrorKind, HealthCheck, HealthStatus,
    ProvideOpts, ReadinessCheck,
};

#[derive(Debug)]
struct Database {
    healthy: AtomicBool,
}

#[async_trait]
impl HealthCheck for Database {
    async fn health_check(&self, _ctx: &Context) -> Result<(), BoxError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("connection refused".into())
        }
    }
}

#[async_trait]
impl ReadinessCheck for Database {
    async fn readiness_check(&self, _ctx: &Context) -> Result<(), BoxError> {
        self.health_check(_ctx).await
    }
}

fn provide_database(container: &Container, healthy: bool) {
    provide::<Database, _, _>(container, move |_ctx, _c| async move {
        Ok(Database {
            healthy: AtomicBool::new(healthy),
        })
    })
    .unwrap();
    container.add_health_check::<Database>();
    container.add_readiness_check::<Database>();
}

#[tokio::test]
async fn live_passes_when_probes_are_up() {
    let container = Container::new();
    provide_database(&container, true);

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    container.live(&ctx).await.unwrap();
    container.ready(&ctx).await.unwrap();
}

#[tokio::test]
async fn live_fails_on_a_down_probe() {
    let container = Container::new();
    provide_database(&container, false);

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    let err = container.live(&ctx).await.expect_err("live");
    assert_eq!(err.kind(), ErrorKind::HealthCheckFailed);
    assert!(err.to_string().contains("Database"), "got {err}");

    let err = container.ready(&ctx).await.expect_err("ready");
    assert_eq!(err.kind(), ErrorKind::HealthCheckFailed);
}

#[tokio::test]
async fn health_returns_every_report() {
    #[derive(Debug)]
    struct Cache;

    #[async_trait]
    impl HealthCheck for Cache {
        async fn health_check(&self, _ctx: &Context) -> Result<(), BoxError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        }
    }

    let container = Container::new();
    provide_database(&container, false);
    provide::<Cache, _, _>(&container, |_ctx, _c| async { Ok(Cache) }).unwrap();
    container.add_health_check::<Cache>();

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    let mut reports = container.health(&ctx).await;
    assert_eq!(reports.len(), 2);
    reports.sort_by(|a, b| a.name.cmp(&b.name));

    let cache = reports
        .iter()
        .find(|r| r.name.as_str().contains("Cache"))
        .expect("cache report");
    assert_eq!(cache.status, HealthStatus::Up);
    assert!(cache.error.is_none());
    assert!(cache.latency >= Duration::from_millis(5));

    let db = reports
        .iter()
        .find(|r| r.name.as_str().contains("Database"))
        .expect("db report");
    assert_eq!(db.status, HealthStatus::Down);
    assert!(db.error.is_some());
}

#[tokio::test]
async fn never_instantiated_services_are_skipped() {
    let container = Container::new();
    provide_with::<Database, _, _>(
        &container,
        |_ctx, _c| async {
            Ok(Database {
                healthy: AtomicBool::new(false),
            })
        },
        ProvideOpts::new().lazy(true),
    )
    .unwrap();
    container.add_health_check::<Database>();

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    // Lazy, never resolved: no instance, so no probe runs and liveness
    // passes even though the instance would report down.
    assert!(container.health(&ctx).await.is_empty());
    container.live(&ctx).await.unwrap();
}

#[tokio::test]
async fn services_without_probes_are_not_reported() {
    #[derive(Debug)]
    struct Opaque;

    let container = Container::new();
    provide_database(&container, true);
    provide::<Opaque, _, _>(&container, |_ctx, _c| async { Ok(Opaque) }).unwrap();

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    let reports = container.health(&ctx).await;
    assert_eq!(reports.len(), 1);
    assert!(reports[0].name.as_str().contains("Database"));
}
