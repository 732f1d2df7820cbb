use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use weft_di::{
    instance_of, invoke, key_of, provide_with, Container, Context, ErrorKind, Instance,
    ProvideOpts, Scope,
};

#[derive(Debug)]
struct Counted {
    id: u32,
}

fn provide_counted(container: &Container, opts: ProvideOpts) -> Arc<AtomicU32> {
    let constructions = Arc::new(AtomicU32::new(0));
    let counter = constructions.clone();
    provide_with::<Counted, _, _>(
        container,
        move |_ctx, _c| {
            let counter = counter.clone();
            async move {
                let id = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Counted { id })
            }
        },
        opts,
    )
    .unwrap();
    constructions
}

#[tokio::test]
async fn singleton_resolves_to_one_shared_instance() {
    let container = Container::new();
    let constructions = provide_counted(&container, ProvideOpts::new());
    let ctx = Context::background();

    let first = invoke::<Counted>(&container, &ctx).await.unwrap();
    let second = invoke::<Counted>(&container, &ctx).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.id, 1);
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_constructs_on_every_resolve() {
    let container = Container::new();
    let constructions =
        provide_counted(&container, ProvideOpts::new().scope(Scope::Transient));
    let ctx = Context::background();

    let first = invoke::<Counted>(&container, &ctx).await.unwrap();
    let second = invoke::<Counted>(&container, &ctx).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!((first.id, second.id), (1, 2));
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn request_scope_caches_per_context() {
    let container = Container::new();
    let constructions = provide_counted(&container, ProvideOpts::new().scope(Scope::Request));

    let ctx_one = Context::background().with_request_scope();
    let first = invoke::<Counted>(&container, &ctx_one).await.unwrap();
    let again = invoke::<Counted>(&container, &ctx_one).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let ctx_two = Context::background().with_request_scope();
    let other = invoke::<Counted>(&container, &ctx_two).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &other));

    assert_eq!(constructions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn request_scope_required_in_context() {
    let container = Container::new();
    provide_counted(&container, ProvideOpts::new().scope(Scope::Request));

    let ctx = Context::background();
    let err = invoke::<Counted>(&container, &ctx).await.expect_err("resolve");
    assert_eq!(err.kind(), ErrorKind::ScopeNotFound);
}

#[tokio::test]
async fn pooled_instances_cycle_through_the_pool() {
    let container = Container::new();
    let constructions = provide_counted(&container, ProvideOpts::new().pool_size(1));
    let ctx = Context::background();
    let key = key_of::<Counted>();

    // Empty pool: both resolves construct.
    let first = invoke::<Counted>(&container, &ctx).await.unwrap();
    let second = invoke::<Counted>(&container, &ctx).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(constructions.load(Ordering::SeqCst), 2);

    // Capacity one: the first release is accepted, the overflow refused.
    assert!(container.release(&key, first.clone() as Instance));
    assert!(!container.release(&key, second as Instance));

    // The pooled instance comes back on the next resolve, no construction.
    let recycled = invoke::<Counted>(&container, &ctx).await.unwrap();
    assert!(Arc::ptr_eq(&first, &recycled));
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn lazy_service_defers_instantiation_and_start() {
    #[derive(Debug)]
    struct Lazy;

    let container = Container::new();
    let starts = Arc::new(AtomicU32::new(0));
    let stops = Arc::new(AtomicU32::new(0));

    let start_counter = starts.clone();
    let stop_counter = stops.clone();
    provide_with::<Lazy, _, _>(
        &container,
        |_ctx, _c| async { Ok(Lazy) },
        ProvideOpts::new()
            .lazy(true)
            .on_start(move |_ctx| {
                let counter = start_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .on_stop(move |_ctx| {
                let counter = stop_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
    )
    .unwrap();

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    // Start skipped the lazy entry entirely.
    assert!(instance_of::<Lazy>(&container).is_none());
    assert_eq!(starts.load(Ordering::SeqCst), 0);

    // First resolve constructs and runs on-start once.
    invoke::<Lazy>(&container, &ctx).await.unwrap();
    assert!(instance_of::<Lazy>(&container).is_some());
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    // Further resolves are cache hits.
    invoke::<Lazy>(&container, &ctx).await.unwrap();
    invoke::<Lazy>(&container, &ctx).await.unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    container.stop(&ctx).await.unwrap();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lazy_service_never_resolved_never_hooks() {
    #[derive(Debug)]
    struct Lazy;

    let container = Container::new();
    let starts = Arc::new(AtomicU32::new(0));
    let stops = Arc::new(AtomicU32::new(0));

    let start_counter = starts.clone();
    let stop_counter = stops.clone();
    provide_with::<Lazy, _, _>(
        &container,
        |_ctx, _c| async { Ok(Lazy) },
        ProvideOpts::new()
            .lazy(true)
            .on_start(move |_ctx| {
                let counter = start_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .on_stop(move |_ctx| {
                let counter = stop_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
    )
    .unwrap();

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();
    container.stop(&ctx).await.unwrap();

    assert_eq!(starts.load(Ordering::SeqCst), 0);
    assert_eq!(stops.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lazy_resolve_before_start_skips_start_hooks() {
    #[derive(Debug)]
    struct Lazy;

    let container = Container::new();
    let starts = Arc::new(AtomicU32::new(0));

    let counter = starts.clone();
    provide_with::<Lazy, _, _>(
        &container,
        |_ctx, _c| async { Ok(Lazy) },
        ProvideOpts::new().lazy(true).on_start(move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
    .unwrap();

    let ctx = Context::background();

    // Resolved while the container is still New: constructed, but on-start
    // does not run (the container is not Running).
    invoke::<Lazy>(&container, &ctx).await.unwrap();
    assert!(instance_of::<Lazy>(&container).is_some());
    assert_eq!(starts.load(Ordering::SeqCst), 0);

    // Start skips lazy entries, so the hook still does not run.
    container.start(&ctx).await.unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lazy_start_failure_leaves_entry_uninstantiated() {
    #[derive(Debug)]
    struct Lazy;

    let container = Container::new();
    let attempts = Arc::new(AtomicU32::new(0));

    let counter = attempts.clone();
    provide_with::<Lazy, _, _>(
        &container,
        |_ctx, _c| async { Ok(Lazy) },
        ProvideOpts::new().lazy(true).on_start(move |_ctx| {
            let counter = counter.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt == 1 {
                    Err::<(), weft_di::BoxError>("warmup failed".into())
                } else {
                    Ok(())
                }
            }
        }),
    )
    .unwrap();

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    let err = invoke::<Lazy>(&container, &ctx).await.expect_err("first resolve");
    assert_eq!(err.kind(), ErrorKind::StartupFailed);
    assert!(instance_of::<Lazy>(&container).is_none());

    // The failed lazy start is retried wholesale on the next resolve.
    invoke::<Lazy>(&container, &ctx).await.unwrap();
    assert!(instance_of::<Lazy>(&container).is_some());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn scope_can_be_set_after_registration() {
    let container = Container::new();
    let constructions = provide_counted(&container, ProvideOpts::new());
    container.set_scope(&key_of::<Counted>(), Scope::Transient);

    let ctx = Context::background();
    invoke::<Counted>(&container, &ctx).await.unwrap();
    invoke::<Counted>(&container, &ctx).await.unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
}
