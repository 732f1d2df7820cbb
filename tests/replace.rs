use std::sync::Arc;

use weft_di::{
    invoke, key_of, provide, provide_value, replace, replace_value, replace_with, Container,
    ContainerState, Context, ErrorKind, Instance, ProvideOpts, ProviderFn,
};

#[derive(Debug)]
struct Setting(&'static str);

#[tokio::test]
async fn replace_swaps_the_provider() {
    let container = Container::new();
    provide::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("old")) }).unwrap();

    replace::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("new")) }).unwrap();

    let ctx = Context::background();
    let setting = invoke::<Setting>(&container, &ctx).await.unwrap();
    assert_eq!(setting.0, "new");
}

#[tokio::test]
async fn replace_discards_the_cached_singleton() {
    let container = Container::new();
    provide::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("old")) }).unwrap();

    let ctx = Context::background();
    let before = invoke::<Setting>(&container, &ctx).await.unwrap();
    assert_eq!(before.0, "old");

    replace::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("new")) }).unwrap();

    let after = invoke::<Setting>(&container, &ctx).await.unwrap();
    assert_eq!(after.0, "new");
    assert!(!Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn replace_value_overwrites_values() {
    let container = Container::new();
    provide_value(&container, Setting("old")).unwrap();

    replace_value(&container, Setting("new")).unwrap();

    let ctx = Context::background();
    let setting = invoke::<Setting>(&container, &ctx).await.unwrap();
    assert_eq!(setting.0, "new");
}

#[tokio::test]
async fn replace_installs_when_key_was_absent() {
    let container = Container::new();
    replace::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("fresh")) }).unwrap();

    let ctx = Context::background();
    let setting = invoke::<Setting>(&container, &ctx).await.unwrap();
    assert_eq!(setting.0, "fresh");
}

#[tokio::test]
async fn replace_preserves_running_state() {
    let container = Container::new();
    provide::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("old")) }).unwrap();

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();

    replace::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("live")) }).unwrap();
    assert_eq!(container.state(), ContainerState::Running);

    let setting = invoke::<Setting>(&container, &ctx).await.unwrap();
    assert_eq!(setting.0, "live");
}

#[tokio::test]
async fn replace_rechecks_for_cycles() {
    #[derive(Debug)]
    struct Upstream;

    let container = Container::new();
    provide::<Upstream, _, _>(&container, |_ctx, _c| async { Ok(Upstream) }).unwrap();
    provide::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("ok")) }).unwrap();

    // Upstream currently has no edges; rewire Setting -> Upstream, then try
    // to close the loop by replacing Upstream with a dependency on Setting.
    replace_with::<Setting, _, _>(
        &container,
        |_ctx, _c| async { Ok(Setting("rewired")) },
        ProvideOpts::new().depends_on::<Upstream>(),
    )
    .unwrap();

    let err = replace_with::<Upstream, _, _>(
        &container,
        |_ctx, _c| async { Ok(Upstream) },
        ProvideOpts::new().depends_on::<Setting>(),
    )
    .expect_err("cycle");

    assert_eq!(err.kind(), ErrorKind::CircularDependency);
    // The failed replacement removed the key outright, old entry included.
    assert!(!container.has(&key_of::<Upstream>()));
    assert!(container.has(&key_of::<Setting>()));
}

#[tokio::test]
async fn hooks_attached_after_replace_bind_to_the_new_entry() {
    use std::sync::atomic::{AtomicU32, Ordering};

    let container = Container::new();
    provide::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("old")) }).unwrap();

    let key = key_of::<Setting>();
    let provider: ProviderFn = Arc::new(|_ctx, _c| {
        Box::pin(async { Ok(Arc::new(Setting("new")) as Instance) })
    });
    container.replace(key.clone(), provider, Vec::new()).unwrap();

    let fired = Arc::new(AtomicU32::new(0));
    let counter = fired.clone();
    container.add_on_start(
        &key,
        weft_di::hook(move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    );

    let ctx = Context::background();
    container.start(&ctx).await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let setting = invoke::<Setting>(&container, &ctx).await.unwrap();
    assert_eq!(setting.0, "new");
}

#[tokio::test]
async fn remove_drops_the_registration() {
    let container = Container::new();
    provide::<Setting, _, _>(&container, |_ctx, _c| async { Ok(Setting("gone")) }).unwrap();

    let key = key_of::<Setting>();
    container.remove(&key);

    assert!(!container.has(&key));
    let ctx = Context::background();
    let err = invoke::<Setting>(&container, &ctx).await.expect_err("resolve");
    assert_eq!(err.kind(), ErrorKind::ServiceNotFound);
}
