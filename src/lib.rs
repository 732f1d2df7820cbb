//! # weft-di
//!
//! A runtime dependency-injection container: a process-level registry that
//! maps service keys to construction logic, resolves instances on demand
//! while enforcing an acyclic dependency graph, owns instance lifetime
//! according to a scope policy, and drives ordered startup and shutdown
//! across every registered service.
//!
//! ## Features
//!
//! - **Scope policies**: Singleton (default), Transient, Request, and Pooled
//!   instances
//! - **Dependency graph**: cycle-rejecting registration, topological
//!   startup/shutdown order, layered groups for parallel lifecycle
//! - **Lifecycle hooks**: ordered on-start/on-stop hooks per service, lazy
//!   services, shutdown deadlines
//! - **Composition**: interface bindings, decorators, and declarative
//!   modules
//! - **Observability**: resolve/provide/start/stop observers, `tracing`
//!   debug events, health and readiness probing
//!
//! ## Quick start
//!
//! ```
//! use weft_di::{invoke, provide, provide_value, Container, Context};
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Database {
//!     url: String,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let container = Container::new();
//!
//! provide_value(&container, Config { url: "postgres://localhost".to_string() }).unwrap();
//!
//! // Providers are async and resolve their own dependencies.
//! provide::<Database, _, _>(&container, |ctx, c| async move {
//!     let config = invoke::<Config>(&c, &ctx).await?;
//!     Ok(Database { url: config.url.clone() })
//! })
//! .unwrap();
//!
//! let ctx = Context::background();
//! container.start(&ctx).await.unwrap();
//!
//! let db = invoke::<Database>(&container, &ctx).await.unwrap();
//! assert_eq!(db.url, "postgres://localhost");
//!
//! container.stop(&ctx).await.unwrap();
//! # });
//! ```
//!
//! ## Lifecycle ordering
//!
//! Declared dependencies drive ordering: for an edge `A -> B` (A depends on
//! B), B starts before A and stops after A. Hooks within one service run in
//! registration order on start and reverse order on stop.
//!
//! ```
//! use weft_di::{provide_with, Container, Context, ProvideOpts};
//!
//! struct Database;
//! struct Server;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let container = Container::new();
//!
//! provide_with::<Database, _, _>(
//!     &container,
//!     |_ctx, _c| async { Ok(Database) },
//!     ProvideOpts::new().on_start(|_ctx| async { Ok(()) }),
//! )
//! .unwrap();
//!
//! provide_with::<Server, _, _>(
//!     &container,
//!     |_ctx, _c| async { Ok(Server) },
//!     ProvideOpts::new()
//!         .depends_on::<Database>()
//!         .on_stop(|_ctx| async { Ok(()) }),
//! )
//! .unwrap();
//!
//! let ctx = Context::background();
//! container.start(&ctx).await.unwrap(); // Database, then Server
//! container.stop(&ctx).await.unwrap(); // Server, then Database
//! # });
//! ```

pub mod bind;
pub mod container;
pub mod context;
pub mod error;
pub mod graph;
pub mod health;
pub mod invoke;
pub mod key;
pub mod module;
pub mod observer;
pub mod provide;
pub mod registry;
pub mod scope;

pub use bind::{bind, bind_named, decorate, decorate_named, decorate_trait};
pub use container::{Container, ContainerBuilder, ContainerState, GraphInfo, ServiceInfo};
pub use context::Context;
pub use error::{BoxError, DiError, DiResult, ErrorKind};
pub use graph::{DepGraph, ParallelGroup};
pub use health::{HealthCheck, HealthReport, HealthStatus, ReadinessCheck};
pub use invoke::{
    has, has_named, instance_of, invoke, invoke_named, invoke_trait, invoke_trait_named,
    try_invoke, try_invoke_named,
};
pub use key::{key_of, key_of_named, ServiceKey};
pub use module::Module;
pub use observer::{ProvideObserver, ResolveObserver, StartObserver, StopObserver};
pub use provide::{
    hook, provide, provide_named, provide_named_value, provide_value, provide_value_with,
    provide_with, replace, replace_value, replace_value_with, replace_with, ProvideOpts,
};
pub use registry::{BoxFuture, DecoratorFn, HookFn, Instance, ProviderFn};
pub use scope::{RequestScope, Scope};
