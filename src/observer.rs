//! Observer callbacks for container events.
//!
//! Observers hook the four container event streams — resolve, provide,
//! start, stop — for metrics and tracing integration. They run synchronously
//! on the emitting task and must not block; they are not serialized across
//! keys.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::ServiceKey;

/// Invoked after every resolve, successful or not, with the elapsed time.
pub type ResolveObserver = Arc<dyn Fn(&ServiceKey, Duration, Option<&DiError>) + Send + Sync>;

/// Invoked after a provider or value is registered.
pub type ProvideObserver = Arc<dyn Fn(&ServiceKey) + Send + Sync>;

/// Invoked after a service start attempt (including lazy starts).
pub type StartObserver = Arc<dyn Fn(&ServiceKey, Duration, Option<&DiError>) + Send + Sync>;

/// Invoked after a service stop attempt.
pub type StopObserver = Arc<dyn Fn(&ServiceKey, Duration, Option<&DiError>) + Send + Sync>;

/// The registered observer sets for one container.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    pub(crate) on_resolve: Vec<ResolveObserver>,
    pub(crate) on_provide: Vec<ProvideObserver>,
    pub(crate) on_start: Vec<StartObserver>,
    pub(crate) on_stop: Vec<StopObserver>,
}

impl Observers {
    pub(crate) fn resolved(&self, key: &ServiceKey, duration: Duration, err: Option<&DiError>) {
        for observer in &self.on_resolve {
            observer(key, duration, err);
        }
    }

    pub(crate) fn provided(&self, key: &ServiceKey) {
        for observer in &self.on_provide {
            observer(key);
        }
    }

    pub(crate) fn started(&self, key: &ServiceKey, duration: Duration, err: Option<&DiError>) {
        for observer in &self.on_start {
            observer(key, duration, err);
        }
    }

    pub(crate) fn stopped(&self, key: &ServiceKey, duration: Duration, err: Option<&DiError>) {
        for observer in &self.on_stop {
            observer(key, duration, err);
        }
    }
}
