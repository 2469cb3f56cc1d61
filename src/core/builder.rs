use std::sync::Arc;

use crate::{
    config::Config,
    events::Bus,
    recovery::ErrorRecoverySystem,
    subscribers::{Subscribe, SubscriberSet},
};

use super::{runtime::Runtime, supervisor::Watchdog};

type RecoveryHook = Box<dyn FnOnce(ErrorRecoverySystem) -> ErrorRecoverySystem + Send>;

/// Builder for a [`Runtime`].
pub struct RuntimeBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    recovery: Option<RecoveryHook>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            recovery: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive every runtime event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Customizes the recovery system (handlers, executor) before it is shared.
    ///
    /// ```no_run
    /// use faultguard::{Config, NoopExecutor, Runtime};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let rt = Runtime::builder(Config::default())
    ///     .with_recovery(|rs| rs.with_executor(NoopExecutor))
    ///     .build();
    /// # }
    /// ```
    pub fn with_recovery<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(ErrorRecoverySystem) -> ErrorRecoverySystem + Send + 'static,
    {
        self.recovery = Some(Box::new(configure));
        self
    }

    /// Builds the runtime.
    ///
    /// Initializes the bus, the subscriber workers and listener, the recovery
    /// system and the watchdog. Must be called from within a tokio runtime.
    pub fn build(self) -> Runtime {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        let mut recovery = ErrorRecoverySystem::new(&self.cfg);
        if let Some(configure) = self.recovery {
            recovery = configure(recovery);
        }
        let recovery = Arc::new(recovery.with_bus(bus.clone()));

        let watchdog = Arc::new(Watchdog::new(
            self.cfg.clone(),
            bus.clone(),
            Arc::clone(&recovery),
        ));
        Runtime::new_internal(self.cfg, bus, subs, watchdog, recovery)
    }
}
