//! # Runtime: the explicit context object.
//!
//! A [`Runtime`] is created once by the application and handed to whoever
//! needs the watchdog or the recovery system. There is no global state.
//!
//! ```text
//! Runtime::builder(cfg).with_subscribers(..).build()
//!   ├─ Bus ──► subscriber listener ──► SubscriberSet ──► Subscribe::on_event
//!   ├─ ErrorRecoverySystem (Arc, publishes IncidentRecorded / breaker events)
//!   └─ Watchdog (Arc, reports start failures to the recovery system)
//!
//! start_all()         ──► Watchdog::start_all(every component) + spawn monitoring loop
//! run_until_signal()  ──► start_all() ──► wait for SIGINT/SIGTERM/SIGQUIT ──► shutdown()
//! shutdown()          ──► cancel loop ──► Watchdog::shutdown() ──► drain subscribers
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use faultguard::{ComponentSpec, Config, LogWriter, Runtime, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let rt = Runtime::builder(cfg.clone()).with_subscribers(subs).build();
//!
//!     rt.watchdog()
//!         .register(ComponentSpec::with_defaults("feed", "./feed-handler", &cfg).build())
//!         .await?;
//!     rt.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::SupervisorError,
    events::Bus,
    recovery::ErrorRecoverySystem,
    subscribers::SubscriberSet,
};

use super::{builder::RuntimeBuilder, shutdown, supervisor::Watchdog};

/// Owns the bus, the subscribers, the watchdog and the recovery system.
pub struct Runtime {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    watchdog: Arc<Watchdog>,
    recovery: Arc<ErrorRecoverySystem>,
    monitor_token: CancellationToken,
    monitor: Mutex<Option<JoinHandle<()>>>,
    listener_token: CancellationToken,
    listener: JoinHandle<()>,
}

impl Runtime {
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        watchdog: Arc<Watchdog>,
        recovery: Arc<ErrorRecoverySystem>,
    ) -> Self {
        let listener_token = CancellationToken::new();
        let listener = subscriber_listener(&bus, Arc::clone(&subs), listener_token.clone());
        Self {
            cfg,
            bus,
            subs,
            watchdog,
            recovery,
            monitor_token: CancellationToken::new(),
            monitor: Mutex::new(None),
            listener_token,
            listener,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    pub fn recovery(&self) -> &Arc<ErrorRecoverySystem> {
        &self.recovery
    }

    /// Spawns the monitoring loop. Idempotent.
    pub fn spawn_monitor(&self) {
        let mut slot = self.monitor.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            return;
        }
        let watchdog = Arc::clone(&self.watchdog);
        let token = self.monitor_token.clone();
        *slot = Some(tokio::spawn(async move { watchdog.run(token).await }));
    }

    /// Starts every registered component in dependency order, then the monitoring loop.
    ///
    /// The loop is spawned even if some components failed to start, so they
    /// get restarted under their policy.
    ///
    /// # Errors
    /// The first start error, or a dependency cycle.
    pub async fn start_all(&self) -> Result<(), SupervisorError> {
        let names = self.watchdog.components().await;
        let res = self.watchdog.start_all(&names).await;
        self.spawn_monitor();
        res
    }

    /// Runs until SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    ///
    /// # Errors
    /// Start errors are logged, not returned. Returns an error only if a
    /// dependency cycle prevented any start.
    pub async fn run_until_signal(self) -> Result<(), SupervisorError> {
        match self.start_all().await {
            Err(e @ SupervisorError::Graph(_)) => {
                self.shutdown().await;
                return Err(e);
            }
            Err(e) => tracing::warn!(error = %e, "some components failed to start"),
            Ok(()) => {}
        }

        if let Err(e) = shutdown::wait_for_shutdown_signal().await {
            tracing::warn!(error = %e, "signal handlers unavailable; shutting down");
        }
        self.shutdown().await;
        Ok(())
    }

    /// Stops the monitoring loop and every component, then drains subscribers.
    pub async fn shutdown(self) {
        self.monitor_token.cancel();
        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = monitor {
            let _ = handle.await;
        }

        self.watchdog.shutdown().await;

        self.listener_token.cancel();
        let _ = self.listener.await;
        match Arc::try_unwrap(self.subs) {
            Ok(set) => set.shutdown().await,
            Err(_) => tracing::debug!("subscriber set still shared; workers end with it"),
        }
    }
}

/// Forwards bus events to the subscriber set until cancelled, then drains what is queued.
fn subscriber_listener(
    bus: &Bus,
    set: Arc<SubscriberSet>,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => return,
                },
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => set.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    })
}
