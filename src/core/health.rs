//! # HealthMonitor: one independent probe loop per (component, check).
//!
//! ## Architecture
//! ```text
//! register(component, spec) ──► tokio::spawn(probe_loop)
//!
//! probe_loop {
//!   ├─► sleep(interval)                    (cancellable)
//!   ├─► run_probe(): timeout(check.check()) (cancellable, panic-isolated)
//!   │       Ok(true)            → pass
//!   │       Ok(false) / Err / timeout / panic → fail
//!   └─► record(): update streaks, flip cached result at thresholds,
//!                 publish HealthCheckFailed / HealthCheckRecovered on flips
//! }
//! ```
//!
//! ## Rules
//! - Each loop owns its key; a slow or crashing probe never affects another key.
//! - Cancellation is per component (child token of the monitor's root token),
//!   so `unregister` is prompt and `shutdown` cancels everything at once.
//! - A freshly registered key starts as passing: a component that just started
//!   is `Healthy` until a probe says otherwise.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::components::HealthCheckSpec;
use crate::events::{Bus, Event, EventKind};

type CheckKey = (String, String);

#[derive(Debug, Clone, Copy)]
struct CheckRecord {
    healthy: bool,
    failures: u32,
    successes: u32,
}

impl CheckRecord {
    fn fresh() -> Self {
        Self {
            healthy: true,
            failures: 0,
            successes: 0,
        }
    }
}

/// Streak counters of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckCounters {
    pub failures: u32,
    pub successes: u32,
}

/// Runs periodic health probes and caches their latest verdicts.
pub struct HealthMonitor {
    results: Arc<RwLock<HashMap<CheckKey, CheckRecord>>>,
    tokens: Mutex<HashMap<String, CancellationToken>>,
    root: Mutex<CancellationToken>,
    bus: Bus,
}

impl HealthMonitor {
    pub fn new(bus: Bus) -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
            tokens: Mutex::new(HashMap::new()),
            root: Mutex::new(CancellationToken::new()),
            bus,
        }
    }

    /// Starts a repeating probe task for `(component, spec.name)`.
    ///
    /// Registering the same key twice replaces its cached verdict; both loops
    /// share the component's cancellation token.
    pub async fn register(&self, component: &str, spec: HealthCheckSpec) {
        let token = {
            let root = self.root.lock().unwrap_or_else(|p| p.into_inner());
            let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
            tokens
                .entry(component.to_string())
                .or_insert_with(|| root.child_token())
                .clone()
        };

        let key = (component.to_string(), spec.name.clone());
        self.results
            .write()
            .await
            .insert(key.clone(), CheckRecord::fresh());

        let results = Arc::clone(&self.results);
        let bus = self.bus.clone();
        tokio::spawn(probe_loop(key, spec, results, bus, token));
    }

    /// Cancels every probe of `component` and forgets its verdicts.
    pub async fn unregister(&self, component: &str) {
        let token = self
            .tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(component);
        if let Some(token) = token {
            token.cancel();
        }
        self.results
            .write()
            .await
            .retain(|(owner, _), _| owner != component);
    }

    /// True iff every spec's last verdict is passing (vacuously true for no specs).
    ///
    /// A check with no recorded verdict counts as failing.
    pub async fn is_healthy(&self, component: &str, specs: &[HealthCheckSpec]) -> bool {
        let results = self.results.read().await;
        specs.iter().all(|spec| {
            results
                .get(&(component.to_string(), spec.name.clone()))
                .is_some_and(|r| r.healthy)
        })
    }

    /// Current failure/success streaks of each of `component`'s checks.
    pub async fn check_counters(&self, component: &str) -> BTreeMap<String, CheckCounters> {
        self.results
            .read()
            .await
            .iter()
            .filter(|((owner, _), _)| owner == component)
            .map(|((_, check), r)| {
                (
                    check.clone(),
                    CheckCounters {
                        failures: r.failures,
                        successes: r.successes,
                    },
                )
            })
            .collect()
    }

    /// Cancels every probe task.
    ///
    /// The monitor stays usable: checks registered afterwards run under a new root.
    pub fn shutdown(&self) {
        let old = {
            let mut root = self.root.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *root, CancellationToken::new())
        };
        old.cancel();
        self.tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.root
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .cancel();
    }
}

async fn probe_loop(
    key: CheckKey,
    spec: HealthCheckSpec,
    results: Arc<RwLock<HashMap<CheckKey, CheckRecord>>>,
    bus: Bus,
    token: CancellationToken,
) {
    loop {
        select! {
            _ = token.cancelled() => break,
            _ = time::sleep(spec.interval) => {}
        }

        let verdict = select! {
            _ = token.cancelled() => break,
            v = run_probe(&spec) => v,
        };

        let mut guard = results.write().await;
        let Some(record) = guard.get_mut(&key) else {
            break;
        };
        if let Some(ev) = apply_verdict(record, &spec, verdict) {
            drop(guard);
            bus.publish(ev.with_component(key.0.as_str()).with_check(key.1.as_str()));
        }
    }
}

/// Executes the probe once under its timeout.
///
/// `Ok(())` on pass, `Err(reason)` on any kind of failure.
async fn run_probe(spec: &HealthCheckSpec) -> Result<(), String> {
    let fut = std::panic::AssertUnwindSafe(spec.check.check()).catch_unwind();
    match time::timeout(spec.timeout, fut).await {
        Ok(Ok(Ok(true))) => Ok(()),
        Ok(Ok(Ok(false))) => Err("check returned false".to_string()),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(_panic)) => Err("check panicked".to_string()),
        Err(_elapsed) => Err(format!("timed out after {:?}", spec.timeout)),
    }
}

/// Updates streaks and flips the cached verdict at the thresholds.
///
/// Returns the event to publish when the verdict flipped.
fn apply_verdict(
    record: &mut CheckRecord,
    spec: &HealthCheckSpec,
    verdict: Result<(), String>,
) -> Option<Event> {
    match verdict {
        Ok(()) => {
            record.successes = record.successes.saturating_add(1);
            record.failures = 0;
            if !record.healthy && record.successes >= spec.success_threshold.max(1) {
                record.healthy = true;
                return Some(Event::new(EventKind::HealthCheckRecovered));
            }
        }
        Err(reason) => {
            record.failures = record.failures.saturating_add(1);
            record.successes = 0;
            if record.healthy && record.failures >= spec.failure_threshold.max(1) {
                record.healthy = false;
                return Some(
                    Event::new(EventKind::HealthCheckFailed)
                        .with_reason(reason)
                        .with_timeout(spec.timeout),
                );
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CheckError, HealthCheckFn};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    fn toggled(name: &'static str, flag: Arc<AtomicBool>) -> HealthCheckSpec {
        let probe = HealthCheckFn::arc(name, move || {
            let flag = Arc::clone(&flag);
            async move { Ok::<_, CheckError>(flag.load(Ordering::SeqCst)) }
        });
        HealthCheckSpec::new(probe)
            .with_interval(Duration::from_millis(100))
            .with_timeout(Duration::from_millis(50))
    }

    #[tokio::test(start_paused = true)]
    async fn test_verdict_follows_probe() {
        let monitor = HealthMonitor::new(Bus::new(16));
        let up = Arc::new(AtomicBool::new(true));
        let spec = toggled("ping", up.clone());
        monitor.register("db", spec.clone()).await;
        let specs = vec![spec];

        assert!(monitor.is_healthy("db", &specs).await);

        up.store(false, Ordering::SeqCst);
        time::sleep(Duration::from_millis(250)).await;
        assert!(!monitor.is_healthy("db", &specs).await);

        up.store(true, Ordering::SeqCst);
        time::sleep(Duration::from_millis(250)).await;
        assert!(monitor.is_healthy("db", &specs).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_and_error_count_as_failure() {
        let monitor = HealthMonitor::new(Bus::new(16));
        let slow = HealthCheckSpec::new(HealthCheckFn::arc("slow", || async {
            time::sleep(Duration::from_secs(10)).await;
            Ok::<_, CheckError>(true)
        }))
        .with_interval(Duration::from_millis(100))
        .with_timeout(Duration::from_millis(50));
        let broken = HealthCheckSpec::new(HealthCheckFn::arc("broken", || async {
            Err::<bool, CheckError>("refused".into())
        }))
        .with_interval(Duration::from_millis(100));

        monitor.register("feed", slow.clone()).await;
        monitor.register("feed", broken.clone()).await;
        time::sleep(Duration::from_millis(400)).await;

        assert!(!monitor.is_healthy("feed", &[slow]).await);
        assert!(!monitor.is_healthy("feed", &[broken]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_threshold_requires_streak() {
        let monitor = HealthMonitor::new(Bus::new(16));
        let up = Arc::new(AtomicBool::new(false));
        let spec = toggled("ping", up).with_thresholds(3, 1);
        monitor.register("api", spec.clone()).await;
        let specs = [spec];

        time::sleep(Duration::from_millis(250)).await;
        assert!(monitor.is_healthy("api", &specs).await);
        assert_eq!(monitor.check_counters("api").await["ping"].failures, 2);

        time::sleep(Duration::from_millis(100)).await;
        assert!(!monitor.is_healthy("api", &specs).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_cancels_probe() {
        let monitor = HealthMonitor::new(Bus::new(16));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let spec = HealthCheckSpec::new(HealthCheckFn::arc("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CheckError>(true) }
        }))
        .with_interval(Duration::from_millis(100));

        monitor.register("worker", spec.clone()).await;
        time::sleep(Duration::from_millis(250)).await;
        monitor.unregister("worker").await;
        let seen = calls.load(Ordering::SeqCst);
        assert!(seen >= 2);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
        assert!(!monitor.is_healthy("worker", &[spec]).await);
        assert!(monitor.is_healthy("worker", &[]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_again_after_shutdown() {
        let monitor = HealthMonitor::new(Bus::new(16));
        let up = Arc::new(AtomicBool::new(true));
        let spec = toggled("ping", Arc::clone(&up)).with_thresholds(1, 1);

        monitor.register("api", spec.clone()).await;
        monitor.shutdown();

        monitor.register("api", spec.clone()).await;
        up.store(false, Ordering::SeqCst);
        time::sleep(Duration::from_millis(250)).await;
        assert!(!monitor.is_healthy("api", &[spec]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_publishes_event() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let monitor = HealthMonitor::new(bus);
        let up = Arc::new(AtomicBool::new(false));
        monitor.register("risk", toggled("limits", up)).await;

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::HealthCheckFailed);
        assert_eq!(ev.component.as_deref(), Some("risk"));
        assert_eq!(ev.check.as_deref(), Some("limits"));
    }
}
