//! # Example: watchdog
//!
//! Supervises a small process graph, guards a flaky dependency with a circuit
//! breaker and reports a risk error to the recovery system.
//!
//! Shows how to:
//! - Build a [`Runtime`] with the [`LogWriter`] subscriber.
//! - Register components with dependencies, restart policies and health checks.
//! - Use a named [`CircuitBreaker`](faultguard::CircuitBreaker) from the recovery system.
//! - Inspect [`SystemHealth`](faultguard::SystemHealth) and incident statistics.
//!
//! ## Flow
//! ```text
//! Runtime::builder(cfg).with_subscribers([LogWriter]).build()
//!     ├─► register(db), register(feed → db), register(flaky → db)
//!     ├─► start_all()            db, feed, flaky started in dependency order
//!     ├─► monitoring loop        flaky exits 1 ─► restarted until budget spent
//!     ├─► breaker "exchange"     3 failures ─► open ─► calls rejected
//!     ├─► handle_error(Risk)     SafeMode incident recorded
//!     └─► shutdown()             feed, flaky, db stopped
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example watchdog
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use faultguard::{
    CheckError, CircuitBreakerConfig, CircuitError, ComponentSpec, Config, ErrorContext,
    ErrorType, HealthCheckFn, HealthCheckSpec, LogWriter, RestartPolicy, Runtime, Severity,
    Subscribe,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct ExchangeDown;

impl std::fmt::Display for ExchangeDown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("exchange unreachable")
    }
}

impl std::error::Error for ExchangeDown {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config {
        poll_interval: Duration::from_millis(500),
        restart_delay: Duration::from_millis(200),
        max_restarts: 2,
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let rt = Runtime::builder(cfg.clone()).with_subscribers(subs).build();

    // Feed health follows a flag the demo flips halfway through.
    let feed_up = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&feed_up);
    let probe = HealthCheckFn::arc("heartbeat", move || {
        let flag = Arc::clone(&flag);
        async move { Ok::<_, CheckError>(flag.load(Ordering::SeqCst)) }
    });

    let wd = rt.watchdog();
    wd.register(
        ComponentSpec::with_defaults("db", "sleep", &cfg)
            .arg("3600")
            .build(),
    )
    .await?;
    wd.register(
        ComponentSpec::with_defaults("feed", "sleep", &cfg)
            .arg("3600")
            .depends_on("db")
            .restart(RestartPolicy::Always)
            .health_check(
                HealthCheckSpec::with_defaults(probe, &cfg)
                    .with_interval(Duration::from_millis(200))
                    .with_thresholds(2, 1),
            )
            .build(),
    )
    .await?;
    wd.register(
        ComponentSpec::with_defaults("flaky", "sh", &cfg)
            .args(["-c", "sleep 1; exit 3"])
            .depends_on("db")
            .build(),
    )
    .await?;

    rt.start_all().await?;

    // Trip a breaker in front of an unreachable exchange.
    let exchange = rt.recovery().circuit_breaker(
        "exchange",
        Some(
            CircuitBreakerConfig::new("exchange")
                .with_failure_threshold(3)
                .with_recovery_timeout(Duration::from_secs(2)),
        ),
    );
    for _ in 0..5 {
        match exchange.execute(|| async { Err::<(), _>(ExchangeDown) }).await {
            Err(CircuitError::Open { .. }) => println!("[demo] exchange call rejected"),
            Err(e) => println!("[demo] exchange call failed: {e}"),
            Ok(()) => {}
        }
    }

    let report = rt
        .recovery()
        .handle_error(
            ErrorContext::new(ErrorType::Risk, Severity::Critical, "daily drawdown limit hit")
                .with_component("engine"),
        )
        .await;
    println!("[demo] risk incident: actions={:?} success={}", report.actions, report.success);

    tokio::time::sleep(Duration::from_secs(2)).await;
    feed_up.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(4)).await;

    let health = wd.system_health().await;
    println!(
        "[demo] health: {}/{} healthy ({:.0}%) {:?}",
        health.healthy, health.total, health.health_percentage, health.components
    );
    let stats = rt.recovery().incident_statistics();
    println!(
        "[demo] incidents: total={} recovered={} by_type={:?}",
        stats.total_incidents, stats.successful_recoveries, stats.by_error_type
    );
    for snapshot in rt.recovery().circuit_breakers() {
        println!("[demo] breaker {}: {}", snapshot.name, snapshot.state);
    }

    rt.shutdown().await;
    Ok(())
}
