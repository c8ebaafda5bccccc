//! The pipeline runner
//!
//! ```text
//!  ticks ──► ANALYTICS ──► RISK ──► EXECUTION ──► transport
//!              (hot)       (hot) ◄─┐  (hot) ◄── exchange events
//!                                  │    │
//!                             reversals │
//!                                   audit log ◄── sync @ 50ms
//! ```
//!
//! One hot thread per stage, pinned (and optionally elevated to
//! real-time priority) when configured. Internal forwards never drop:
//! the producer spins (pause hint) until the downstream queue accepts or
//! shutdown is requested - queues are sized so that steady state never
//! fills them, and a sustained full internal queue is a design error,
//! not a runtime condition to paper over.
//!
//! Two auxiliary queues sit beside the forward path: decoded exchange
//! responses enter the execution thread through the handle returned by
//! [`Runner::exchange_events`], and exchange rejects flow back to the
//! risk thread as `OrderCancel` envelopes so the intent delta applied at
//! approval is reversed, never silently kept.
//!
//! Housekeeping (shared low-priority core): a 1 Hz status line per
//! stage, the daily-loss watchdog that trips the breaker asynchronously,
//! and the periodic audit `sync` tick. On shutdown the registered
//! finalizers run in reverse registration order with panics swallowed,
//! ending in a final audit sync.

use crate::analytics::{AnalyticsEngine, AnalyticsMetrics};
use crate::config::Config;
use crate::core::{AlertSeverity, Envelope, RiskAlert};
use crate::execution::{
    AuditLog, ExchangeEvent, ExecutionEngine, ExecutionMetrics, OrderIdGenerator, Transport,
};
use crate::feed::TickValidator;
use crate::perf::clock::monotonic_ns;
use crate::perf::cpu::setup_hot_thread;
use crate::pipeline::shutdown::ShutdownFlag;
use crate::queue::{channel, Consumer, Producer};
use crate::risk::{BreakerReason, CircuitBreaker, PnlAggregates, RiskGate, RiskMetrics};
use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

/// Final counters reported after a run
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub ticks_processed: u64,
    pub ticks_rejected: u64,
    pub signals_generated: u64,
    pub signals_gated: u64,
    pub orders_approved: u64,
    pub orders_rejected: u64,
    pub orders_reversed: u64,
    pub orders_sent: u64,
    pub orders_failed: u64,
    pub audit_entries: u64,
    pub total_exposure: i64,
    pub daily_pnl: i64,
}

/// A running pipeline
pub struct Runner {
    threads: Vec<JoinHandle<()>>,
    shutdown: ShutdownFlag,
    finalizers: Vec<Box<dyn FnOnce() + Send>>,

    /// Handed to the exchange session decoder, once
    exchange_events: Option<Producer<ExchangeEvent>>,

    analytics_metrics: Arc<AnalyticsMetrics>,
    risk_metrics: Arc<RiskMetrics>,
    execution_metrics: Arc<ExecutionMetrics>,
    validator: Arc<TickValidator>,
    audit: Arc<AuditLog>,
    breaker: Arc<CircuitBreaker>,
    pnl: Arc<PnlAggregates>,
}

impl Runner {
    /// Wire the stages and start every thread
    ///
    /// `ticks` is the downstream end of the connector queue; the caller
    /// owns the producing side (drop-and-count back-pressure is the
    /// connector's policy, not ours).
    pub fn start<T: Transport + Send + 'static>(
        config: &Config,
        ticks: Consumer<Envelope>,
        transport: T,
        shutdown: ShutdownFlag,
    ) -> Result<Runner> {
        let limits = config.risk_limits()?;
        let analytics_config = config.analytics_config()?;

        let (signals_tx, signals_rx) = channel::<Envelope>(config.queues.analytics_to_risk);
        let (orders_tx, orders_rx) = channel::<Envelope>(config.queues.risk_to_execution);
        // Side channels: decoded exchange responses in, reject
        // compensations back to the risk stage
        let (events_tx, events_rx) = channel::<ExchangeEvent>(config.queues.risk_to_execution);
        let (reversals_tx, reversals_rx) = channel::<Envelope>(config.queues.risk_to_execution);

        let breaker = Arc::new(CircuitBreaker::new());
        let audit = Arc::new(AuditLog::open(&config.durability.audit_path)?);
        let validator = Arc::new(TickValidator::new());

        let mut analytics = AnalyticsEngine::new(&analytics_config);
        let mut risk = RiskGate::new(limits, Arc::clone(&breaker));
        let mut execution = ExecutionEngine::new(
            OrderIdGenerator::new(),
            Arc::clone(&audit),
            transport,
        )
        .with_reversals(reversals_tx);

        let analytics_metrics = analytics.metrics();
        let risk_metrics = risk.metrics();
        let execution_metrics = execution.metrics();
        let pnl = risk.positions().aggregates();

        let mut threads = Vec::new();

        let realtime = config.cores.realtime_priority;

        // ---- Analytics hot thread -------------------------------------
        {
            let flag = shutdown.clone();
            let core = config.cores.analytics;
            let validator = Arc::clone(&validator);
            let mut ticks = ticks;
            let mut out = signals_tx;
            threads.push(std::thread::Builder::new().name("sage-analytics".into()).spawn(
                move || {
                    setup_hot_thread(core, realtime);
                    while !flag.is_set() {
                        match ticks.try_pop() {
                            Some(env) => {
                                // Ingress contract check before the bitmask lookup
                                if let Some(tick) = env.as_tick() {
                                    if validator.validate(&tick).is_err() {
                                        continue;
                                    }
                                }
                                if let Some(fwd) = analytics.on_message(&env) {
                                    forward(&mut out, fwd, &flag);
                                }
                            }
                            None => std::hint::spin_loop(),
                        }
                    }
                },
            )?);
        }

        // ---- Risk hot thread ------------------------------------------
        {
            let flag = shutdown.clone();
            let core = config.cores.risk;
            let mut input = signals_rx;
            let mut reversals = reversals_rx;
            let mut out = orders_tx;
            threads.push(std::thread::Builder::new().name("sage-risk".into()).spawn(
                move || {
                    setup_hot_thread(core, realtime);
                    while !flag.is_set() {
                        // Compensations first: they free limit headroom
                        // the next signal may need
                        while let Some(env) = reversals.try_pop() {
                            risk.on_message(&env);
                        }
                        match input.try_pop() {
                            Some(env) => {
                                if let Some(fwd) = risk.on_message(&env) {
                                    forward(&mut out, fwd, &flag);
                                }
                            }
                            None => std::hint::spin_loop(),
                        }
                    }
                },
            )?);
        }

        // ---- Execution hot thread -------------------------------------
        {
            let flag = shutdown.clone();
            let core = config.cores.execution;
            let mut input = orders_rx;
            let mut events = events_rx;
            threads.push(std::thread::Builder::new().name("sage-execution".into()).spawn(
                move || {
                    setup_hot_thread(core, realtime);
                    while !flag.is_set() {
                        if let Some(env) = input.try_pop() {
                            execution.on_message(&env);
                        } else if let Some(event) = events.try_pop() {
                            execution.on_exchange_event(&event);
                        } else {
                            std::hint::spin_loop();
                        }
                    }
                },
            )?);
        }

        // ---- Housekeeping: 1 Hz status + loss watchdog ----------------
        {
            let flag = shutdown.clone();
            let core = config.cores.housekeeping;
            let analytics_metrics = Arc::clone(&analytics_metrics);
            let risk_metrics = Arc::clone(&risk_metrics);
            let execution_metrics = Arc::clone(&execution_metrics);
            let breaker = Arc::clone(&breaker);
            let audit = Arc::clone(&audit);
            let pnl = Arc::clone(&pnl);
            let max_daily_loss = limits.max_daily_loss;
            threads.push(std::thread::Builder::new().name("sage-housekeeping".into()).spawn(
                move || {
                    setup_hot_thread(core, None);
                    while !flag.is_set() {
                        std::thread::sleep(Duration::from_secs(1));

                        status_lines(&analytics_metrics, &risk_metrics, &execution_metrics, &pnl);

                        // Daily-loss watchdog: trips the breaker from off
                        // the hot path
                        if pnl.daily_pnl() <= -max_daily_loss && !breaker.is_tripped() {
                            let alert = RiskAlert::new(
                                monotonic_ns(),
                                pnl.total_exposure(),
                                pnl.daily_pnl(),
                                AlertSeverity::Critical,
                            );
                            error!(
                                exposure = alert.exposure,
                                daily_pnl = alert.daily_pnl,
                                "daily loss limit breached"
                            );
                            breaker.trip(BreakerReason::DailyLossBreach);
                        }

                        // Kernel visibility each second; the sync thread
                        // owns durability
                        audit.flush();
                    }
                },
            )?);
        }

        // ---- Audit sync thread (durability tick) ----------------------
        {
            let flag = shutdown.clone();
            let core = config.cores.housekeeping;
            let audit = Arc::clone(&audit);
            let interval = Duration::from_millis(config.durability.sync_interval_ms);
            threads.push(std::thread::Builder::new().name("sage-audit-sync".into()).spawn(
                move || {
                    setup_hot_thread(core, None);
                    while !flag.is_set() {
                        std::thread::sleep(interval);
                        audit.sync();
                    }
                },
            )?);
        }

        info!(
            sync_interval_ms = config.durability.sync_interval_ms,
            "pipeline started"
        );

        let mut runner = Runner {
            threads,
            shutdown,
            finalizers: Vec::new(),
            exchange_events: Some(events_tx),
            analytics_metrics,
            risk_metrics,
            execution_metrics,
            validator,
            audit: Arc::clone(&audit),
            breaker,
            pnl,
        };

        // Final durability checkpoint runs last (reverse order)
        runner.register_finalizer(move || {
            info!("syncing audit log");
            audit.sync();
        });

        Ok(runner)
    }

    /// Register teardown work; finalizers run in reverse registration
    /// order on [`Runner::join`], panics swallowed
    pub fn register_finalizer<F: FnOnce() + Send + 'static>(&mut self, f: F) {
        self.finalizers.push(Box::new(f));
    }

    /// Shared circuit breaker (manual halt / reset)
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    /// Producer for decoded exchange responses (ACK / FILL / REJECT)
    ///
    /// The exchange session decoder owns this once taken; `None`
    /// afterwards. Rejects delivered here reverse the rejected order's
    /// intent delta in the risk stage.
    pub fn exchange_events(&mut self) -> Option<Producer<ExchangeEvent>> {
        self.exchange_events.take()
    }

    /// Request shutdown without waiting
    pub fn request_shutdown(&self) {
        self.shutdown.request();
    }

    /// Point-in-time counters
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            ticks_processed: self
                .analytics_metrics
                .messages_processed
                .load(Ordering::Relaxed),
            ticks_rejected: self.validator.rejects(),
            signals_generated: self
                .analytics_metrics
                .signals_generated
                .load(Ordering::Relaxed),
            signals_gated: self.analytics_metrics.signals_gated.load(Ordering::Relaxed),
            orders_approved: self.risk_metrics.orders_approved.load(Ordering::Relaxed),
            orders_rejected: self.risk_metrics.orders_rejected.load(Ordering::Relaxed),
            orders_reversed: self.risk_metrics.orders_reversed.load(Ordering::Relaxed),
            orders_sent: self.execution_metrics.orders_sent.load(Ordering::Relaxed),
            orders_failed: self.execution_metrics.orders_failed.load(Ordering::Relaxed),
            audit_entries: self.audit.entries_logged(),
            total_exposure: self.pnl.total_exposure(),
            daily_pnl: self.pnl.daily_pnl(),
        }
    }

    /// Wait for every thread, then run the finalizers
    ///
    /// Returns the final statistics. Call after shutdown was requested
    /// (or a signal arrived); the hot loops exit on the next poll.
    pub fn join(mut self) -> Result<PipelineStats> {
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("pipeline thread panicked during shutdown");
            }
        }

        for finalizer in self.finalizers.drain(..).rev() {
            // A failing finalizer must not stop the rest of the chain
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(finalizer));
        }

        let stats = self.stats();
        info!(
            ticks = stats.ticks_processed,
            signals = stats.signals_generated,
            approved = stats.orders_approved,
            rejected = stats.orders_rejected,
            sent = stats.orders_sent,
            "pipeline stopped"
        );
        Ok(stats)
    }
}

/// Internal forward: spin until accepted or shutdown
///
/// Internal stages must not drop; a full queue here means the queues are
/// undersized for the workload.
#[inline]
fn forward(out: &mut Producer<Envelope>, env: Envelope, flag: &ShutdownFlag) {
    while !out.try_push(env) {
        if flag.is_set() {
            return;
        }
        std::hint::spin_loop();
    }
}

/// One status line per component, 1 Hz
fn status_lines(
    analytics: &AnalyticsMetrics,
    risk: &RiskMetrics,
    execution: &ExecutionMetrics,
    pnl: &PnlAggregates,
) {
    let proc = analytics.processing_latency.summary();
    let e2e = analytics.e2e_latency.summary();
    info!(
        target: "sage::ade",
        processed = analytics.messages_processed.load(Ordering::Relaxed),
        signals = analytics.signals_generated.load(Ordering::Relaxed),
        gated = analytics.signals_gated.load(Ordering::Relaxed),
        outliers = analytics.outliers_capped.load(Ordering::Relaxed),
        proc_p50_ns = proc.p50,
        e2e_p99_ns = e2e.p99,
        "analytics"
    );
    info!(
        target: "sage::rme",
        received = risk.signals_received.load(Ordering::Relaxed),
        approved = risk.orders_approved.load(Ordering::Relaxed),
        rejected = risk.orders_rejected.load(Ordering::Relaxed),
        exposure = pnl.total_exposure(),
        daily_pnl = pnl.daily_pnl(),
        "risk"
    );
    info!(
        target: "sage::poe",
        sent = execution.orders_sent.load(Ordering::Relaxed),
        failed = execution.orders_failed.load(Ordering::Relaxed),
        bytes = execution.bytes_sent.load(Ordering::Relaxed),
        "execution"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AnalyticsSection, Config, CoreConfig, DurabilityConfig, LoggingConfig, QueueConfig,
        RiskConfig,
    };
    use crate::execution::NullTransport;
    use crate::feed::SimulatedFeed;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            queues: QueueConfig {
                connector_to_analytics: 1024,
                analytics_to_risk: 1024,
                risk_to_execution: 1024,
            },
            risk: RiskConfig {
                max_position_per_symbol: dec!(1000),
                max_total_exposure: dec!(10000),
                max_daily_loss: dec!(100),
                max_order_size: dec!(50),
            },
            analytics: AnalyticsSection {
                ewma_half_life: 20,
                regime_half_life: 40,
                max_zscore: dec!(3.0),
                regime_threshold: dec!(2.0),
            },
            durability: DurabilityConfig {
                audit_path: dir.path().join("audit.log"),
                sync_interval_ms: 10,
            },
            cores: CoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let shutdown = ShutdownFlag::new();

        let (mut ticks_tx, ticks_rx) =
            channel::<Envelope>(config.queues.connector_to_analytics);
        let runner = Runner::start(
            &config,
            ticks_rx,
            NullTransport::default(),
            shutdown.clone(),
        )
        .unwrap();

        // Drive a burst of simulated ticks through the whole pipeline
        let mut feed = SimulatedFeed::new(8, 50_000.0, 42);
        for _ in 0..5_000 {
            let env = feed.next_tick();
            while !ticks_tx.try_push(env) {
                std::thread::yield_now();
            }
        }

        // Wait for the stages to drain (bounded)
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        loop {
            let s = runner.stats();
            let drained = s.ticks_processed == 5_000
                && s.signals_generated == s.orders_approved + s.orders_rejected
                && s.orders_sent + s.orders_failed == s.orders_approved;
            if drained || std::time::Instant::now() > deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        shutdown.request();
        let stats = runner.join().unwrap();

        assert_eq!(stats.ticks_processed, 5_000);
        assert_eq!(stats.ticks_rejected, 0);
        // Signals split between approved and rejected at the gate
        assert_eq!(
            stats.signals_generated,
            stats.orders_approved + stats.orders_rejected
        );
        // Everything approved was sent (null transport always succeeds)
        assert_eq!(stats.orders_sent, stats.orders_approved);
        assert_eq!(stats.orders_failed, 0);

        // The audit file exists with its header
        let contents = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert!(contents.starts_with("# SAGE Audit Log"));
    }

    #[test]
    fn test_out_of_range_symbols_rejected_at_ingress() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let shutdown = ShutdownFlag::new();

        let (mut ticks_tx, ticks_rx) =
            channel::<Envelope>(config.queues.connector_to_analytics);
        let runner = Runner::start(
            &config,
            ticks_rx,
            NullTransport::default(),
            shutdown.clone(),
        )
        .unwrap();

        use crate::core::{FixedPoint, Tick};
        let bad = Tick::trade(9_999, FixedPoint::from_f64(100.0), FixedPoint::from_f64(1.0));
        ticks_tx.try_push(Envelope::tick(0, 1, bad));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while runner.stats().ticks_rejected == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        shutdown.request();
        let stats = runner.join().unwrap();

        assert_eq!(stats.ticks_rejected, 1);
        assert_eq!(stats.ticks_processed, 0);
    }

    #[test]
    fn test_exchange_reject_reverses_intent_through_runner() {
        use crate::core::{FixedPoint, Tick};

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let audit_path = dir.path().join("audit.log");
        let shutdown = ShutdownFlag::new();

        let (mut ticks_tx, ticks_rx) =
            channel::<Envelope>(config.queues.connector_to_analytics);
        let mut runner = Runner::start(
            &config,
            ticks_rx,
            NullTransport::default(),
            shutdown.clone(),
        )
        .unwrap();
        let mut events = runner.exchange_events().expect("handle available once");
        assert!(runner.exchange_events().is_none());

        // A noisy tape ending in a dislocation guarantees approved orders
        for i in 0..=65u64 {
            let price = if i == 65 {
                50_015.0
            } else {
                50_000.0 + [0.0, 2.0, 0.0, -2.0][(i % 4) as usize]
            };
            let tick = Tick::trade(9, FixedPoint::from_f64(price), FixedPoint::from_f64(1.0));
            while !ticks_tx.try_push(Envelope::tick(monotonic_ns(), i, tick)) {
                std::thread::yield_now();
            }
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while runner.stats().orders_sent == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(runner.stats().orders_sent > 0, "no order reached execution");

        // The sync thread makes the audit file readable; pull the first
        // exchange order id from its ORDER record
        let exchange_id = loop {
            let contents = std::fs::read_to_string(&audit_path).unwrap_or_default();
            if let Some(id) = contents
                .lines()
                .find(|l| l.contains("|ORDER|"))
                .and_then(|l| l.split('|').nth(2))
                .and_then(|id| id.parse::<u64>().ok())
            {
                break id;
            }
            assert!(std::time::Instant::now() < deadline, "ORDER never synced");
            std::thread::sleep(Duration::from_millis(10));
        };

        // Exchange rejects it: the intent delta must be reversed
        events.push_blocking(ExchangeEvent::Reject {
            order_id: exchange_id,
            reason: "INSUFFICIENT_MARGIN".into(),
        });

        while runner.stats().orders_reversed == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        shutdown.request();
        let stats = runner.join().unwrap();
        assert_eq!(stats.orders_reversed, 1);

        let contents = std::fs::read_to_string(&audit_path).unwrap();
        assert!(contents.contains(&format!("REJECT|{}|INSUFFICIENT_MARGIN", exchange_id)));
    }

    #[test]
    fn test_finalizers_run_in_reverse_order() {
        use std::sync::Mutex;

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let shutdown = ShutdownFlag::new();

        let (_ticks_tx, ticks_rx) =
            channel::<Envelope>(config.queues.connector_to_analytics);
        let mut runner = Runner::start(
            &config,
            ticks_rx,
            NullTransport::default(),
            shutdown.clone(),
        )
        .unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            runner.register_finalizer(move || order.lock().unwrap().push(tag));
        }
        // A panicking finalizer must not break the chain
        runner.register_finalizer(|| panic!("finalizer failure"));

        shutdown.request();
        runner.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
    }
}
