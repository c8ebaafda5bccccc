//! End-to-end pipeline scenarios across stage boundaries
//!
//! Each test drives real envelopes through the public stage APIs the way
//! the runner threads do, without the threads, so failures point at
//! logic rather than timing.

use sage_core::analytics::{AnalyticsConfig, AnalyticsEngine};
use sage_core::core::{Envelope, FixedPoint, MessageKind, Signal, Tick, STRATEGY_MEAN_REVERSION};
use sage_core::execution::{AuditLog, ExecutionEngine, NullTransport, OrderIdGenerator};
use sage_core::queue::channel;
use sage_core::risk::{BreakerReason, CircuitBreaker, RiskGate, RiskLimits};
use sage_core::PRICE_SCALE;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn limits() -> RiskLimits {
    RiskLimits {
        max_position_per_symbol: 1_000 * PRICE_SCALE,
        max_total_exposure: 10_000 * PRICE_SCALE,
        max_daily_loss: 100 * PRICE_SCALE,
        max_order_size: 50 * PRICE_SCALE,
    }
}

fn signal_env(symbol: u64, direction: i8, confidence: f64) -> Envelope {
    Envelope::signal(
        0,
        1,
        Signal {
            symbol_id: symbol,
            confidence: FixedPoint::from_f64(confidence),
            direction,
            strategy: STRATEGY_MEAN_REVERSION,
            _reserved: [0; 6],
        },
    )
}

#[test]
fn queue_roundtrip_interleaved() {
    // S4: push 0..31 through a 16-slot queue with interleaved pops;
    // every push succeeds, pops observe insertion order, final size 0
    let (mut tx, mut rx) = channel::<u64>(16);
    let mut seen = Vec::new();

    for i in 0..32u64 {
        assert!(tx.try_push(i), "push {} failed", i);
        if i % 2 == 1 {
            seen.push(rx.try_pop().unwrap());
            seen.push(rx.try_pop().unwrap());
        }
    }

    assert_eq!(seen, (0..32).collect::<Vec<_>>());
    assert_eq!(rx.size_approx(), 0);
}

#[test]
fn envelopes_cross_queues_intact() {
    let (mut tx, mut rx) = channel::<Envelope>(64);

    let tick = Tick::trade(3, FixedPoint::from_f64(123.456), FixedPoint::from_f64(0.5));
    tx.try_push(Envelope::tick(111, 7, tick));

    let env = rx.try_pop().unwrap();
    assert_eq!(env.timestamp_ns, 111);
    assert_eq!(env.sequence_id, 7);
    let got = env.as_tick().unwrap();
    assert_eq!(got.price, FixedPoint::from_f64(123.456));
    assert_eq!(got.symbol_id, 3);
}

#[test]
fn breaker_blocks_the_gate() {
    // S6: trip the breaker, submit an otherwise-valid signal; approved
    // count unchanged, rejected count +1, nothing downstream
    let breaker = Arc::new(CircuitBreaker::new());
    let mut gate = RiskGate::new(limits(), Arc::clone(&breaker));
    let (mut orders_tx, mut orders_rx) = channel::<Envelope>(16);

    breaker.trip(BreakerReason::ManualHalt);

    if let Some(env) = gate.on_message(&signal_env(1, 1, 1.0)) {
        orders_tx.try_push(env);
    }

    let m = gate.metrics();
    assert_eq!(
        m.orders_approved
            .load(std::sync::atomic::Ordering::Relaxed),
        0
    );
    assert_eq!(
        m.orders_rejected
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
    assert!(orders_rx.try_pop().is_none(), "no order may reach the queue");

    // Reset re-opens the gate
    breaker.reset();
    assert!(gate.on_message(&signal_env(1, 1, 1.0)).is_some());
}

#[test]
fn analytics_to_risk_to_execution_flow() {
    // A dislocated tick becomes a signal, passes risk, and lands in the
    // audit file as ORDER + SENT
    let mut analytics = AnalyticsEngine::new(&AnalyticsConfig::default());
    let breaker = Arc::new(CircuitBreaker::new());
    let mut gate = RiskGate::new(limits(), breaker);

    let file = NamedTempFile::new().unwrap();
    let audit = Arc::new(AuditLog::open(file.path()).unwrap());
    let mut execution = ExecutionEngine::new(
        OrderIdGenerator::with_epoch(1_700_000_000),
        Arc::clone(&audit),
        NullTransport::default(),
    );

    // Noisy history whose last print sits on the mean, so the final
    // history tick carries no deviation of its own
    let mut signal = None;
    for i in 0..=64u64 {
        let wiggle = [0.0, 2.0, 0.0, -2.0][(i % 4) as usize];
        let tick = Tick::trade(
            9,
            FixedPoint::from_f64(50_000.0 + wiggle),
            FixedPoint::from_f64(1.0),
        );
        signal = analytics.on_message(&Envelope::tick(0, i, tick));
    }
    assert!(signal.is_none(), "on-mean tick must not signal");

    // Dislocation
    let tick = Tick::trade(
        9,
        FixedPoint::from_f64(50_015.0),
        FixedPoint::from_f64(1.0),
    );
    let signal = analytics
        .on_message(&Envelope::tick(0, 65, tick))
        .expect("dislocation should emit a signal");
    assert_eq!(signal.kind(), MessageKind::Signal);

    let order_env = gate.on_message(&signal).expect("risk should approve");
    let order = order_env.as_order_request().unwrap();
    assert_eq!(order.symbol_id, 9);

    // Position was updated before the order left the gate
    assert_ne!(gate.positions().position(9), 0);

    execution.on_message(&order_env);
    audit.sync();

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert!(contents.contains("|ORDER|"));
    assert!(contents.contains("|SENT|"));
    assert!(contents.contains("|9|")); // symbol id in the ORDER record
}

#[test]
fn exchange_reject_reverses_position_end_to_end() {
    // The compensation path: position moved on intent at the gate, the
    // order reached execution, the exchange rejected it, and the
    // reversal envelope carried the delta back to the risk stage.
    use sage_core::execution::ExchangeEvent;

    let breaker = Arc::new(CircuitBreaker::new());
    let mut gate = RiskGate::new(limits(), breaker);

    let file = NamedTempFile::new().unwrap();
    let audit = Arc::new(AuditLog::open(file.path()).unwrap());
    let (reversals_tx, mut reversals_rx) = channel::<Envelope>(16);
    let mut execution = ExecutionEngine::new(
        OrderIdGenerator::with_epoch(1_700_000_000),
        Arc::clone(&audit),
        NullTransport::default(),
    )
    .with_reversals(reversals_tx);

    // Approve a signal; intent accounting moves the position
    let order_env = gate.on_message(&signal_env(4, 1, 2.0)).unwrap();
    let order = order_env.as_order_request().unwrap();
    let order_value = order.quantity.raw() * order.side as i64;
    assert_eq!(gate.positions().position(4), order_value);
    assert_eq!(gate.positions().total_exposure(), order_value.abs());

    // The order leaves the process, then the exchange refuses it
    let exchange_id = execution.process_order(&order);
    execution.on_exchange_event(&ExchangeEvent::Reject {
        order_id: exchange_id,
        reason: "INSUFFICIENT_MARGIN".into(),
    });

    // The reversal envelope flows back into the gate and unwinds the delta
    let comp = reversals_rx.try_pop().expect("reversal envelope");
    assert_eq!(comp.kind(), MessageKind::OrderCancel);
    assert!(gate.on_message(&comp).is_none());

    assert_eq!(gate.positions().position(4), 0);
    assert_eq!(gate.positions().total_exposure(), 0);
    assert_eq!(
        gate.metrics()
            .orders_reversed
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );

    // The audit trail shows the full story
    audit.sync();
    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert!(contents.contains(&format!("ORDER|{}", exchange_id)));
    assert!(contents.contains(&format!("REJECT|{}|INSUFFICIENT_MARGIN", exchange_id)));
}

#[test]
fn daily_loss_trips_only_via_watchdog_semantics() {
    // The gate itself rejects on breached PnL; the breaker trip is the
    // housekeeping path's job. Both paths end in rejection.
    let breaker = Arc::new(CircuitBreaker::new());
    let mut gate = RiskGate::new(limits(), Arc::clone(&breaker));

    gate.positions_mut().record_pnl(-100 * PRICE_SCALE);
    assert!(gate.on_message(&signal_env(1, 1, 1.0)).is_none());
    assert!(!breaker.is_tripped(), "the gate does not trip the breaker");

    // Watchdog behavior (modeled): breach observed, breaker tripped
    if gate.positions().daily_pnl() <= -gate.limits().max_daily_loss {
        breaker.trip(BreakerReason::DailyLossBreach);
    }
    assert!(breaker.is_tripped());
    assert_eq!(breaker.reason(), BreakerReason::DailyLossBreach);
}
