//! Full five-stage pipeline on a simulated feed
//!
//! ```text
//! simulated connector -> analytics -> risk -> execution -> null transport
//! ```
//!
//! The connector thread plays the out-of-scope role: it produces ticks,
//! drops with a counter when its queue is full, and stamps receipt
//! timestamps. Stop with Ctrl-C / SIGTERM or `--ticks`.

use anyhow::Result;
use clap::Parser;
use sage_bins::common::{init, CommonArgs};
use sage_core::execution::NullTransport;
use sage_core::feed::SimulatedFeed;
use sage_core::pipeline::{Runner, ShutdownFlag};
use sage_core::queue::channel;
use sage_core::Envelope;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Symbols to simulate
    #[arg(long, default_value = "16")]
    symbols: usize,

    /// Stop after this many ticks (0 = run until signalled)
    #[arg(long, default_value = "0")]
    ticks: u64,

    /// Feed RNG seed
    #[arg(long, default_value = "1")]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = init(&args.common)?;

    tracing::info!("=== SAGE: simulated pipeline ===");
    tracing::info!(
        symbols = args.symbols,
        ticks = args.ticks,
        audit = %config.durability.audit_path.display(),
        "starting"
    );

    let shutdown = ShutdownFlag::install()?;
    let (mut ticks_tx, ticks_rx) = channel::<Envelope>(config.queues.connector_to_analytics);

    let runner = Runner::start(
        &config,
        ticks_rx,
        NullTransport::default(),
        shutdown.clone(),
    )?;

    // Connector role: produce ticks, drop and count on back-pressure,
    // interleave liveness heartbeats
    const CONNECTOR_COMPONENT_ID: u32 = 1;
    let mut feed = SimulatedFeed::new(args.symbols, 50_000.0, args.seed);
    let mut dropped = 0u64;
    let mut produced = 0u64;

    while !shutdown.is_set() {
        if args.ticks > 0 && produced >= args.ticks {
            break;
        }
        let env = feed.next_tick();
        produced += 1;
        if !ticks_tx.try_push(env) {
            dropped += 1;
        }
        if produced % 10_000 == 0 {
            let hb = Envelope::heartbeat(
                sage_core::perf::monotonic_ns(),
                produced,
                CONNECTOR_COMPONENT_ID,
            );
            let _ = ticks_tx.try_push(hb);
        }
    }

    // Give the stages a moment to drain, then stop
    std::thread::sleep(std::time::Duration::from_millis(200));
    shutdown.request();
    let stats = runner.join()?;

    tracing::info!("=== Final statistics ===");
    tracing::info!("Ticks produced:    {}", produced);
    tracing::info!("Ticks dropped:     {}", dropped);
    tracing::info!("Ticks processed:   {}", stats.ticks_processed);
    tracing::info!("Signals generated: {}", stats.signals_generated);
    tracing::info!("Signals gated:     {}", stats.signals_gated);
    tracing::info!("Orders approved:   {}", stats.orders_approved);
    tracing::info!("Orders rejected:   {}", stats.orders_rejected);
    tracing::info!("Orders reversed:   {}", stats.orders_reversed);
    tracing::info!("Orders sent:       {}", stats.orders_sent);
    tracing::info!("Audit entries:     {}", stats.audit_entries);
    tracing::info!("Final exposure:    {}", stats.total_exposure);

    Ok(())
}
