//! Simulated market data source
//!
//! A seedable random-walk tick generator for the simulated pipeline
//! binary and integration tests. Produces envelopes that already satisfy
//! the ingress contract; the validator still runs on them in the runner,
//! exactly as it would for a live connector.

use crate::core::{Envelope, FixedPoint, Tick, MAX_SYMBOLS};
use crate::perf::clock::monotonic_ns;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random-walk tick source over a set of symbols
pub struct SimulatedFeed {
    rng: StdRng,
    /// Mid prices per simulated symbol, raw scale
    prices: Vec<i64>,
    sequence: u64,
}

impl SimulatedFeed {
    /// Deterministic feed over `num_symbols` symbols starting near `base_price`
    pub fn new(num_symbols: usize, base_price: f64, seed: u64) -> Self {
        assert!(num_symbols > 0 && num_symbols <= MAX_SYMBOLS);
        let base = FixedPoint::from_f64(base_price).raw();
        let mut rng = StdRng::seed_from_u64(seed);
        // Spread the symbols out so their walks are distinguishable
        let prices = (0..num_symbols)
            .map(|_| base + rng.gen_range(-base / 100..=base / 100))
            .collect();
        Self {
            rng,
            prices,
            sequence: 0,
        }
    }

    /// Produce the next tick of the walk
    pub fn next_tick(&mut self) -> Envelope {
        let symbol = self.rng.gen_range(0..self.prices.len());
        let price = &mut self.prices[symbol];

        // +/- 5bp random step, floored at one tick
        let step_bp = self.rng.gen_range(-5i64..=5);
        *price = (*price + *price / 10_000 * step_bp).max(1);

        let qty = FixedPoint::from_f64(self.rng.gen_range(0.01..1.0));
        let tick = Tick::trade(symbol as u64, FixedPoint::from_raw(*price), qty);

        self.sequence += 1;
        Envelope::tick(monotonic_ns(), self.sequence, tick)
    }

    pub fn ticks_generated(&self) -> u64 {
        self.sequence
    }
}
