// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Empirical gear level selection.
//!
//! Each extra gear removes a (p-1)/p slice of the candidate set but makes
//! every surviving guess more expensive to reach. The best trade-off
//! depends on the machine, so it is measured rather than modeled: for
//! each eligible level, time a short enumeration run to get the cost per
//! surviving candidate, weight it by the surviving fraction of the index
//! space, and keep the cheapest product. The index-space size itself is
//! common to all levels and drops out of the comparison.

use std::time::Instant;

use crate::arith::isqrt;
use crate::wheel::{GearCascade, Wheel, GEAR_PRIMES};
use crate::{Uint, Verbosity};

/// Candidates enumerated per measurement.
const SAMPLE: usize = 4096;

/// Picks the gear level with the lowest estimated cost of exhausting the
/// candidate space of n, among the supported primes in
/// [wheel_level, max_level].
pub fn tune_gear_level(n: &Uint, wheel_level: u64, max_level: u64, v: Verbosity) -> u64 {
    let sqrt_n = isqrt(*n);
    let mut best = wheel_level;
    let mut best_cost = f64::INFINITY;
    for &g in GEAR_PRIMES.iter() {
        if g < wheel_level || g > max_level {
            continue;
        }
        let radius: u64 = GEAR_PRIMES.iter().filter(|&&p| p <= g).product();
        if Uint::from(radius) > sqrt_n {
            break;
        }
        let wheel = Wheel::new(wheel_level);
        let mut cascade = GearCascade::new(wheel_level, g);
        let survivors: f64 = cascade
            .primes()
            .iter()
            .map(|&p| (p - 1) as f64 / p as f64)
            .product();
        let t0 = Instant::now();
        let mut i = Uint::from(0u64);
        for _ in 0..SAMPLE {
            i += Uint::from(cascade.advance());
            let _ = wheel.forward(&i);
        }
        let per_guess = t0.elapsed().as_secs_f64() / SAMPLE as f64;
        let cost = per_guess * survivors;
        if v >= Verbosity::Verbose {
            eprintln!(
                "[tuner] gear level {g}: {:.1} ns/guess, {:.4} of the index space, score {:.3e}",
                per_guess * 1e9,
                survivors,
                cost
            );
        }
        if cost < best_cost {
            best_cost = cost;
            best = g;
        }
    }
    if v >= Verbosity::Info {
        eprintln!("[tuner] selected gear level {best}");
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuned_level_is_valid() {
        let n = Uint::from(12345678910111u64);
        let g = tune_gear_level(&n, 5, 11, Verbosity::Silent);
        assert!(GEAR_PRIMES.contains(&g));
        assert!(g >= 5 && g <= 11);
    }

    #[test]
    fn test_tuner_respects_small_inputs() {
        // sqrt(10403) = 101: only radii 2, 6 and 30 fit.
        let n = Uint::from(10403u64);
        let g = tune_gear_level(&n, 2, 11, Verbosity::Silent);
        assert!(g <= 5);
    }
}
