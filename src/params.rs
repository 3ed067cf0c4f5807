// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Derived sizes and tuning knobs.

use crate::arith::ilog2;
use crate::Uint;

/// Default bound of the prime sieve feeding trial division and the
/// factor base; scaled by the sieving bound multiplier.
pub const DEFAULT_SIEVE_BOUND: u64 = 1 << 16;

/// Nominal semi-smooth buffer size; scaled by the batch size multiplier.
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 12;

/// Candidate indices per batch, per wheel entry.
const SPAN_PER_ENTRY: f64 = 64.0;

pub fn sieve_bound(multiplier: f64) -> u64 {
    std::cmp::max(64, (multiplier * DEFAULT_SIEVE_BOUND as f64) as u64)
}

/// Number of factor base primes: proportional to the bit length of n.
/// The floor keeps degenerate multipliers workable.
pub fn factor_base_size(n: &Uint, multiplier: f64) -> usize {
    std::cmp::max(8, (multiplier * ilog2(n) as f64).ceil() as usize)
}

pub fn batch_span(wheel_entries: u64, multiplier: f64) -> u64 {
    std::cmp::max(
        wheel_entries,
        (multiplier * wheel_entries as f64 * SPAN_PER_ENTRY) as u64,
    )
}

pub fn buffer_capacity(multiplier: f64) -> usize {
    std::cmp::max(16, (multiplier * DEFAULT_BUFFER_SIZE as f64) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    #[test]
    fn test_sizes() {
        assert_eq!(sieve_bound(1.0), DEFAULT_SIEVE_BOUND);
        assert_eq!(sieve_bound(0.0), 64);
        let n = Uint::one() << 256;
        assert_eq!(factor_base_size(&n, 1.0), 256);
        assert_eq!(factor_base_size(&n, 0.001), 8);
        assert_eq!(batch_span(480, 1.0), 480 * 64);
        assert_eq!(batch_span(480, 0.0), 480);
        assert_eq!(buffer_capacity(0.75), 3072);
        assert_eq!(buffer_capacity(0.0), 16);
    }
}
