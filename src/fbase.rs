// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Prime sieve and factor base selection.
//!
//! The sieve is a segmented Sieve of Eratosthenes storing only positions
//! coprime to 2, 3 and 5 (4/15 of the bits). Candidate positions are walked
//! with a rotating 5-wheel/7-wheel bitmask pair so that multiples of 5 and 7
//! are never even visited. Composite marking is fanned out over the rayon
//! pool; the driver flushes pending markers whenever the candidate crosses
//! the current squared boundary, so entries are always final when read.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::arith::{pow_mod, PrimeDiv};
use crate::{Uint, UnexpectedFactor};

/// Segment size, in coprime-to-30 positions (the value span is 30/8 larger).
const SEGMENT_CARDINALITY: u64 = 1 << 21;

/// Positions coprime to 2, 3 mod 30 that are multiples of 5, one step ahead.
const WHEEL5: u16 = 0b00_1000_0001;
const WHEEL5_BACK: u16 = 1 << 9;
/// Positions coprime to 2, 3 mod 210 that are multiples of 7, one step ahead.
const WHEEL7: u64 = 9009416540524545;
const WHEEL7_BACK: u64 = 1 << 55;

/// The i-th integer coprime to 2 and 3 (i = 1 gives 1).
#[inline]
fn forward3(i: u64) -> u64 {
    (i << 1) + (!(!i | 1)) - 1
}

const M30: [u64; 8] = [1, 7, 11, 13, 17, 19, 23, 29];

/// The i-th integer coprime to 2, 3 and 5, counting from forward5(0) = 1.
#[inline]
fn forward5(i: u64) -> u64 {
    M30[(i % 8) as usize] + (i / 8) * 30
}

/// Number of integers in [1, n] coprime to 2, 3 and 5.
#[inline]
fn backward5(n: u64) -> u64 {
    let rem = n % 30;
    let mut k = 0;
    while k < 8 && M30[k] <= rem {
        k += 1;
    }
    (n / 30) * 8 + k as u64
}

/// Advances the rotating 5/7 wheel pair by one coprime position,
/// peeling one bit per step, and returns the number of skipped
/// coprime-to-6 positions.
#[inline]
fn wheel57_increment(wheel5: &mut u16, wheel7: &mut u64) -> u64 {
    let mut incr = 0u64;
    loop {
        let m5 = *wheel5 & 1 != 0;
        *wheel5 >>= 1;
        if m5 {
            *wheel5 |= WHEEL5_BACK;
            incr += 1;
            continue;
        }
        let m7 = *wheel7 & 1 != 0;
        *wheel7 >>= 1;
        if m7 {
            *wheel7 |= WHEEL7_BACK;
        }
        incr += 1;
        if !m7 {
            return incr;
        }
    }
}

// Marks multiples of p (coprime to 2, 3, 5, starting at p²) in the
// compressed array. Strides of 4p and 2p keep the walk off multiples
// of 3; multiples of 5 have no slot and are skipped by the test.
fn mark_multiples(composite: &[AtomicBool], p: u64, bound: u64) {
    let p2 = p << 1;
    let p4 = p << 2;
    let mut i = p * p;
    if p % 3 == 2 {
        composite[(backward5(i) - 1) as usize].store(true, Ordering::Relaxed);
        i += p2;
        if i > bound {
            return;
        }
    }
    loop {
        if i % 5 != 0 {
            composite[(backward5(i) - 1) as usize].store(true, Ordering::Relaxed);
        }
        i += p4;
        if i > bound {
            return;
        }
        if i % 5 != 0 {
            composite[(backward5(i) - 1) as usize].store(true, Ordering::Relaxed);
        }
        i += p2;
        if i > bound {
            return;
        }
    }
}

// In-memory sieve for moderate bounds.
fn sieve_simple(bound: u64) -> Vec<u64> {
    let mut primes: Vec<u64> = vec![2, 3, 5, 7];
    if bound < 11 {
        primes.retain(|&p| p <= bound);
        return primes;
    }

    let cardinality = backward5(bound);
    let composite: Vec<AtomicBool> = (0..cardinality).map(|_| AtomicBool::new(false)).collect();

    let mut wheel5 = WHEEL5;
    let mut wheel7 = WHEEL7;
    let mut o = 1u64;
    // Marking is deferred: everything below boundary² is final once the
    // pending primes are flushed, so reads never race with writes.
    let mut boundary = 36u64;
    let mut pending: Vec<u64> = vec![];
    loop {
        o += wheel57_increment(&mut wheel5, &mut wheel7);
        let p = forward3(o);
        if p * p > bound {
            break;
        }
        if p > boundary {
            pending
                .par_iter()
                .for_each(|&q| mark_multiples(&composite, q, bound));
            pending.clear();
            boundary *= boundary;
        }
        if composite[(backward5(p) - 1) as usize].load(Ordering::Relaxed) {
            continue;
        }
        primes.push(p);
        pending.push(p);
    }
    pending
        .par_iter()
        .for_each(|&q| mark_multiples(&composite, q, bound));

    loop {
        let p = forward3(o);
        if p > bound {
            break;
        }
        o += wheel57_increment(&mut wheel5, &mut wheel7);
        if composite[(backward5(p) - 1) as usize].load(Ordering::Relaxed) {
            continue;
        }
        primes.push(p);
    }
    primes
}

/// Ascending list of all primes up to `bound`.
///
/// Deterministic and order preserving; large bounds are processed in
/// segments so the working set stays bounded.
pub fn sieve_primes(bound: u64) -> Vec<u64> {
    let simple_span = forward5(SEGMENT_CARDINALITY) - 1;
    if bound <= simple_span {
        return sieve_simple(bound);
    }
    let mut primes = sieve_simple(simple_span);

    let total = backward5(bound);
    let mut low = SEGMENT_CARDINALITY;
    while low < total {
        let high = std::cmp::min(low + SEGMENT_CARDINALITY, total);
        let seg_lo = forward5(low);
        let seg_hi = forward5(high - 1);
        let composite: Vec<AtomicBool> =
            (0..high - low).map(|_| AtomicBool::new(false)).collect();

        let root = num_integer::sqrt(seg_hi) + 1;
        let sqrt_index = primes.partition_point(|&p| p <= root);
        // Skip 2, 3, 5: they have no slot in the compressed array.
        primes[3..sqrt_index].par_iter().for_each(|&p| {
            let mut i = (seg_lo / p) * p;
            if i < seg_lo {
                i += p;
            }
            if i & 1 == 0 {
                i += p;
            }
            while i <= seg_hi {
                if i % 3 != 0 && i % 5 != 0 {
                    composite[(backward5(i) - 1 - low) as usize].store(true, Ordering::Relaxed);
                }
                i += p << 1;
            }
        });

        for idx in 0..(high - low) {
            if !composite[idx as usize].load(Ordering::Relaxed) {
                let p = forward5(low + idx);
                if p <= bound {
                    primes.push(p);
                }
            }
        }
        low = high;
    }
    primes
}

/// A factor base of small primes p, all strictly above the gear top
/// and such that n is a quadratic residue mod p, along with
/// precomputed Barrett dividers.
#[derive(Clone, Debug)]
pub struct FBase {
    pub primes: Vec<u32>,
    pub divs: Vec<PrimeDiv>,
}

impl FBase {
    /// Selects up to `size` factor base primes out of `primes`.
    ///
    /// If a candidate prime happens to divide n the selection
    /// short-circuits: the caller gets a free divisor.
    pub fn select(
        n: &Uint,
        primes: &[u64],
        gear_top: u64,
        size: usize,
    ) -> Result<FBase, UnexpectedFactor> {
        let mut fb = FBase {
            primes: vec![],
            divs: vec![],
        };
        for &p in primes {
            if fb.len() >= size {
                break;
            }
            if p <= gear_top {
                continue;
            }
            // Base primes must stay below n (tiny inputs).
            if Uint::from(p) >= *n {
                break;
            }
            let div = PrimeDiv::new(p as u32);
            let np = div.rem_big(n);
            if np == 0 {
                return Err(UnexpectedFactor(p));
            }
            // Euler criterion: keep p only when n is a square mod p.
            if p == 2 || pow_mod(np, (p - 1) / 2, p) == 1 {
                fb.primes.push(p as u32);
                fb.divs.push(div);
            }
        }
        Ok(fb)
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn p(&self, idx: usize) -> u32 {
        self.primes[idx]
    }

    pub fn div(&self, idx: usize) -> &PrimeDiv {
        &self.divs[idx]
    }

    pub fn bound(&self) -> u32 {
        *self.primes.last().unwrap_or(&0)
    }
}
