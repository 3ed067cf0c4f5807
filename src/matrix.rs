// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Linear algebra over the parity vectors of smooth-number records.
//!
//! The record table is treated as a matrix over GF(2) whose i-th row is
//! (key_i, parity_i). Two reduction strategies produce candidate squares:
//! full Gaussian elimination, where zeroed rows beyond the column count
//! are products of records with even exponents everywhere, and a
//! duplicate-row scan, where two rows with equal parity vectors multiply
//! to such a product. Candidates go through an Euler-criterion style
//! congruence check yielding gcd(x ± y, n).
//!
//! Row updates within one elimination column have no mutual dependency
//! and are fanned out over the thread pool, joining at every column.

use rayon::prelude::*;

use crate::arith::{gcd, pow_mod};
use crate::relations::SmoothRelation;
use crate::{Uint, Verbosity};

use num_traits::One;

/// Congruence-of-squares check on a candidate square s (a product of
/// smooth parts with even exponent parities everywhere).
///
/// Returns a proper divisor of n, or 1. Never anything else.
pub fn check(s: &Uint, n: &Uint) -> Uint {
    let one = Uint::one();
    let x = *s % *n;
    // A pseudo square root of s by Euler's criterion (n is odd here,
    // so n/2 rounds down to (n-1)/2).
    let y = pow_mod(x, *n >> 1, *n);
    if x == y {
        return one;
    }
    for d in [gcd(*n, x + y), gcd(*n, *n + x - y)] {
        if one < d && d < *n {
            return d;
        }
    }
    one
}

/// XOR-Gaussian elimination over the record table, in place: row swaps
/// and row combinations keep every key paired with its parity vector.
/// Keys are multiplied mod n, which leaves all congruence checks intact.
///
/// After elimination, rows past the column count whose parity vector is
/// zero are candidate squares; each is checked, then all zeroed rows are
/// dropped from the table. Returns the largest divisor surfaced, if any.
pub fn gaussian_round(
    rows: &mut Vec<SmoothRelation>,
    ncols: usize,
    n: &Uint,
    tpool: Option<&rayon::ThreadPool>,
    v: Verbosity,
) -> Option<Uint> {
    let nrows = rows.len();
    for c in 0..std::cmp::min(ncols, nrows) {
        let Some(r) = (c..nrows).find(|&r| rows[r].parity[c]) else {
            continue;
        };
        rows.swap(c, r);
        let pivot = rows[c].clone();
        let update = |(i, row): (usize, &mut SmoothRelation)| {
            if i != c && row.parity[c] {
                row.parity.xor_inplace(&pivot.parity);
                row.key = (row.key * pivot.key) % *n;
            }
        };
        if let Some(pool) = tpool {
            pool.install(|| rows.par_iter_mut().enumerate().for_each(update));
        } else {
            rows.iter_mut().enumerate().for_each(update);
        }
    }

    let mut best: Option<Uint> = None;
    let mut tried = 0usize;
    for row in rows.iter().skip(ncols) {
        if row.parity.none() {
            tried += 1;
            let d = check(&row.key, n);
            if !d.is_one() && best.map_or(true, |b| d > b) {
                best = Some(d);
            }
        }
    }
    if v >= Verbosity::Verbose && tried > 0 {
        eprintln!("[gauss] {} zero rows tried, divisor found: {}", tried, best.is_some());
    }
    rows.retain(|row| !row.parity.none());
    best
}

/// Duplicate-row scan: without eliminating, look for pairs of rows with
/// identical parity vectors starting at `offset`, and check the product
/// of their keys. The scan stops at the first divisor; the smaller index
/// of every tried pair is dropped from the table afterwards.
pub fn duplicate_round(
    rows: &mut Vec<SmoothRelation>,
    offset: usize,
    n: &Uint,
) -> Option<Uint> {
    let mut strike: Vec<usize> = vec![];
    let mut found: Option<Uint> = None;
    'scan: for i in offset..rows.len() {
        for j in i + 1..rows.len() {
            if rows[i].parity != rows[j].parity {
                continue;
            }
            strike.push(i);
            let s = (rows[i].key * rows[j].key) % *n;
            let d = check(&s, n);
            if !d.is_one() {
                found = Some(d);
                break 'scan;
            }
            break;
        }
    }
    let mut idx = 0usize;
    rows.retain(|_| {
        let keep = !strike.contains(&idx);
        idx += 1;
        keep
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec_simd::BitVec;
    use num_traits::Zero;
    use std::str::FromStr;

    fn rel(key: u64, bits: &[u8]) -> SmoothRelation {
        let mut parity = BitVec::zeros(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            parity.set(i, b != 0);
        }
        SmoothRelation {
            key: Uint::from(key),
            parity,
        }
    }

    #[test]
    fn test_check_is_divisor_or_one() {
        let n = Uint::from(35u64);
        for s in 2..200u64 {
            let d = check(&Uint::from(s * s), &n);
            assert!(d.is_one() || (n % d).is_zero() && d > Uint::one() && d < n);
        }
    }

    #[test]
    fn test_check_finds_split() {
        let d = check(&Uint::from(25u64), &Uint::from(91u64));
        assert_eq!(d, Uint::from(13u64));
        let d = check(&Uint::from(4u64), &Uint::from(10403u64));
        assert_eq!(d, Uint::from(101u64));
        let d = check(&Uint::from(36u64), &Uint::from(77u64));
        assert_eq!(d, Uint::from(7u64));
    }

    #[test]
    fn test_gaussian_zeroes_dependent_rows() {
        let n = Uint::from_str("1000000000000000003").unwrap();
        // Rows 0-2 are independent; row 3 is their XOR, so elimination
        // must zero it out and offer key(0)*key(1)*key(2)*key(3) mod n.
        let mut rows = vec![
            rel(6, &[1, 0, 0]),
            rel(10, &[0, 1, 0]),
            rel(15, &[0, 0, 1]),
            rel(30, &[1, 1, 1]),
        ];
        let _ = gaussian_round(&mut rows, 3, &n, None, Verbosity::Silent);
        // The dependent row was zeroed, then dropped.
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(!row.parity.none());
        }
    }

    #[test]
    fn test_duplicate_round_strikes_smaller() {
        let n = Uint::from(1_000_003u64 * 998_857);
        let mut rows = vec![
            rel(2, &[1, 0]),
            rel(3, &[0, 1]),
            rel(5, &[1, 0]),
            rel(7, &[1, 1]),
        ];
        // Rows 0 and 2 have equal parities; the pair is tried and the
        // smaller index removed whatever the check outcome.
        let _ = duplicate_round(&mut rows, 0, &n);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].key, Uint::from(3u64));
        assert_eq!(rows[1].key, Uint::from(5u64));
    }

    #[test]
    fn test_duplicate_round_respects_offset() {
        let n = Uint::from(1_000_003u64 * 998_857);
        let mut rows = vec![rel(2, &[1, 0]), rel(5, &[1, 0])];
        let _ = duplicate_round(&mut rows, 1, &n);
        // Pair (0, 1) starts below the offset: nothing tried.
        assert_eq!(rows.len(), 2);
    }
}
