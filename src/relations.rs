// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Smooth-number records for the congruence of squares search.
//!
//! Workers buffer the wheel candidates they enumerate; the builder keeps
//! the ones that factor completely over the factor base and multiplies
//! them together, in shuffled order, into composites exceeding the
//! threshold. Each record pairs such a composite (reduced mod n) with the
//! XOR of the parity vectors of its smooth parts. Two records with equal
//! parity vectors multiply to a square times a known even part, which is
//! what the linear algebra exploits.

use bitvec_simd::BitVec;
use num_traits::One;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::fbase::FBase;
use crate::Uint;

/// A pair (key, parity): key is a product of smooth parts mod n, parity
/// the factor-base exponent vector of the full product reduced mod 2.
#[derive(Clone, Debug)]
pub struct SmoothRelation {
    pub key: Uint,
    pub parity: BitVec,
}

/// The shared table of smooth-number records. Appenders hold the mutex
/// only while extending the row vector; factorization happens outside.
#[derive(Default)]
pub struct RelationTable {
    pub rows: Vec<SmoothRelation>,
    pub n_parts: usize,
    pub n_smooth: usize,
    pub n_records: usize,
}

impl RelationTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn log_progress<S: AsRef<str>>(&self, prefix: S) {
        eprintln!(
            "{} table has {} records ({} candidates seen, {} smooth, {} records built)",
            prefix.as_ref(),
            self.rows.len(),
            self.n_parts,
            self.n_smooth,
            self.n_records,
        )
    }
}

/// Factorizes x over the factor base and returns its exponent parity
/// vector, or None when x does not reduce to 1.
pub fn parity_vector(fbase: &FBase, x: &Uint) -> Option<BitVec> {
    let mut v = BitVec::zeros(fbase.len());
    let mut cofactor = *x;
    for idx in 0..fbase.len() {
        let div = fbase.div(idx);
        let mut odd = false;
        loop {
            let (q, r) = div.divrem_big(&cofactor);
            if r != 0 {
                break;
            }
            cofactor = q;
            odd = !odd;
        }
        v.set(idx, odd);
    }
    if cofactor.is_one() {
        Some(v)
    } else {
        None
    }
}

/// Builds smooth-number records out of a buffer of candidate values:
/// factor over the base, shuffle (the single nondeterministic step),
/// then accumulate products until they exceed the threshold. A partial
/// accumulation left over at the end of the walk is discarded.
pub fn build_smooth<R: Rng>(
    fbase: &FBase,
    n: &Uint,
    threshold: &Uint,
    parts: &[Uint],
    rng: &mut R,
) -> (Vec<SmoothRelation>, usize) {
    let mut smooths: Vec<(Uint, BitVec)> = vec![];
    for x in parts {
        if let Some(v) = parity_vector(fbase, x) {
            smooths.push((*x, v));
        }
    }
    let n_smooth = smooths.len();
    smooths.shuffle(rng);

    let mut records = vec![];
    let mut key = Uint::one();
    let mut parity = BitVec::zeros(fbase.len());
    for (x, v) in smooths {
        key *= x;
        parity.xor_inplace(&v);
        if key > *threshold {
            debug_assert!(
                parity_vector(fbase, &key).as_ref() == Some(&parity),
                "INTERNAL ERROR: record parity does not match its key"
            );
            records.push(SmoothRelation {
                key: key % n,
                parity,
            });
            key = Uint::one();
            parity = BitVec::zeros(fbase.len());
        }
    }
    (records, n_smooth)
}
