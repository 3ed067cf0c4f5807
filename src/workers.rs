// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Worker loops over the candidate space.
//!
//! Every worker owns a clone of the gear cascade, realigned at each batch
//! boundary, and pulls batches from the shared dispatcher until the node
//! subrange runs dry or another worker reports success through the shared
//! `done` flag. Brute force only tests candidates for exact division. The
//! smooth exhaust additionally buffers every candidate; when the buffer
//! fills it feeds the smooth-number builder and the worker returns so the
//! driver can interleave a linear-algebra round.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use num_traits::{One, Zero};
use rand::rngs::ThreadRng;

use crate::enumerate::BatchDispatcher;
use crate::fbase::FBase;
use crate::relations::{build_smooth, RelationTable};
use crate::wheel::{GearCascade, Wheel};
use crate::Uint;

/// Shared state of one search: read-only tables plus the batch
/// dispatcher and the cooperative cancellation flag.
pub struct Searcher {
    pub n: Uint,
    pub sqrt_n: Uint,
    pub wheel: Wheel,
    pub template: GearCascade,
    pub dispatcher: BatchDispatcher,
    pub done: AtomicBool,
}

/// The extra shared state of smooth-exhaust workers.
pub struct Exhaust<'a> {
    pub fbase: &'a FBase,
    pub table: &'a Mutex<RelationTable>,
    pub threshold: Uint,
    pub buffer_cap: usize,
}

impl Searcher {
    /// Tests every enumerated candidate for exact division, until a
    /// divisor emerges or the batches run out.
    pub fn brute_force(&self) -> Uint {
        let mut cascade = self.template.clone();
        while let Some(b) = self.dispatcher.next_batch() {
            if self.done.load(Ordering::Relaxed) {
                break;
            }
            let (start, end) = self.dispatcher.bounds(&b);
            let mut p = start;
            cascade.seek(&self.wheel.forward(&p));
            loop {
                p += Uint::from(cascade.advance());
                if p > end || self.done.load(Ordering::Relaxed) {
                    break;
                }
                let v = self.wheel.forward(&p);
                if v.is_one() || v == self.n {
                    continue;
                }
                if (self.n % v).is_zero() {
                    self.done.store(true, Ordering::Relaxed);
                    return v;
                }
            }
        }
        Uint::one()
    }

    /// As brute force, but candidates are collected for the smooth
    /// builder. Returns after one buffer flush so the driver can run
    /// linear algebra; exact hits still short-circuit.
    pub fn smooth_exhaust(&self, exh: &Exhaust) -> Uint {
        let mut cascade = self.template.clone();
        let mut buf: Vec<Uint> = Vec::with_capacity(exh.buffer_cap);
        let mut rng = rand::thread_rng();
        while let Some(b) = self.dispatcher.next_batch() {
            if self.done.load(Ordering::Relaxed) {
                break;
            }
            let (start, end) = self.dispatcher.bounds(&b);
            let mut p = start;
            cascade.seek(&self.wheel.forward(&p));
            loop {
                p += Uint::from(cascade.advance());
                if p > end || self.done.load(Ordering::Relaxed) {
                    break;
                }
                let v = self.wheel.forward(&p);
                if v.is_one() || v == self.n {
                    continue;
                }
                if (self.n % v).is_zero() {
                    self.done.store(true, Ordering::Relaxed);
                    return v;
                }
                buf.push(v);
            }
            // Flushing only between batches keeps the enumeration
            // exhaustive: no batch tail is ever abandoned.
            if buf.len() >= exh.buffer_cap {
                self.flush(exh, &mut buf, &mut rng);
                return Uint::one();
            }
        }
        if !buf.is_empty() {
            self.flush(exh, &mut buf, &mut rng);
        }
        Uint::one()
    }

    fn flush(&self, exh: &Exhaust, buf: &mut Vec<Uint>, rng: &mut ThreadRng) {
        let (records, n_smooth) = build_smooth(exh.fbase, &self.n, &exh.threshold, buf, rng);
        let mut table = exh.table.lock().unwrap();
        table.n_parts += buf.len();
        table.n_smooth += n_smooth;
        table.n_records += records.len();
        table.rows.extend(records);
        buf.clear();
    }
}
