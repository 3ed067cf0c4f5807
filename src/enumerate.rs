// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Partitioning of the candidate index space into batches.
//!
//! The index space [0, backward(sqrt(N))) is cut into fixed-size batches,
//! and each node owns a contiguous subrange of batch numbers. Within a
//! node, workers are handed batches alternately from the high and the low
//! end of the subrange so that concurrent workers stay spread out and
//! contention on the shared smooth table is desynchronized. Nodes never
//! communicate: a divisor is found as long as some node's subrange
//! contains a prime factor below sqrt(N).

use std::sync::Mutex;

use num_integer::Integer;
use num_traits::One;

use crate::Uint;

pub struct BatchDispatcher {
    next: Mutex<Uint>,
    // Batches owned by this node.
    range: Uint,
    offset: Uint,
    span: u64,
}

impl BatchDispatcher {
    /// Splits `total_indices` candidate indices into batches of `span`
    /// indices, and assigns this node its share of the batch numbers.
    pub fn new(total_indices: &Uint, span: u64, node_count: u64, node_id: u64) -> Self {
        assert!(span > 0 && node_count > 0 && node_id < node_count);
        let span_u = Uint::from(span);
        let batches = (*total_indices + span_u - Uint::one()) / span_u;
        let nodes = Uint::from(node_count);
        let range = (batches + nodes - Uint::one()) / nodes;
        BatchDispatcher {
            next: Mutex::new(Uint::from(0u64)),
            offset: Uint::from(node_id) * range,
            range,
            span,
        }
    }

    /// Total batches this node will hand out.
    pub fn range(&self) -> Uint {
        self.range
    }

    /// True once every batch of the subrange has been handed out.
    pub fn exhausted(&self) -> bool {
        *self.next.lock().unwrap() >= self.range
    }

    /// Next batch number, or None once the node subrange is exhausted.
    /// Even pulls come from the high end of the subrange, odd pulls from
    /// the low end; every batch is handed out exactly once.
    pub fn next_batch(&self) -> Option<Uint> {
        let mut next = self.next.lock().unwrap();
        if *next >= self.range {
            return None;
        }
        let k = *next;
        *next += Uint::one();
        let half = k >> 1;
        let b = if k.is_even() {
            self.offset + self.range - Uint::one() - half
        } else {
            self.offset + half
        };
        Some(b)
    }

    /// Candidate index interval of a batch; workers enumerate the wheel
    /// values with indices in (start, end].
    pub fn bounds(&self, b: &Uint) -> (Uint, Uint) {
        let start = *b * Uint::from(self.span);
        let end = start + Uint::from(self.span);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(d: &BatchDispatcher) -> Vec<Uint> {
        let mut out = vec![];
        while let Some(b) = d.next_batch() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_single_node_coverage() {
        for total in [1u64, 7, 96, 97, 100] {
            let d = BatchDispatcher::new(&Uint::from(total), 10, 1, 0);
            let mut got = drain(&d);
            assert_eq!(d.next_batch(), None);
            got.sort();
            let n = (total + 9) / 10;
            let expect: Vec<Uint> = (0..n).map(Uint::from).collect();
            assert_eq!(got, expect);
        }
    }

    #[test]
    fn test_alternating_order() {
        let d = BatchDispatcher::new(&Uint::from(60u64), 10, 1, 0);
        let got = drain(&d);
        let expect: Vec<Uint> = [5u64, 0, 4, 1, 3, 2].map(Uint::from).to_vec();
        assert_eq!(got, expect);
    }

    #[test]
    fn test_two_nodes_partition() {
        // Node subranges are disjoint and jointly cover all batches.
        let total = Uint::from(137u64);
        let d0 = BatchDispatcher::new(&total, 10, 2, 0);
        let d1 = BatchDispatcher::new(&total, 10, 2, 1);
        let mut all = drain(&d0);
        all.extend(drain(&d1));
        all.sort();
        all.dedup();
        // 14 batches split as 7 + 7
        let expect: Vec<Uint> = (0..14u64).map(Uint::from).collect();
        assert_eq!(all, expect);
    }

    #[test]
    fn test_bounds() {
        let d = BatchDispatcher::new(&Uint::from(100u64), 10, 1, 0);
        let (lo, hi) = d.bounds(&Uint::from(3u64));
        assert_eq!(lo, Uint::from(30u64));
        assert_eq!(hi, Uint::from(40u64));
    }
}
