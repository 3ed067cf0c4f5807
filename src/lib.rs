// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! findafactor searches for a single nontrivial divisor of a large
//! integer, combining small-prime trial division, a wheel/gear-factorized
//! enumeration of the candidates below sqrt(N), and a congruence of
//! squares extractor seeded by the exhaust of that enumeration.
//!
//! Bibliography:
//!
//! Carl Pomerance, A Tale of Two Sieves
//! https://www.ams.org/notices/199612/pomerance.pdf
//!
//! https://en.wikipedia.org/wiki/Wheel_factorization

use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use num_traits::{One, Zero};
use rayon::prelude::*;

pub mod arith;
pub mod enumerate;
pub mod fbase;
pub mod matrix;
pub mod params;
pub mod relations;
pub mod tuner;
pub mod wheel;
pub mod workers;

use enumerate::BatchDispatcher;
use fbase::FBase;
use relations::RelationTable;
use wheel::{GearCascade, Wheel, GEAR_PRIMES};
use workers::{Exhaust, Searcher};

// We need to perform modular multiplication modulo the input number,
// and the linear algebra multiplies unreduced smooth products as well.
pub type Uint = arith::U8192;

/// Inputs are capped well below the integer width so that products of
/// two reduced values never overflow.
pub const MAX_BITS: u32 = 4096;

/// A small prime divisor discovered where none was supposed to appear
/// (factor base selection).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnexpectedFactor(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    #[default]
    Silent,
    Info,
    Verbose,
    Debug,
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silent" => Ok(Verbosity::Silent),
            "info" => Ok(Verbosity::Info),
            "verbose" => Ok(Verbosity::Verbose),
            "debug" => Ok(Verbosity::Debug),
            _ => Err(format!("invalid verbosity level {s}")),
        }
    }
}

/// Search strategies, by wire tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    BruteForce,
    SmoothExhaustDuplicates,
    SmoothExhaustGaussian,
    PrimeProver,
}

impl Method {
    pub fn from_tag(tag: u64) -> Option<Method> {
        match tag {
            0 => Some(Method::BruteForce),
            1 => Some(Method::SmoothExhaustDuplicates),
            2 => Some(Method::SmoothExhaustGaussian),
            3 => Some(Method::PrimeProver),
            _ => None,
        }
    }
}

/// User preferences for the search. Out-of-range values are clamped
/// with a logged warning rather than rejected.
#[derive(Clone, Debug)]
pub struct Preferences {
    pub method: Method,
    pub node_count: u64,
    pub node_id: u64,
    /// Highest prime of the gear cascade.
    pub gear_level: u64,
    /// Highest prime of the hard-coded wheel table.
    pub wheel_level: u64,
    pub sieving_bound_multiplier: f64,
    pub smoothness_bound_multiplier: f64,
    pub batch_size_multiplier: f64,
    /// Rows below this index are never re-examined by duplicate scans.
    pub gaussian_elimination_row_offset: usize,
    pub check_small_factors: bool,
    pub threads: Option<usize>,
    pub verbosity: Verbosity,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            method: Method::BruteForce,
            node_count: 1,
            node_id: 0,
            gear_level: 11,
            wheel_level: 11,
            sieving_bound_multiplier: 1.0,
            smoothness_bound_multiplier: 1.0,
            batch_size_multiplier: 0.75,
            gaussian_elimination_row_offset: 0,
            check_small_factors: true,
            threads: None,
            verbosity: Verbosity::Silent,
        }
    }
}

impl Preferences {
    pub fn verbose(&self, v: Verbosity) -> bool {
        self.verbosity >= v
    }
}

/// Finds a divisor d of n with 1 <= d <= n.
///
/// A return of 1 means no divisor was found in the explored range; for a
/// prime input with an exhaustive method this is the expected outcome,
/// but 1 is not a primality certificate. The caller is expected to
/// verify d * (n / d) == n.
pub fn find_a_factor(n: &Uint, prefs: &Preferences, tpool: Option<&rayon::ThreadPool>) -> Uint {
    let v = prefs.verbosity;
    assert!(
        n.bits() <= MAX_BITS,
        "input size ({} bits) exceeds {} bits limit",
        n.bits(),
        MAX_BITS
    );
    assert!(*n >= Uint::from(2u64), "input must be at least 2");

    // Perfect squares short-circuit to their root.
    if let Some(r) = arith::exact_sqrt(n) {
        if v >= Verbosity::Info {
            eprintln!("Input is a perfect square");
        }
        return r;
    }
    let sqrt_n = arith::isqrt(*n);

    let (wheel_level, gear_level) = clamp_levels(prefs, &sqrt_n);
    let node_count = std::cmp::max(1, prefs.node_count);
    let mut node_id = prefs.node_id;
    if node_id >= node_count {
        if v >= Verbosity::Info {
            eprintln!("Warning: node id {node_id} out of range, clamping");
        }
        node_id = node_count - 1;
    }
    let sieving_mult = positive_or(prefs.sieving_bound_multiplier, 1.0, "sieving bound", v);
    let smooth_mult = positive_or(prefs.smoothness_bound_multiplier, 1.0, "smoothness bound", v);
    let batch_mult = positive_or(prefs.batch_size_multiplier, 0.75, "batch size", v);

    // The enumerator only ever produces values coprime to the gear
    // primes, so division by them is not optional: no later phase can
    // reach their multiples.
    for &p in GEAR_PRIMES.iter() {
        if p > gear_level {
            break;
        }
        let pb = Uint::from(p);
        if pb >= *n {
            break;
        }
        if (*n % pb).is_zero() {
            if v >= Verbosity::Info {
                eprintln!("Found gear prime factor {p}");
            }
            return pb;
        }
    }

    let bound = params::sieve_bound(sieving_mult);
    if v >= Verbosity::Info {
        eprintln!("Sieving primes up to {bound}");
    }
    // Composite marking fans out over the same pool as the workers.
    let primes = match tpool {
        Some(pool) => pool.install(|| fbase::sieve_primes(bound)),
        None => fbase::sieve_primes(bound),
    };

    // The remainder of the trial division range is reachable by the
    // other phases and stays optional.
    if prefs.check_small_factors || prefs.method == Method::PrimeProver {
        for &p in &primes {
            let pb = Uint::from(p);
            if pb >= *n {
                break;
            }
            if (*n % pb).is_zero() {
                if v >= Verbosity::Info {
                    eprintln!("Found small factor {p} by trial division");
                }
                return pb;
            }
        }
    }

    let wheel = Wheel::new(wheel_level);
    let template = GearCascade::new(wheel_level, gear_level);
    let total = wheel.backward(&sqrt_n);
    let span = params::batch_span(wheel.entries(), batch_mult);
    let dispatcher = BatchDispatcher::new(&total, span, node_count, node_id);
    if v >= Verbosity::Info {
        eprintln!(
            "Wheel radius {} with gears {:?}, {} candidate indices, batch span {}",
            wheel.radius(),
            template.primes(),
            total,
            span
        );
        eprintln!(
            "Node {}/{} owns {} batches",
            node_id,
            node_count,
            dispatcher.range()
        );
    }
    let searcher = Searcher {
        n: *n,
        sqrt_n,
        wheel,
        template,
        dispatcher,
        done: AtomicBool::new(false),
    };
    let nworkers = tpool.map_or(1, |p| p.current_num_threads());

    match prefs.method {
        Method::BruteForce | Method::PrimeProver => {
            let results = run_round(tpool, nworkers, || searcher.brute_force());
            consolidate(n, &results).unwrap_or_else(Uint::one)
        }
        method => {
            let fb_size = params::factor_base_size(n, smooth_mult);
            let fbase = match FBase::select(n, &primes, gear_level, fb_size) {
                Ok(fb) => fb,
                Err(UnexpectedFactor(p)) => {
                    if v >= Verbosity::Info {
                        eprintln!("Factor base prime {p} divides the input");
                    }
                    return Uint::from(p);
                }
            };
            if v >= Verbosity::Info {
                eprintln!(
                    "Factor base of {} primes (bound {})",
                    fbase.len(),
                    fbase.bound()
                );
            }
            let threshold = if method == Method::SmoothExhaustGaussian {
                *n
            } else {
                sqrt_n
            };
            let table = Mutex::new(RelationTable::default());
            let exh = Exhaust {
                fbase: &fbase,
                table: &table,
                threshold,
                buffer_cap: params::buffer_capacity(batch_mult),
            };
            loop {
                let results = run_round(tpool, nworkers, || searcher.smooth_exhaust(&exh));
                if let Some(d) = consolidate(n, &results) {
                    return d;
                }
                let mut t = table.lock().unwrap();
                if v >= Verbosity::Verbose {
                    t.log_progress("[exhaust]");
                }
                let found = match method {
                    Method::SmoothExhaustGaussian => {
                        if t.rows.len() > fbase.len() {
                            matrix::gaussian_round(&mut t.rows, fbase.len(), n, tpool, v)
                        } else {
                            None
                        }
                    }
                    _ => matrix::duplicate_round(
                        &mut t.rows,
                        prefs.gaussian_elimination_row_offset,
                        n,
                    ),
                };
                drop(t);
                if let Some(d) = found {
                    if Uint::one() < d && d < *n && (*n % d).is_zero() {
                        if v >= Verbosity::Info {
                            eprintln!("Divisor found by congruence of squares");
                        }
                        return d;
                    }
                }
                if searcher.dispatcher.exhausted() {
                    break;
                }
            }
            Uint::one()
        }
    }
}

// The wheel and gear levels must be supported primes, with the gear at
// least as large as the wheel, and small inputs shrink both so that the
// gear radius stays within sqrt(n).
fn clamp_levels(prefs: &Preferences, sqrt_n: &Uint) -> (u64, u64) {
    let v = prefs.verbosity;
    let mut wheel = prefs.wheel_level;
    let mut gear = prefs.gear_level;
    if wheel > wheel::MAX_LEVEL {
        if v >= Verbosity::Info {
            eprintln!(
                "Warning: wheel level {wheel} above hard-coded maximum, clamping to {}",
                wheel::MAX_LEVEL
            );
        }
        wheel = wheel::MAX_LEVEL;
    }
    if gear > wheel::MAX_LEVEL {
        if v >= Verbosity::Info {
            eprintln!(
                "Warning: gear level {gear} above hard-coded maximum, clamping to {}",
                wheel::MAX_LEVEL
            );
        }
        gear = wheel::MAX_LEVEL;
    }
    if gear < wheel {
        if v >= Verbosity::Info {
            eprintln!("Warning: gear level {gear} below wheel level {wheel}, clamping");
        }
        gear = wheel;
    }
    let snap = |l: u64| {
        GEAR_PRIMES
            .iter()
            .copied()
            .filter(|&p| p <= l)
            .max()
            .unwrap_or(2)
    };
    let mut wheel = snap(wheel);
    let mut gear = snap(gear);
    let primorial = |l: u64| -> u64 {
        GEAR_PRIMES
            .iter()
            .copied()
            .filter(|&p| p <= l)
            .product()
    };
    while gear > 2 && Uint::from(primorial(gear)) > *sqrt_n {
        gear = snap(gear - 1);
    }
    if wheel > gear {
        wheel = gear;
    }
    (wheel, gear)
}

fn positive_or(x: f64, default: f64, what: &str, v: Verbosity) -> f64 {
    if x > 0.0 {
        x
    } else {
        if v >= Verbosity::Info {
            eprintln!("Warning: {what} multiplier must be positive, using {default}");
        }
        default
    }
}

// One round of workers, one per pool thread.
fn run_round<F>(tpool: Option<&rayon::ThreadPool>, nworkers: usize, f: F) -> Vec<Uint>
where
    F: Fn() -> Uint + Send + Sync,
{
    match tpool {
        Some(pool) => pool.install(|| (0..nworkers).into_par_iter().map(|_| f()).collect()),
        None => vec![f()],
    }
}

// Workers surface numeric results or the sentinel 1; keep the largest
// nontrivial divisor.
fn consolidate(n: &Uint, results: &[Uint]) -> Option<Uint> {
    results
        .iter()
        .copied()
        .filter(|d| Uint::one() < *d && *d < *n && (*n % *d).is_zero())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(method: Method) -> Preferences {
        Preferences {
            method,
            ..Preferences::default()
        }
    }

    fn assert_proper(n: &Uint, d: &Uint) {
        assert!(Uint::one() < *d && *d < *n, "divisor {d} out of range");
        assert!((*n % *d).is_zero(), "{d} does not divide {n}");
        assert_eq!(*d * (*n / *d), *n);
    }

    #[test]
    fn test_trial_division() {
        let n = Uint::from(1000u64);
        let d = find_a_factor(&n, &prefs(Method::BruteForce), None);
        assert_eq!(d, Uint::from(2u64));
    }

    #[test]
    fn test_prime_returns_one() {
        let n = Uint::from(17u64);
        let d = find_a_factor(&n, &prefs(Method::BruteForce), None);
        assert!(d.is_one());
    }

    #[test]
    fn test_perfect_square() {
        let n = Uint::from(1_000_003u64) * Uint::from(1_000_003u64);
        let d = find_a_factor(&n, &prefs(Method::BruteForce), None);
        assert_eq!(d, Uint::from(1_000_003u64));
    }

    #[test]
    fn test_semiprime_brute() {
        let n = Uint::from(101u64 * 103);
        let mut p = prefs(Method::BruteForce);
        p.check_small_factors = false;
        let d = find_a_factor(&n, &p, None);
        assert_proper(&n, &d);
    }

    #[test]
    fn test_two_nodes_union() {
        // One node's subrange contains the divisor, the other exhausts.
        let n = Uint::from(15u64);
        let mut results = vec![];
        for node_id in 0..2u64 {
            let mut p = prefs(Method::BruteForce);
            p.check_small_factors = false;
            p.node_count = 2;
            p.node_id = node_id;
            results.push(find_a_factor(&n, &p, None));
        }
        let proper: Vec<&Uint> = results.iter().filter(|d| !d.is_one()).collect();
        assert_eq!(proper.len(), 1);
        assert!(*proper[0] == Uint::from(3u64) || *proper[0] == Uint::from(5u64));
    }

    #[test]
    fn test_smooth_exhaust_duplicates() {
        let n = Uint::from(101u64 * 103);
        let mut p = prefs(Method::SmoothExhaustDuplicates);
        p.check_small_factors = false;
        let d = find_a_factor(&n, &p, None);
        assert_proper(&n, &d);
    }

    #[test]
    fn test_smooth_exhaust_gaussian() {
        let n = Uint::from(101u64 * 103);
        let mut p = prefs(Method::SmoothExhaustGaussian);
        p.check_small_factors = false;
        let d = find_a_factor(&n, &p, None);
        assert_proper(&n, &d);
    }

    #[test]
    fn test_gaussian_runs_to_exhaustion() {
        // 2 * 100003: one factor is a wheel prime, the other sits above
        // sqrt(n), so only a congruence could surface a divisor; either
        // outcome respects the contract.
        let n = Uint::from(2u64 * 100_003);
        let mut p = prefs(Method::SmoothExhaustGaussian);
        p.check_small_factors = false;
        let d = find_a_factor(&n, &p, None);
        if !d.is_one() {
            assert_proper(&n, &d);
        }
    }

    #[test]
    fn test_gear_prime_factor_always_found() {
        // The enumerator never visits multiples of the gear primes, so
        // the driver must divide by them even with trial division off.
        let n = Uint::from(2u64 * 999_999_937);
        for tag in 0..4u64 {
            let mut p = prefs(Method::from_tag(tag).unwrap());
            p.check_small_factors = false;
            let d = find_a_factor(&n, &p, None);
            assert_eq!(d, Uint::from(2u64));
        }
    }

    #[test]
    fn test_prime_prover() {
        let n = Uint::from(101u64);
        let mut p = prefs(Method::PrimeProver);
        // The prover always trial divides, whatever the flag says.
        p.check_small_factors = false;
        assert!(find_a_factor(&n, &p, None).is_one());

        let n = Uint::from(1000u64);
        assert_eq!(find_a_factor(&n, &p, None), Uint::from(2u64));
    }

    #[test]
    fn test_methods_agree_on_divisibility() {
        for tag in 0..4u64 {
            let method = Method::from_tag(tag).unwrap();
            for n in [35u64, 143, 1003, 10403] {
                let n = Uint::from(n);
                let d = find_a_factor(&n, &prefs(method), None);
                assert!(!d.is_zero());
                assert!((n % d).is_zero());
                assert!(d <= n);
            }
        }
    }

    #[test]
    fn test_level_clamping() {
        // Oversized and inconsistent levels are clamped, not fatal.
        let n = Uint::from(101u64 * 103);
        let mut p = prefs(Method::BruteForce);
        p.check_small_factors = false;
        p.wheel_level = 97;
        p.gear_level = 3;
        let d = find_a_factor(&n, &p, None);
        assert_proper(&n, &d);
    }

    #[test]
    #[ignore = "sweeps to a 31-bit factor, takes minutes; run with -- --ignored"]
    fn test_gaussian_64bit_semiprime() {
        // 1922917127 * 6736306637: both factors are far above the trial
        // division bound, so the divisor must come out of the exhaust.
        let n = Uint::from_str("12953359405011071899").unwrap();
        let pool = rayon::ThreadPoolBuilder::new()
            .build()
            .expect("cannot create thread pool");
        let p = prefs(Method::SmoothExhaustGaussian);
        let d = find_a_factor(&n, &p, Some(&pool));
        assert_proper(&n, &d);
        assert!(d == Uint::from(1922917127u64) || d == Uint::from(6736306637u64));
    }

    #[test]
    #[ignore = "exhausts a 2^32-scale candidate space, takes minutes; run with -- --ignored"]
    fn test_prime_prover_exhausts_64bit_prime() {
        // 2^64 - 59 is prime: every batch is consumed, then 1 comes back.
        let n = (Uint::one() << 64) - Uint::from(59u64);
        let pool = rayon::ThreadPoolBuilder::new()
            .build()
            .expect("cannot create thread pool");
        let mut p = prefs(Method::PrimeProver);
        p.check_small_factors = true;
        let d = find_a_factor(&n, &p, Some(&pool));
        assert!(d.is_one());
    }

    #[test]
    fn test_with_thread_pool() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(3)
            .build()
            .expect("cannot create thread pool");
        let n = Uint::from(101u64 * 103);
        let mut p = prefs(Method::BruteForce);
        p.check_small_factors = false;
        let d = find_a_factor(&n, &p, Some(&pool));
        assert_proper(&n, &d);
    }

    #[test]
    fn test_method_tags() {
        assert_eq!(Method::from_tag(0), Some(Method::BruteForce));
        assert_eq!(Method::from_tag(3), Some(Method::PrimeProver));
        assert_eq!(Method::from_tag(4), None);
        assert_eq!(Verbosity::from_str("verbose"), Ok(Verbosity::Verbose));
        assert!(Verbosity::from_str("loud").is_err());
    }
}
