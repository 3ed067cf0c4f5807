// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Random factoring testing: generates random semiprimes and checks that
//! the engine returns one of the two prime factors.

use std::time::Instant;

use num_traits::Zero;
use rand::Rng;

use findafactor::{fbase, find_a_factor, Method, Preferences, Uint};

fn main() {
    let arg = arguments::parse(std::env::args()).unwrap();
    if arg.get::<bool>("help").is_some() {
        eprintln!("Usage: faf-test [OPTIONS]");
        eprintln!("");
        eprintln!("Options:");
        eprintln!("  --help          show this help");
        eprintln!("  --bits B:       semiprime size (8..60, default 28)");
        eprintln!("  --iters N:      number of random inputs (default 50)");
        eprintln!("  --method 0-3:   search strategy (default 0)");
        return;
    }
    let bits = arg.get::<u32>("bits").unwrap_or(28).clamp(8, 60);
    let iters = arg.get::<u64>("iters").unwrap_or(50);
    let method = Method::from_tag(arg.get::<u64>("method").unwrap_or(0))
        .expect("unknown method tag");

    // Enough to prove primality of factors below 32 bits.
    let primes = fbase::sieve_primes(1 << 16);
    let prefs = Preferences {
        method,
        // Make the engine enumerate instead of winning by trial division.
        check_small_factors: false,
        ..Preferences::default()
    };

    let mut rng = rand::thread_rng();
    let t0 = Instant::now();
    for i in 0..iters {
        let p = random_prime(&mut rng, bits / 2, &primes);
        let q = random_prime(&mut rng, bits - bits / 2, &primes);
        let n = Uint::from(p) * Uint::from(q);
        let t1 = Instant::now();
        let d = find_a_factor(&n, &prefs, None);
        assert!(
            !d.is_zero() && (n % d).is_zero(),
            "{d} does not divide {p}*{q}"
        );
        if p != q {
            assert!(
                d == Uint::from(p) || d == Uint::from(q),
                "{p}*{q}: unexpected result {d}"
            );
        }
        eprintln!(
            "{}: {} = {} * {} found {} in {:.3}s",
            i,
            n,
            p,
            q,
            d,
            t1.elapsed().as_secs_f64()
        );
    }
    eprintln!("{} semiprimes factored in {:.3}s", iters, t0.elapsed().as_secs_f64());
}

// A random prime of the requested size, by rejection. Trial division is
// a primality proof here because candidates stay below 32 bits.
fn random_prime<R: Rng>(rng: &mut R, bits: u32, primes: &[u64]) -> u64 {
    assert!((4..=30).contains(&bits));
    loop {
        let x: u64 = rng.gen_range((1u64 << (bits - 1))..(1u64 << bits)) | 1;
        let mut composite = false;
        for &p in primes {
            if p * p > x {
                break;
            }
            if x % p == 0 {
                composite = true;
                break;
            }
        }
        if !composite {
            return x;
        }
    }
}
