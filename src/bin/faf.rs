// Copyright 2023 Rémy Oudompheng. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Command-line front end.
//!
//! Every engine parameter can be set through a FINDAFACTOR_ environment
//! variable; positional arguments override the environment.

use std::str::FromStr;

use num_traits::One;

use findafactor::{find_a_factor, Method, Preferences, Uint, Verbosity};

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let s = env_var(name)?;
    match s.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => panic!("could not parse {name}={s}"),
    }
}

fn parse_bool(s: &str) -> bool {
    s != "False" && s != "false" && s != "0"
}

fn main() {
    let arg = arguments::parse(std::env::args()).unwrap();
    if arg.get::<bool>("help").is_some() || arg.orphans.is_empty() {
        eprintln!(
            "Usage: faf [OPTIONS] NUMBER [METHOD] [NODE_COUNT] [NODE_ID] [GEAR_LEVEL] \
             [WHEEL_LEVEL] [SIEVING_BOUND_MULTIPLIER] [SMOOTHNESS_BOUND_MULTIPLIER] \
             [GAUSSIAN_ELIMINATION_ROW_OFFSET] [CHECK_SMALL_FACTORS]"
        );
        eprintln!("");
        eprintln!("Methods:");
        eprintln!("  0 brute force    1 smooth exhaust (duplicates)");
        eprintln!("  2 smooth exhaust (Gaussian)    3 prime prover");
        eprintln!("");
        eprintln!("Options:");
        eprintln!("  --help                    show this help");
        eprintln!("  --verbose silent|info|verbose|debug");
        eprintln!("  --threads N:              enable up to N computation threads");
        eprintln!("  --tune:                   pick the gear level by measurement");
        eprintln!("");
        eprintln!("Every positional parameter may also be set through the");
        eprintln!("environment (FINDAFACTOR_METHOD, FINDAFACTOR_NODE_COUNT, ...);");
        eprintln!("positional arguments take precedence.");
        return;
    }

    let mut prefs = Preferences {
        verbosity: Verbosity::Info,
        ..Preferences::default()
    };

    // Environment layer.
    if let Some(tag) = env_parse::<u64>("FINDAFACTOR_METHOD") {
        prefs.method = Method::from_tag(tag)
            .unwrap_or_else(|| panic!("unknown method tag {tag}"));
    }
    if let Some(c) = env_parse::<u64>("FINDAFACTOR_NODE_COUNT") {
        prefs.node_count = c;
    }
    if let Some(id) = env_parse::<u64>("FINDAFACTOR_NODE_ID") {
        prefs.node_id = id;
    }
    if let Some(l) = env_parse::<u64>("FINDAFACTOR_GEAR_LEVEL") {
        prefs.gear_level = l;
    }
    if let Some(l) = env_parse::<u64>("FINDAFACTOR_WHEEL_LEVEL") {
        prefs.wheel_level = l;
    }
    if let Some(m) = env_parse::<f64>("FINDAFACTOR_SIEVING_BOUND_MULTIPLIER") {
        prefs.sieving_bound_multiplier = m;
    }
    if let Some(m) = env_parse::<f64>("FINDAFACTOR_SMOOTHNESS_BOUND_MULTIPLIER") {
        prefs.smoothness_bound_multiplier = m;
    }
    if let Some(m) = env_parse::<f64>("FINDAFACTOR_BATCH_SIZE_MULTIPLIER") {
        prefs.batch_size_multiplier = m;
    }
    if let Some(o) = env_parse::<usize>("FINDAFACTOR_GAUSSIAN_ELIMINATION_ROW_OFFSET") {
        prefs.gaussian_elimination_row_offset = o;
    }
    if let Some(s) = env_var("FINDAFACTOR_CHECK_SMALL_FACTORS") {
        prefs.check_small_factors = parse_bool(&s);
    }
    if let Some(t) = env_parse::<usize>("FINDAFACTOR_THREAD_COUNT") {
        prefs.threads = if t == 0 { None } else { Some(t) };
    }

    // Positional layer.
    let orphans = &arg.orphans;
    let n = Uint::from_str(&orphans[0]).expect("could not read decimal number");
    if let Some(s) = orphans.get(1) {
        let tag = s.parse::<u64>().expect("could not read method tag");
        prefs.method = Method::from_tag(tag)
            .unwrap_or_else(|| panic!("unknown method tag {tag}"));
    }
    if let Some(s) = orphans.get(2) {
        prefs.node_count = s.parse().expect("could not read node count");
    }
    if let Some(s) = orphans.get(3) {
        prefs.node_id = s.parse().expect("could not read node id");
    }
    if let Some(s) = orphans.get(4) {
        prefs.gear_level = s.parse().expect("could not read gear level");
    }
    if let Some(s) = orphans.get(5) {
        prefs.wheel_level = s.parse().expect("could not read wheel level");
    }
    if let Some(s) = orphans.get(6) {
        prefs.sieving_bound_multiplier = s.parse().expect("could not read sieving multiplier");
    }
    if let Some(s) = orphans.get(7) {
        prefs.smoothness_bound_multiplier =
            s.parse().expect("could not read smoothness multiplier");
    }
    if let Some(s) = orphans.get(8) {
        prefs.gaussian_elimination_row_offset =
            s.parse().expect("could not read row offset");
    }
    if let Some(s) = orphans.get(9) {
        prefs.check_small_factors = parse_bool(s);
    }

    // Option layer.
    if let Some(t) = arg.get::<usize>("threads") {
        prefs.threads = Some(t);
    }
    if let Some(vs) = arg.get::<String>("verbose") {
        prefs.verbosity = Verbosity::from_str(&vs).unwrap();
    }
    if arg.get::<bool>("tune").is_some() {
        prefs.gear_level = findafactor::tuner::tune_gear_level(
            &n,
            prefs.wheel_level,
            prefs.gear_level,
            prefs.verbosity,
        );
    }

    // One worker per hardware thread unless told otherwise.
    let threads = prefs.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|t| t.get())
            .unwrap_or(1)
    });
    let tpool: Option<rayon::ThreadPool> = if threads > 1 {
        if prefs.verbose(Verbosity::Verbose) {
            eprintln!("Using a pool of {threads} threads");
        }
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .expect("cannot create thread pool"),
        )
    } else {
        None
    };

    let d = find_a_factor(&n, &prefs, tpool.as_ref());
    if prefs.verbose(Verbosity::Info) && !d.is_one() && d != n {
        eprintln!("{} * {} == {}", d, n / d, n);
    }
    println!("{}", d);
}
