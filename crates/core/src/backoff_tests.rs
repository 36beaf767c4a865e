// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use yare::parameterized;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn default_policy() {
    let policy = BackoffPolicy::default();
    assert_eq!(policy.initial_delay(), ms(1000));
    assert_eq!(policy.max_delay(), ms(30_000));
    assert_eq!(policy.jitter_percent(), 10);
}

#[parameterized(
    first = { 0, 1000 },
    second = { 1, 2000 },
    third = { 2, 4000 },
    fifth = { 4, 16_000 },
    capped = { 5, 30_000 },
    far_past_cap = { 40, 30_000 },
    huge_attempt = { u32::MAX, 30_000 },
)]
fn base_delay_doubles_then_caps(attempt: u32, expected_ms: u64) {
    let policy = BackoffPolicy::default();
    assert_eq!(policy.base_delay(attempt), ms(expected_ms));
}

#[test]
fn delay_stays_within_jitter_band() {
    let policy = BackoffPolicy::default();
    let mut rng = StdRng::seed_from_u64(7);

    for attempt in 0..20 {
        let base = policy.base_delay(attempt).as_millis() as f64;
        let low = (base * 0.9).floor() as u128;
        let high = (base * 1.1).floor() as u128;
        for _ in 0..200 {
            let delay = policy.delay_with_rng(attempt, &mut rng).as_millis();
            assert!(
                (low..=high).contains(&delay),
                "attempt {attempt}: {delay}ms outside [{low}, {high}]"
            );
        }
    }
}

#[test]
fn thread_rng_delay_stays_within_band() {
    let policy = BackoffPolicy::default();
    for _ in 0..100 {
        let delay = policy.delay(3).as_millis();
        assert!((7200..=8800).contains(&delay));
    }
}

#[test]
fn zero_jitter_is_deterministic() {
    let policy = BackoffPolicy::new(ms(250), ms(10_000), 0).unwrap();
    assert_eq!(policy.delay(0), ms(250));
    assert_eq!(policy.delay(2), ms(1000));
    assert_eq!(policy.delay(10), ms(10_000));
}

#[parameterized(
    low_edge = { 0.9, 900 },
    high_edge = { 1.1, 1100 },
    floors_fraction = { 0.9005, 900 },
    below_range_clamped = { 0.5, 900 },
    above_range_clamped = { 3.0, 1100 },
)]
fn delay_with_factor_applies_multiplier(factor: f64, expected_ms: u64) {
    let policy = BackoffPolicy::default();
    assert_eq!(policy.delay_with_factor(0, factor), ms(expected_ms));
}

#[test]
fn full_jitter_can_reach_zero() {
    let policy = BackoffPolicy::new(ms(100), ms(100), 100).unwrap();
    assert_eq!(policy.jitter_range(), (0.0, 2.0));
    assert_eq!(policy.delay_with_factor(0, 0.0), ms(0));
    assert_eq!(policy.delay_with_factor(0, 2.0), ms(200));
}

#[parameterized(
    zero_initial = { 0, 1000, 10 },
    max_below_initial = { 2000, 1000, 10 },
    jitter_over_100 = { 1000, 30_000, 101 },
)]
fn new_rejects_invalid_shapes(initial_ms: u64, max_ms: u64, jitter: u32) {
    let err = BackoffPolicy::new(ms(initial_ms), ms(max_ms), jitter).unwrap_err();
    assert!(matches!(err, Error::InvalidBackoff(_)));
}

#[test]
fn equal_initial_and_max_is_flat() {
    let policy = BackoffPolicy::new(ms(500), ms(500), 0).unwrap();
    for attempt in 0..5 {
        assert_eq!(policy.delay(attempt), ms(500));
    }
}
