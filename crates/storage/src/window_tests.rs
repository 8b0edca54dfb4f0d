// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use berth_core::test_support::strategies::arb_sample_series;
use proptest::prelude::*;

fn sample_at(ts_ms: u64) -> MetricSample {
    MetricSample::builder().ts_ms(ts_ms).build()
}

#[test]
fn evicts_oldest_when_over_capacity() {
    let mut window = MetricsWindow::new(RetentionPolicy::new(3, DEFAULT_MAX_AGE));
    for ts in 1..=5 {
        window.push(sample_at(1_000_000 + ts));
    }
    let kept: Vec<u64> = window.iter().map(|s| s.ts_ms).collect();
    assert_eq!(kept, vec![1_000_003, 1_000_004, 1_000_005]);
}

#[test]
fn evicts_by_age_relative_to_newest() {
    let mut window = MetricsWindow::new(RetentionPolicy::new(100, Duration::from_secs(10)));
    window.push(sample_at(1_000));
    window.push(sample_at(5_000));
    let evicted = window.push(sample_at(12_000));

    assert_eq!(evicted, 1);
    assert_eq!(window.len(), 2);
    assert_eq!(window.iter().last().map(|s| s.ts_ms), Some(12_000));
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let policy = RetentionPolicy::new(0, DEFAULT_MAX_AGE);
    assert_eq!(policy.capacity(), 1);

    let mut window = MetricsWindow::new(policy);
    window.push(sample_at(1));
    window.push(sample_at(2));
    assert_eq!(window.to_vec(), vec![sample_at(2)]);
}

#[test]
fn from_samples_applies_horizon_at_now() {
    let policy = RetentionPolicy::new(10, Duration::from_secs(60));
    let seeded = [sample_at(10_000), sample_at(50_000), sample_at(90_000)];
    let window = MetricsWindow::from_samples(policy, seeded, 120_000);

    let kept: Vec<u64> = window.iter().map(|s| s.ts_ms).collect();
    assert_eq!(kept, vec![90_000]);
}

#[test]
fn horizon_saturates_at_zero() {
    let policy = RetentionPolicy::new(10, Duration::from_secs(60));
    assert_eq!(policy.horizon_ms(5), 0);
}

proptest! {
    #[test]
    fn never_exceeds_capacity(
        capacity in 1usize..64,
        series in arb_sample_series(256),
    ) {
        let mut window = MetricsWindow::new(RetentionPolicy::new(capacity, DEFAULT_MAX_AGE));
        for sample in series {
            window.push(sample);
            prop_assert!(window.len() <= capacity);
        }
    }

    #[test]
    fn keeps_the_most_recent_suffix(
        capacity in 1usize..64,
        series in arb_sample_series(256),
    ) {
        let mut window = MetricsWindow::new(RetentionPolicy::new(capacity, DEFAULT_MAX_AGE));
        for sample in series.iter().copied() {
            window.push(sample);
        }
        let start = series.len().saturating_sub(capacity);
        prop_assert_eq!(window.to_vec(), series[start..].to_vec());
    }
}
