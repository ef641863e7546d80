use chrono::{Days, NaiveDate};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use statarb_core::model::{StateSpaceParams, StaticSpreadModel};
use statarb_core::trading::{AdaptiveKalman, FixedThreshold, SpreadStrategy};
use statarb_core::universe::AlignedLegs;
use statarb_core::PairId;

// ===========================================================================
// Trading state machines: band rules, forced close, filter recursion and
// transaction costs.
// ===========================================================================

fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2015, 7, 1).unwrap();
    (0..n).map(|i| start + Days::new(i as u64)).collect()
}

fn pair() -> PairId {
    PairId::new("KO", "PEP")
}

/// Mean-reverting spread around zero.
fn noisy_spread(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut s = 0.0;
    (0..n)
        .map(|_| {
            s = 0.7 * s + rng.gen_range(-1.0..1.0);
            s
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Fixed bands
// ---------------------------------------------------------------------------

#[test]
fn test_fixed_short_entry_and_exit_scenario() {
    let rule = FixedThreshold::default();
    let log = rule.simulate_series(
        &pair(),
        &dates(5),
        &[0.0, 5.0, 3.0, 1.0, 0.0],
        &[0.0, 2.5, 1.0, -0.5, 0.0],
    );
    assert_eq!(log.realized, vec![0.0, 0.0, 0.0, 4.0, 0.0]);
    assert_eq!(log.trade_count(), 1);
}

#[test]
fn test_fixed_long_forced_close_is_positive_when_spread_rose() {
    let rule = FixedThreshold::default();
    let log = rule.simulate_series(
        &pair(),
        &dates(4),
        &[0.0, -6.0, -5.0, -4.5],
        &[0.0, -3.0, -2.5, -1.5],
    );
    assert_eq!(log.realized[3], 1.5);
    assert!(!log.diverged);
}

#[test]
fn test_each_simulation_starts_flat() {
    let rule = FixedThreshold::default();
    // A short opened on the last bar of one run must not leak into the next.
    let first = rule.simulate_series(&pair(), &dates(2), &[0.0, 4.0], &[0.0, 3.0]);
    assert_eq!(first.realized, vec![0.0, 0.0]);
    let second = rule.simulate_series(&pair(), &dates(2), &[0.0, 0.0], &[0.0, -1.0]);
    assert_eq!(second.realized, vec![0.0, 0.0]);
    assert_eq!(second.round_trips, 0);
}

// ---------------------------------------------------------------------------
// Adaptive filter
// ---------------------------------------------------------------------------

#[test]
fn test_noiseless_identity_model_converges_immediately() {
    let params = StateSpaceParams {
        a: 0.0,
        b: 1.0,
        c: 0.0,
        d: 0.0,
    };
    let (log, trace) =
        AdaptiveKalman::default().simulate_series(&pair(), &params, &dates(10), &[1.25; 10]);
    assert!(trace.filtered_means.iter().all(|m| *m == 1.25));
    assert!(trace.filtered_variances.iter().all(|v| *v == 0.0));
    assert_eq!(log.trade_count(), 0);
}

#[test]
fn test_kalman_trace_covers_every_date() {
    let params = StateSpaceParams {
        a: 0.0,
        b: 0.7,
        c: 0.6,
        d: 0.3,
    };
    let spread = noisy_spread(60, 5);
    let (log, trace) =
        AdaptiveKalman::default().simulate_series(&pair(), &params, &dates(60), &spread);
    assert_eq!(trace.dates, log.dates);
    assert_eq!(trace.observed, spread);
    assert_eq!(log.realized[0], 0.0);
    assert!(trace.filtered_variances.iter().all(|v| *v >= 0.0));
}

// ---------------------------------------------------------------------------
// Transaction costs
// ---------------------------------------------------------------------------

#[test]
fn test_cost_shifts_only_nonzero_values_fixed() {
    let spread = noisy_spread(250, 11);
    let z: Vec<f64> = spread.iter().map(|s| s / 0.6).collect();
    let plain = FixedThreshold::default();
    let costly = FixedThreshold {
        cost: Some(0.006),
        ..plain
    };
    let a = plain.simulate_series(&pair(), &dates(250), &spread, &z);
    let b = costly.simulate_series(&pair(), &dates(250), &spread, &z);
    assert!(a.trade_count() > 0);
    for (x, y) in a.realized.iter().zip(&b.realized) {
        if *x == 0.0 {
            assert_eq!(*y, 0.0);
        } else {
            assert_eq!(*y, x - 0.006);
        }
    }
}

#[test]
fn test_cost_shifts_only_nonzero_values_kalman() {
    let params = StateSpaceParams {
        a: 0.0,
        b: 0.7,
        c: 0.6,
        d: 0.3,
    };
    let spread = noisy_spread(250, 12);
    let plain = AdaptiveKalman::default();
    let costly = AdaptiveKalman {
        cost: Some(0.006),
        ..plain
    };
    let (a, _) = plain.simulate_series(&pair(), &params, &dates(250), &spread);
    let (b, _) = costly.simulate_series(&pair(), &params, &dates(250), &spread);
    for (x, y) in a.realized.iter().zip(&b.realized) {
        if *x == 0.0 {
            assert_eq!(*y, 0.0);
        } else {
            assert_eq!(*y, x - 0.006);
        }
    }
}

#[test]
fn test_strategy_trait_builds_spread_from_legs() {
    let model = StaticSpreadModel {
        beta: 2.0,
        mean: 0.0,
        sd: 0.5,
    };
    // Spread: 0, 1.5, -0.25 -> z: 0, 3, -0.5
    let legs = AlignedLegs {
        dates: dates(3),
        leg1: vec![1.0, 1.0, 1.0],
        leg2: vec![2.0, 3.5, 1.75],
    };
    let log = FixedThreshold::default().simulate(&pair(), &model, &legs);
    assert_eq!(log.realized, vec![0.0, 0.0, 1.75]);
    assert_eq!(log.round_trips, 1);
}
