use chrono::{Datelike, Days, NaiveDate, Weekday};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use statarb_core::config::{FailedFitPolicy, SelectionConfig};
use statarb_core::selection::{evaluate_candidate, rank_pairs, select_pairs, PairCandidate, Verdict};
use statarb_core::universe::PriceUniverse;
use statarb_core::PairId;

// ===========================================================================
// Formation-window selection: normalization, distance ranking and the
// Engle-Granger gate, driven through the public API.
// ===========================================================================

fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d = d + Days::new(1);
    }
    out
}

fn universe(columns: Vec<(&str, Vec<f64>)>) -> PriceUniverse {
    let n = columns[0].1.len();
    let start = NaiveDate::from_ymd_opt(2004, 1, 5).unwrap();
    PriceUniverse::new(
        business_days(start, n),
        columns
            .into_iter()
            .map(|(t, c)| (t.to_string(), c.into_iter().map(Some).collect()))
            .collect(),
    )
    .unwrap()
}

/// Upward-drifting price path.
fn trending(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut level = 50.0;
    (0..n)
        .map(|_| {
            level += 0.05 + rng.gen_range(-0.5..0.5);
            level
        })
        .collect()
}

/// `beta * base` plus i.i.d. noise: a stationary residual.
fn cointegrated_with(base: &[f64], beta: f64, rng: &mut StdRng) -> Vec<f64> {
    base.iter().map(|x| beta * x + rng.gen_range(-0.5..0.5)).collect()
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[test]
fn test_first_valid_price_normalizes_to_one() {
    let dates = business_days(NaiveDate::from_ymd_opt(2010, 3, 1).unwrap(), 6);
    let late = vec![None, None, Some(40.0), Some(44.0), Some(38.0), Some(50.0)];
    let early = vec![Some(8.0), Some(9.0), Some(10.0), Some(7.0), Some(6.0), Some(12.0)];
    let u = PriceUniverse::new(
        dates.clone(),
        vec![("LATE".into(), late.clone()), ("EARLY".into(), early.clone())],
    )
    .unwrap();

    for start in 0..dates.len() {
        let slice = u.slice(dates[start], dates[dates.len() - 1]).unwrap();
        for (ticker, raw) in [("LATE", &late), ("EARLY", &early)] {
            let column = slice.column(ticker).unwrap();
            let window = &raw[start..];
            let Some(anchor) = window.iter().flatten().next().copied() else {
                continue;
            };
            let first = window.iter().position(|p| p.is_some()).unwrap();
            assert_eq!(column[first], Some(1.0));
            for (norm, price) in column.iter().zip(window) {
                assert_eq!(*norm, price.map(|p| p / anchor));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Distance ranking
// ---------------------------------------------------------------------------

#[test]
fn test_identical_normalized_series_rank_first_with_zero_distance() {
    let mut rng = StdRng::seed_from_u64(21);
    let a = trending(120, &mut rng);
    let doubled: Vec<f64> = a.iter().map(|p| p * 2.0).collect();
    let other = trending(120, &mut rng);
    let u = universe(vec![("OTHER", other), ("A", a), ("A2", doubled)]);
    let slice = u.slice(u.first_date(), u.last_date()).unwrap();

    let ranked = rank_pairs(&slice);
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].pair, PairId::new("A", "A2"));
    assert!(ranked[0].distance < 1e-20);
    assert!(ranked.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn test_ranking_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(4);
    let cols: Vec<(&str, Vec<f64>)> = ["W", "X", "Y", "Z"]
        .into_iter()
        .map(|t| (t, trending(80, &mut rng)))
        .collect();
    let u = universe(cols);
    let slice = u.slice(u.first_date(), u.last_date()).unwrap();
    assert_eq!(rank_pairs(&slice), rank_pairs(&slice));
}

// ---------------------------------------------------------------------------
// Cointegration gate
// ---------------------------------------------------------------------------

#[test]
fn test_stationary_residual_pair_is_accepted() {
    let mut rng = StdRng::seed_from_u64(99);
    let x = trending(400, &mut rng);
    let y = cointegrated_with(&x, 0.8, &mut rng);
    let u = universe(vec![("X", x), ("Y", y)]);
    let slice = u.slice(u.first_date(), u.last_date()).unwrap();
    let candidate = PairCandidate {
        pair: PairId::new("X", "Y"),
        distance: 0.0,
    };
    let verdict = evaluate_candidate(&slice, &candidate, &SelectionConfig::default());
    assert!(matches!(verdict, Verdict::Accepted(_)), "{:?}", verdict);
}

#[test]
fn test_random_walk_residual_pair_is_rejected() {
    let mut rng = StdRng::seed_from_u64(8);
    let x: Vec<f64> = (0..400).map(|_| 10.0 + rng.gen_range(-0.5..0.5)).collect();
    let mut walk = 0.0;
    let y: Vec<f64> = x
        .iter()
        .map(|v| {
            walk += 0.5 + rng.gen_range(-1.0..1.0);
            v + 5.0 + walk
        })
        .collect();
    let u = universe(vec![("X", x), ("Y", y)]);
    let slice = u.slice(u.first_date(), u.last_date()).unwrap();
    let candidate = PairCandidate {
        pair: PairId::new("X", "Y"),
        distance: 0.0,
    };
    let verdict = evaluate_candidate(&slice, &candidate, &SelectionConfig::default());
    assert!(matches!(verdict, Verdict::NotStationary { .. }), "{:?}", verdict);
}

// ---------------------------------------------------------------------------
// Portfolio size
// ---------------------------------------------------------------------------

fn three_cointegrated_pairs() -> PriceUniverse {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut cols = Vec::new();
    for (base, hedge) in [("A1", "B1"), ("A2", "B2"), ("A3", "B3")] {
        let x = trending(300, &mut rng);
        let y = cointegrated_with(&x, 1.3, &mut rng);
        cols.push((base, x));
        cols.push((hedge, y));
    }
    universe(cols)
}

#[test]
fn test_portfolio_never_exceeds_target() {
    let u = three_cointegrated_pairs();
    let slice = u.slice(u.first_date(), u.last_date()).unwrap();
    let ranked = rank_pairs(&slice);
    for target in 1..=20 {
        let (portfolio, report) =
            select_pairs(&slice, &ranked, target, &SelectionConfig::default());
        assert!(portfolio.len() <= target);
        assert_eq!(portfolio.len(), report.accepted);
    }
}

#[test]
fn test_portfolio_fills_when_enough_pairs_pass() {
    let u = three_cointegrated_pairs();
    let slice = u.slice(u.first_date(), u.last_date()).unwrap();
    let ranked = rank_pairs(&slice);
    let (portfolio, _) = select_pairs(&slice, &ranked, 2, &SelectionConfig::default());
    assert_eq!(portfolio.len(), 2);

    let (all, report) = select_pairs(&slice, &ranked, 1000, &SelectionConfig::default());
    assert!(all.len() >= 3);
    assert_eq!(report.candidates_tested, ranked.len());
}

#[test]
fn test_failed_fit_policy_changes_budget_use() {
    // X and XX overlap on three dates only, too few for the ADF test.
    let mut rng = StdRng::seed_from_u64(77);
    let mut x = vec![f64::NAN; 200];
    let mut xx = vec![f64::NAN; 200];
    x[..3].copy_from_slice(&[1.0, 1.1, 1.2]);
    xx[..3].copy_from_slice(&[2.0, 2.21, 2.39]);
    let a = trending(200, &mut rng);
    let b = cointegrated_with(&a, 1.1, &mut rng);
    let u = universe(vec![("X", x), ("XX", xx), ("A", a), ("B", b)]);
    let slice = u.slice(u.first_date(), u.last_date()).unwrap();
    let ranked = vec![
        PairCandidate {
            pair: PairId::new("X", "XX"),
            distance: 0.0,
        },
        PairCandidate {
            pair: PairId::new("A", "B"),
            distance: 0.1,
        },
    ];
    let skip = SelectionConfig {
        slope_significance: None,
        ..Default::default()
    };

    let (kept, skip_report) = select_pairs(&slice, &ranked, 1, &skip);
    assert_eq!(kept.len(), 1);
    assert_eq!(skip_report.fit_failures, 1);

    let consume = SelectionConfig {
        failed_fit_policy: FailedFitPolicy::ConsumeSlot,
        ..skip
    };
    let (consumed, consumed_report) = select_pairs(&slice, &ranked, 1, &consume);
    assert!(consumed.is_empty());
    assert_eq!(consumed_report.slots_consumed, 1);
    assert_eq!(consumed_report.candidates_tested, 1);
}
