//! End-to-end tests of the ranking pipeline against a mock data port.

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use proptest::prelude::*;
use std::collections::HashMap;
use stockrank::domain::interval::{Interval, Period};
use stockrank::domain::recommendation::Level;
use stockrank::domain::scoring::{FactorStatus, ScoreFactor, ScoringModel};
use stockrank::domain::signal::{Position, SignalKind};
use stockrank::domain::snapshot::{IndicatorSnapshot, SnapshotField};
use stockrank::domain::strategy::{StrategyKind, StrategyProfile};
use stockrank::domain::universe::{ExclusionReason, RankConfig, Ranker, RankingReport};
use stockrank::ports::data_port::SymbolInfo;

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn rank(config: RankConfig, data: &MockDataPort, list: &[&str]) -> RankingReport {
    Ranker::new(config)
        .rank(data, &symbols(list), &HashMap::new())
        .unwrap()
}

fn sum_of_factors(report: &RankingReport, index: usize) -> f64 {
    report.ranked[index]
        .breakdown
        .factors()
        .iter()
        .map(|f| f.weighted)
        .sum()
}

#[test]
fn uptrend_scenario_is_buy() {
    let data = MockDataPort::new()
        .with_bars("UP", uptrend_bars())
        .with_info("UP", large_cap());
    let config = RankConfig {
        workers: 2,
        ..RankConfig::default()
    };

    let report = rank(config, &data, &["UP"]);

    assert_eq!(report.evaluated, 1);
    assert_eq!(report.qualified, 1, "excluded: {:?}", report.excluded);
    let up = &report.ranked[0];
    let snap = &up.snapshot;
    assert!(snap.is_complete());
    assert!(snap.close > snap.sma20.unwrap());
    assert!(snap.close > snap.sma50.unwrap());
    assert!(snap.close > snap.sma200.unwrap());
    assert!(snap.volume_ratio.unwrap() > 1.2);
    let rsi = snap.rsi.unwrap();
    assert!((45.0..=60.0).contains(&rsi), "rsi {rsi}");

    assert!(up.score() > 70.0, "score {}", up.score());
    assert_abs_diff_eq!(sum_of_factors(&report, 0), up.score(), epsilon = 1e-9);

    assert_eq!(up.signal.kind, SignalKind::Buy);
    assert!(up.signal.confirmations >= 2);
    // buy gate plus each confirmation
    assert!(up.signal.reasons.len() >= 3, "{:?}", up.signal.reasons);
    assert!(up.signal.reasons[0].starts_with("Score above buy threshold"));

    let rec = &up.recommendation;
    assert!(rec.entry_price > 0.0);
    assert!(rec.range.low <= rec.entry_price && rec.entry_price <= rec.range.high);
    assert_eq!(rec.risk, Level::Medium);
    assert!(!rec.rationale.contains("partial"));
}

#[test]
fn thirty_bars_score_with_computable_factors_only() {
    let bars = make_bars(&zigzag(30, 50.0), &flat_volume(30));
    let series = PriceSeries::new("NEW", bars).unwrap();
    let snap = IndicatorSnapshot::from_series(&series).unwrap();

    assert_eq!(snap.sma50, None);
    assert_eq!(snap.sma200, None);
    assert_eq!(snap.macd_line, None);
    assert!(snap.sma20.is_some());
    assert!(snap.rsi.is_some());

    let breakdown = ScoringModel::default().score(&snap);
    let composite = breakdown.composite();
    assert!((0.0..=100.0).contains(&composite));
    let sum: f64 = breakdown.factors().iter().map(|f| f.weighted).sum();
    assert_abs_diff_eq!(sum, composite, epsilon = 1e-9);

    let trend = breakdown.factor(ScoreFactor::MovingAverageTrend).unwrap();
    assert_eq!(trend.status, FactorStatus::Partial);
    assert!(trend.raw <= 8.0);
    let macd = breakdown.factor(ScoreFactor::Macd).unwrap();
    assert_eq!(macd.status, FactorStatus::Undefined);
    assert_eq!(macd.raw, 0.0);
    assert_eq!(
        breakdown.factor(ScoreFactor::Rsi).unwrap().status,
        FactorStatus::Complete
    );

    assert!(breakdown.is_partial());
    let undefined: Vec<SnapshotField> = breakdown.warnings().iter().map(|w| w.field).collect();
    assert!(undefined.contains(&SnapshotField::Sma50));
    assert!(undefined.contains(&SnapshotField::Sma200));
}

#[test]
fn thirty_bars_excluded_under_adaptive_minimum() {
    let data = MockDataPort::new().with_bars("NEW", make_bars(&zigzag(30, 50.0), &flat_volume(30)));

    let report = rank(open_config(), &data, &["NEW"]);
    assert!(report.ranked.is_empty());
    assert_eq!(report.qualified, 0);
    assert_eq!(
        report.excluded[0].reason,
        ExclusionReason::DataInsufficient {
            bars: 30,
            minimum: 200
        }
    );

    let relaxed = RankConfig {
        min_data_points: Some(30),
        ..open_config()
    };
    let report = rank(relaxed, &data, &["NEW"]);
    assert_eq!(report.qualified, 1);
    let entry = &report.ranked[0];
    assert!(entry.breakdown.is_partial());
    assert_eq!(entry.recommendation.confidence, Level::Low);
    assert!(entry.recommendation.rationale.ends_with("partial indicator data"));
}

#[test]
fn intraday_minimum_is_relaxed() {
    let data = MockDataPort::new()
        .with_bars("LONG", make_bars(&zigzag(120, 50.0), &flat_volume(120)))
        .with_bars("SHORT", make_bars(&zigzag(100, 50.0), &flat_volume(100)));
    let config = RankConfig {
        interval: Interval::Minutes(60),
        period: Period::Months(1),
        ..open_config()
    };
    assert_eq!(config.minimum_bars(), 109);

    let report = rank(config, &data, &["LONG", "SHORT"]);
    assert_eq!(report.ranked.len(), 1);
    assert_eq!(report.ranked[0].symbol, "LONG");
    assert_eq!(
        report.excluded[0].reason,
        ExclusionReason::DataInsufficient {
            bars: 100,
            minimum: 109
        }
    );
}

#[test]
fn thirty_daily_bars_rank_over_one_month() {
    let data = MockDataPort::new().with_bars("NEW", make_bars(&zigzag(30, 50.0), &flat_volume(30)));
    let config = RankConfig {
        period: Period::Months(1),
        ..open_config()
    };
    assert_eq!(config.minimum_bars(), 20);

    let report = rank(config, &data, &["NEW"]);
    assert_eq!(report.qualified, 1, "excluded: {:?}", report.excluded);
    let entry = &report.ranked[0];
    assert_eq!(entry.snapshot.sma50, None);
    assert_eq!(entry.snapshot.sma200, None);
    assert!(entry.breakdown.is_partial());
    assert!((0.0..=100.0).contains(&entry.score()));
    assert_eq!(
        entry.breakdown.factor(ScoreFactor::Macd).unwrap().status,
        FactorStatus::Undefined
    );
}

#[test]
fn twelve_monthly_bars_rank_over_one_year() {
    let data = MockDataPort::new()
        .with_bars("MTH", make_bars(&zigzag(12, 50.0), &flat_volume(12)))
        .with_bars("GAP", make_bars(&zigzag(9, 50.0), &flat_volume(9)));
    let config = RankConfig {
        interval: Interval::Monthly,
        period: Period::Years(1),
        ..open_config()
    };
    assert_eq!(config.minimum_bars(), 12);

    let report = rank(config, &data, &["MTH", "GAP"]);
    assert_eq!(report.qualified, 1, "excluded: {:?}", report.excluded);
    let entry = &report.ranked[0];
    assert_eq!(entry.symbol, "MTH");
    assert_eq!(entry.snapshot.rsi, None);
    assert!(entry.breakdown.is_partial());
    assert_eq!(entry.recommendation.confidence, Level::Low);
    assert!(entry.recommendation.entry_price > 0.0);
    assert_eq!(
        report.excluded[0].reason,
        ExclusionReason::DataInsufficient {
            bars: 9,
            minimum: 12
        }
    );
}

#[test]
fn year_to_date_minimum_follows_latest_bar() {
    // 2023-01-02 .. 2023-01-11 spans 8 weekdays
    let data = MockDataPort::new().with_bars("JAN", make_bars(&zigzag(10, 50.0), &flat_volume(10)));
    let config = RankConfig {
        period: Period::YearToDate,
        ..open_config()
    };
    assert_eq!(config.minimum_bars(), 100);

    let series = PriceSeries::new("JAN", make_bars(&zigzag(10, 50.0), &flat_volume(10))).unwrap();
    assert_eq!(config.minimum_bars_for(&series), 8);

    let report = rank(config, &data, &["JAN"]);
    assert_eq!(report.qualified, 1, "excluded: {:?}", report.excluded);
}

#[test]
fn failed_fetch_excludes_only_that_symbol() {
    let data = MockDataPort::new()
        .with_bars("GOOD", uptrend_bars())
        .with_error("DOWN", "connection reset");

    let report = rank(open_config(), &data, &["GOOD", "DOWN", "GONE"]);

    assert_eq!(report.evaluated, 3);
    assert_eq!(report.qualified, 1);
    assert_eq!(report.ranked[0].symbol, "GOOD");
    assert_eq!(report.excluded.len(), 2);
    for exclusion in &report.excluded {
        assert!(
            matches!(exclusion.reason, ExclusionReason::DataUnavailable(_)),
            "{exclusion:?}"
        );
    }
    let down = report.excluded.iter().find(|e| e.symbol == "DOWN").unwrap();
    assert!(down.reason.to_string().contains("connection reset"));
}

#[test]
fn invalid_series_is_excluded_not_fatal() {
    let mut bars = uptrend_bars();
    bars[100].timestamp = bars[99].timestamp;
    let data = MockDataPort::new()
        .with_bars("DUP", bars)
        .with_bars("OK", uptrend_bars());

    let report = rank(open_config(), &data, &["DUP", "OK"]);
    assert_eq!(report.qualified, 1);
    assert_eq!(report.excluded[0].symbol, "DUP");
}

#[test]
fn sorted_by_score_then_symbol() {
    let data = MockDataPort::new()
        .with_bars("BBB", uptrend_bars())
        .with_bars("AAA", uptrend_bars())
        .with_bars("CCC", downtrend_bars(220));

    let report = rank(open_config(), &data, &["CCC", "BBB", "AAA"]);

    let order: Vec<&str> = report.ranked.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(order, vec!["AAA", "BBB", "CCC"]);
    assert!(report.ranked[1].score() > report.ranked[2].score());
    assert_eq!(report.ranked[2].signal.kind, SignalKind::Hold);
}

#[test]
fn top_n_keeps_qualified_count() {
    let data = MockDataPort::new()
        .with_bars("AAA", uptrend_bars())
        .with_bars("BBB", uptrend_bars())
        .with_bars("CCC", downtrend_bars(220));
    let config = RankConfig {
        top: Some(1),
        ..open_config()
    };

    let report = rank(config, &data, &["AAA", "BBB", "CCC"]);
    assert_eq!(report.ranked.len(), 1);
    assert_eq!(report.qualified, 3);
}

#[test]
fn ranking_is_deterministic_across_worker_counts() {
    let data = MockDataPort::new()
        .with_bars("AAA", uptrend_bars())
        .with_bars("BBB", downtrend_bars(230))
        .with_bars("CCC", make_bars(&zigzag(240, 20.0), &flat_volume(240)));
    let list = ["AAA", "BBB", "CCC"];

    let one = rank(RankConfig { workers: 1, ..open_config() }, &data, &list);
    let many = rank(RankConfig { workers: 8, ..open_config() }, &data, &list);

    assert_eq!(one.ranked.len(), many.ranked.len());
    for (a, b) in one.ranked.iter().zip(&many.ranked) {
        assert_eq!(a.symbol, b.symbol);
        assert_eq!(a.score(), b.score());
        assert_eq!(a.signal, b.signal);
        assert_eq!(a.recommendation, b.recommendation);
    }
}

#[test]
fn entry_follows_strategy_multiplier() {
    let series = PriceSeries::new("UP", uptrend_bars()).unwrap();
    let mut kinds = StrategyKind::ALL.to_vec();
    kinds.sort_by(|a, b| {
        StrategyProfile::preset(*a)
            .entry_multiplier
            .total_cmp(&StrategyProfile::preset(*b).entry_multiplier)
    });

    let entries: Vec<f64> = kinds
        .iter()
        .map(|kind| {
            let mut config = open_config();
            config.profile.entry_multiplier = StrategyProfile::preset(*kind).entry_multiplier;
            Ranker::new(config)
                .evaluate(&series, &SymbolInfo::default(), None)
                .unwrap()
                .recommendation
                .entry_price
        })
        .collect();

    for pair in entries.windows(2) {
        assert!(pair[0] <= pair[1], "{entries:?}");
    }
    assert!(entries[0] < entries[entries.len() - 1]);
}

#[test]
fn held_position_can_sell() {
    let data = MockDataPort::new().with_bars("UP", uptrend_bars());
    let close = uptrend_bars().last().unwrap().close;
    let positions = HashMap::from([(
        "UP".to_string(),
        Position {
            entry_price: close * 1.2,
        },
    )]);

    let report = Ranker::new(open_config())
        .rank(&data, &symbols(&["UP"]), &positions)
        .unwrap();

    let signal = &report.ranked[0].signal;
    assert_eq!(signal.kind, SignalKind::Sell);
    assert!(signal.reasons[0].starts_with("Stop loss"), "{:?}", signal.reasons);
}

#[test]
fn position_size_from_portfolio_value() {
    let data = MockDataPort::new().with_bars("UP", uptrend_bars());
    let config = RankConfig {
        portfolio_value: Some(100_000.0),
        ..open_config()
    };

    let report = rank(config, &data, &["UP"]);
    let entry = &report.ranked[0];
    let pct = 0.02 + (0.10 - 0.02) * (entry.score() / 100.0);
    let expected = (100_000.0 * pct / entry.snapshot.close).floor() as u64;
    assert_eq!(entry.recommendation.shares, Some(expected));
}

#[test]
fn small_cap_raises_risk() {
    let series = PriceSeries::new("UP", uptrend_bars()).unwrap();
    let ranker = Ranker::new(open_config());
    let small = SymbolInfo {
        market_cap: Some(2_000_000_000.0),
        ..SymbolInfo::default()
    };

    let base = ranker.evaluate(&series, &large_cap(), None).unwrap();
    let raised = ranker.evaluate(&series, &small, None).unwrap();
    assert_eq!(base.recommendation.risk, Level::Medium);
    assert_eq!(raised.recommendation.risk, Level::High);
}

fn walk(returns: &[f64]) -> Vec<f64> {
    let mut price = 100.0;
    returns
        .iter()
        .map(|r| {
            price *= 1.0 + r;
            price
        })
        .collect()
}

proptest! {
    #[test]
    fn pipeline_invariants_hold_for_random_walks(
        bars in prop::collection::vec((-0.05f64..0.05, 1i64..5_000_000), 40..260)
    ) {
        let (returns, volumes): (Vec<f64>, Vec<i64>) = bars.into_iter().unzip();
        let series = PriceSeries::new("RND", make_bars(&walk(&returns), &volumes)).unwrap();
        let config = RankConfig {
            min_data_points: Some(35),
            ..open_config()
        };

        let result = Ranker::new(config).evaluate(&series, &SymbolInfo::default(), None);
        prop_assert!(result.is_ok(), "{:?}", result.err());
        let ranked = result.unwrap();

        let score = ranked.score();
        prop_assert!((0.0..=100.0).contains(&score));
        let sum: f64 = ranked.breakdown.factors().iter().map(|f| f.weighted).sum();
        prop_assert!((sum - score).abs() < 1e-9);
        for factor in ranked.breakdown.factors() {
            prop_assert!(factor.raw >= 0.0 && factor.raw <= factor.max);
        }

        let rec = &ranked.recommendation;
        prop_assert!(rec.entry_price > 0.0);
        prop_assert!(rec.range.low <= rec.entry_price && rec.entry_price <= rec.range.high);
        if let Some(rsi) = ranked.snapshot.rsi {
            prop_assert!((0.0..=100.0).contains(&rsi));
        }
    }
}
