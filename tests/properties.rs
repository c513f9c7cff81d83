//! Property tests: every emitted record satisfies the detection rules

use chrono::{Duration, TimeZone, Utc};
use cuphandle::prelude::*;
use proptest::prelude::*;

struct Shape {
    lead: Vec<f64>,
    cup_len: usize,
    depth: f64,
    handle_len: usize,
    retrace: f64,
    tail: Vec<f64>,
    spread: f64,
}

/// Random walk, a noisy bowl with handle and breakout, then more walk
fn scenario() -> impl Strategy<Value = Vec<Bar>> {
    (
        prop::collection::vec(-1.0f64..1.0, 20..80),
        40usize..90,
        5.0f64..40.0,
        5usize..15,
        0.0f64..0.3,
        prop::collection::vec(-1.0f64..1.0, 10..60),
        0.2f64..1.5,
    )
        .prop_map(|(lead, cup_len, depth, handle_len, retrace, tail, spread)| {
            build(Shape {
                lead,
                cup_len,
                depth,
                handle_len,
                retrace,
                tail,
                spread,
            })
        })
}

fn build(shape: Shape) -> Vec<Bar> {
    let mut closes = Vec::new();
    let mut price = 100.0;
    for step in &shape.lead {
        price += step;
        closes.push(price);
    }

    let anchor = price;
    let mid = (shape.cup_len - 1) as f64 / 2.0;
    for x in 0..shape.cup_len {
        let u = (x as f64 - mid) / mid;
        closes.push(anchor - shape.depth + shape.depth * u * u);
    }
    for t in 1..=shape.handle_len {
        closes.push(anchor - shape.retrace * shape.depth * t as f64 / shape.handle_len as f64);
    }
    price = anchor - shape.retrace * shape.depth;
    for _ in 0..5 {
        price += shape.depth * 0.3;
        closes.push(price);
    }
    for step in &shape.tail {
        price += step;
        closes.push(price);
    }

    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| Bar {
            timestamp: start + Duration::minutes(i as i64),
            open: close,
            high: close + shape.spread,
            low: close - shape.spread,
            close,
            volume: 100.0,
        })
        .collect()
}

fn engine(dedup: DedupPolicy) -> CupHandleEngine {
    let config = DetectorConfig {
        max_cup_duration: Period::new(100).unwrap(),
        max_handle_duration: Period::new(20).unwrap(),
        dedup,
        ..DetectorConfig::default()
    };
    EngineBuilder::new().config(config).build().unwrap()
}

fn check_record(pattern: &Pattern, series: &CandleSeries, config: &DetectorConfig) {
    let cup = pattern.cup();
    let handle = pattern.handle();

    let span = cup.end_idx - cup.start_idx;
    assert!(span >= config.min_cup_duration.get());
    assert!(span <= config.max_cup_duration.get());
    assert!(cup.r_squared >= config.min_r2.get());
    assert!(rim_asymmetry(cup.left_rim_price, cup.right_rim_price) <= config.rim_tolerance.get());
    assert!(cup.depth >= config.cup_depth_min_factor * series.avg_candle_size());
    assert_eq!(cup.left_rim_price, series[cup.start_idx].high);
    assert_eq!(cup.right_rim_price, series[cup.end_idx].high);

    assert_eq!(handle.start_idx, cup.end_idx);
    assert!(handle.duration() >= config.min_handle_duration.get());
    assert!(handle.duration() <= config.max_handle_duration.get());
    assert!(handle.high <= cup.max_rim());
    assert!(handle.retrace_amount <= config.handle_retrace_max.get() * cup.depth);
    assert!(handle.low >= cup.cup_bottom_price);
    assert!(handle.end_idx + 1 < series.len());

    assert_eq!(pattern.start_time(), series[cup.start_idx].timestamp);
    match pattern.breakout() {
        Some(breakout) => {
            assert!(breakout.index > handle.end_idx);
            assert!(breakout.index <= handle.end_idx + config.breakout_window.get());
            assert!(breakout.price > handle.high + config.breakout_atr_multiplier * breakout.atr);
            assert_eq!(pattern.end_time(), series[breakout.index].timestamp);
        }
        None => {
            assert_eq!(pattern.reason(), Some(InvalidReason::NoBreakout));
            assert_eq!(pattern.end_time(), series[handle.end_idx].timestamp);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_records_satisfy_rules(bars in scenario()) {
        let engine = engine(DedupPolicy::CursorAdvance);
        let series = engine.prepare(&bars).unwrap();
        for pattern in engine.scan_series(&series) {
            check_record(&pattern, &series, engine.config());
        }
    }

    #[test]
    fn prop_valid_patterns_do_not_overlap(bars in scenario()) {
        let engine = engine(DedupPolicy::CursorAdvance);
        let window = engine.config().breakout_window.get();
        let patterns = engine.scan(&bars).unwrap();

        let valid: Vec<_> = patterns.iter().filter(|p| p.is_valid()).collect();
        for pair in valid.windows(2) {
            let cursor = pair[0].handle().end_idx + window + 1;
            prop_assert!(pair[1].cup().start_idx >= cursor);
        }
    }

    #[test]
    fn prop_scan_is_deterministic(bars in scenario()) {
        let engine = engine(DedupPolicy::CursorAdvance);
        prop_assert_eq!(engine.scan(&bars).unwrap(), engine.scan(&bars).unwrap());
    }

    #[test]
    fn prop_per_day_policy_reports_one_pattern(bars in scenario()) {
        // Every series spans a few hours of a single day
        let engine = engine(DedupPolicy::OnePerDay { skip_days: 1 });
        let series = engine.prepare(&bars).unwrap();
        let patterns = engine.scan_series(&series);

        prop_assert!(patterns.iter().filter(|p| p.is_valid()).count() <= 1);
        for pattern in &patterns {
            check_record(pattern, &series, engine.config());
        }
    }

    #[test]
    fn prop_fit_r_squared_is_bounded(y in prop::collection::vec(-100.0f64..100.0, 3..200)) {
        let fit = fit_parabola(&y);
        prop_assert!(fit.r_squared <= 1.0 + 1e-9);
        prop_assert!(fit.is_degenerate() || fit.r_squared >= -1e-9);
    }

    #[test]
    fn prop_fit_recovers_parabolas(
        a in 0.01f64..1.0,
        b in -10.0f64..10.0,
        c in -100.0f64..100.0,
        n in 10usize..300,
    ) {
        let y: Vec<f64> = (0..n).map(|x| {
            let x = x as f64;
            a * x * x + b * x + c
        }).collect();
        prop_assert!(fit_parabola(&y).r_squared >= 0.999);
    }
}
