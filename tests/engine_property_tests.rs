use chrono::{DateTime, Local, TimeZone};
use proptest::prelude::*;

use flux::core::smoothing::MovingAverage;
use flux::flux::curve::Curve;
use flux::flux::moments::Moments;
use flux::flux::weather::{self, MinMax, WeatherBucket};
use flux::flux::window::{ResolvedWindow, truncated_position};
use flux::flux::{FluxConfig, Signal, compute};

/// Valid curves: one to eight points with distinct, sorted x in [0, 1].
fn curve_strategy() -> impl Strategy<Value = Curve> {
    prop::collection::vec((0.0f64..=1.0, -500.0f64..500.0), 1..8).prop_map(|mut pairs| {
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);
        Curve::from_pairs(&pairs)
    })
}

/// Curves whose y never decreases.
fn monotone_curve_strategy() -> impl Strategy<Value = Curve> {
    prop::collection::vec((0.0f64..=1.0, 0.0f64..100.0), 1..8).prop_map(|mut pairs| {
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);
        let mut ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        ys.sort_by(f64::total_cmp);
        let sorted: Vec<(f64, f64)> = pairs.iter().map(|p| p.0).zip(ys).collect();
        Curve::from_pairs(&sorted)
    })
}

fn at_seconds(seconds: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 5, 14, seconds / 3600, (seconds / 60) % 60, seconds % 60)
        .single()
        .unwrap()
}

proptest! {
    #[test]
    fn test_curve_output_stays_within_control_points(curve in curve_strategy(), x in -2.0f64..3.0) {
        prop_assert!(curve.validate("generated").is_ok());

        let ys: Vec<f64> = curve.points().iter().map(|p| p.y).collect();
        let min = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let y = curve.evaluate(x);
        prop_assert!(y >= min - 1e-9 && y <= max + 1e-9, "{y} outside [{min}, {max}]");
    }

    #[test]
    fn test_curve_clamps_out_of_domain_inputs(curve in curve_strategy(), below in -10.0f64..0.0, above in 1.0f64..10.0) {
        prop_assert_eq!(curve.evaluate(below), curve.evaluate(0.0));
        prop_assert_eq!(curve.evaluate(above), curve.evaluate(1.0));
    }

    #[test]
    fn test_monotone_curve_is_monotone(curve in monotone_curve_strategy(), a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(curve.evaluate(lo) <= curve.evaluate(hi) + 1e-9);
    }

    #[test]
    fn test_position_is_floored_to_hundredths(span in 1i64..86_400, fraction in 0.0f64..=1.0) {
        let elapsed = (span as f64 * fraction) as i64;
        let x = truncated_position(elapsed, span);

        prop_assert!((0.0..=1.0).contains(&x));
        let hundredths = (x * 100.0).round();
        prop_assert!((x * 100.0 - hundredths).abs() < 1e-9);
        prop_assert_eq!(hundredths as i64, elapsed * 100 / span);
    }

    #[test]
    fn test_window_position_in_range(start in 0u32..86_400, length in 1u32..86_399, offset in 0u32..86_400) {
        let end = (start + length) % 86_400;
        prop_assume!(end != start);
        let window = ResolvedWindow { start: at_seconds(start), end: at_seconds(end) };

        let now = at_seconds((start + offset % (length + 1)) % 86_400);
        prop_assert!(window.contains(now));
        let x = window.position(now);
        prop_assert!((0.0..=1.0).contains(&x));
    }

    #[test]
    fn test_first_sample_warm_starts(depth in 1usize..200, value in -1000.0f64..1000.0) {
        let mut filter = MovingAverage::new(depth);
        prop_assert!((filter.sample(value) - value).abs() < 1e-9);
    }

    #[test]
    fn test_constant_stream_is_a_fixed_point(depth in 1usize..100, value in 0.0f64..=1.0, steps in 1usize..300) {
        let mut filter = MovingAverage::new(depth);
        for _ in 0..steps {
            prop_assert!((filter.sample(value) - value).abs() < 1e-9);
        }
    }

    #[test]
    fn test_smoothed_output_stays_within_sample_range(depth in 1usize..50, samples in prop::collection::vec(0.0f64..=1.0, 1..100)) {
        let mut filter = MovingAverage::new(depth);
        for value in samples {
            let mean = filter.sample(value);
            prop_assert!((-1e-9..=1.0 + 1e-9).contains(&mean));
        }
    }

    #[test]
    fn test_adjustment_keeps_unit_interval(value in 0.0f64..=1.0, pct in -1.0f64..=1.0) {
        let adjusted = weather::adjust(value, pct);
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&adjusted));
    }

    #[test]
    fn test_blend_keeps_unit_interval(ct in 0.0f64..=1.0, bri in 0.0f64..=1.0, clouds in 0.0f64..=1.0,
                                 ct_pct in -1.0f64..=1.0, bri_pct in -1.0f64..=1.0, dark: bool) {
        let bucket = WeatherBucket { clouds: MinMax { min: 0.0, max: 1.0 }, ct_pct, bri_pct };
        let blended = weather::blend(Signal::new(ct, bri), dark, clouds, &bucket);
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&blended.ct));
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&blended.bri));
    }

    #[test]
    fn test_pipeline_is_finite_for_any_clouds(clouds in prop::num::f64::ANY, seconds in 0u32..86_400) {
        let config = FluxConfig::from_json(r#"{
            "lighttime": [{"start": "day.begin", "end": "day.end", "darkness": "light",
                           "ct": [{"x": 0.0, "y": 0.1}, {"x": 1.0, "y": 0.9}],
                           "bri": [{"x": 0.0, "y": 0.3}, {"x": 1.0, "y": 0.6}]}],
            "weather": [{"clouds": {"min": 0.0, "max": 1.0}, "ct_pct": -0.4, "bri_pct": 0.2}]
        }"#).unwrap();
        let mut sun = Moments::new();
        sun.insert("day.begin", at_seconds(6 * 3600));
        sun.insert("day.end", at_seconds(20 * 3600));

        let computation = compute(&config, &sun, None, clouds, at_seconds(seconds));
        prop_assert!(computation.remapped.ct.is_finite());
        prop_assert!(computation.remapped.bri.is_finite());
        prop_assert!((0.0..=1.0).contains(&computation.clouds));
    }
}
