//! Per-symbol feature computation
//!
//! Windows are recomputed from scratch at every bar rather than maintained as
//! running sums, so values never drift with series length.

use super::{FeatureRow, FeatureSpec};
use crate::feed::BarSeries;
use chrono::{DateTime, Utc};

/// Computes [`FeatureRow`]s from one symbol's bars
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    spec: FeatureSpec,
    liquidity_window: usize,
}

impl FeatureEngine {
    pub fn new(spec: FeatureSpec, liquidity_window: usize) -> Self {
        Self {
            spec,
            liquidity_window: liquidity_window.max(1),
        }
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    /// Bars of history needed before every feature is present
    pub fn min_history(&self) -> usize {
        self.spec.min_history(self.liquidity_window)
    }

    /// One row per bar, in bar order. Only this symbol's bars are read.
    pub fn build(&self, series: &BarSeries) -> Vec<FeatureRow> {
        let bars = &series.bars;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let dollar_volume: Vec<f64> = bars.iter().map(|b| b.close * b.volume).collect();

        let returns = simple_returns(&closes);
        let ema = ema_unadjusted(&closes, self.spec.ema_alpha());

        bars.iter()
            .enumerate()
            .map(|(i, bar)| FeatureRow {
                symbol: series.symbol.clone(),
                bar_time: bar.open_time,
                close: bar.close,
                ret_1: returns[i],
                ema12: ema[i],
                rv_24: trailing_window(&returns, i, self.spec.vol_window).and_then(sample_std),
                adv: trailing_window_dense(&dollar_volume, i, self.liquidity_window).map(mean),
            })
            .collect()
    }

    /// Row for the bar opening exactly at `bar_time`, if the series has one.
    ///
    /// Model features are computed from exactly `history_bars` bars ending at
    /// `bar_time`; with fewer available, `ema12` stays missing. The liquidity
    /// proxy reads its own window from the full series.
    pub fn row_at(&self, series: &BarSeries, bar_time: DateTime<Utc>) -> Option<FeatureRow> {
        let end = series.bars.iter().rposition(|b| b.open_time == bar_time)?;
        let bars = &series.bars[..=end];
        let history = self.spec.history_bars;

        let window = BarSeries {
            symbol: series.symbol.clone(),
            bars: bars[bars.len().saturating_sub(history)..].to_vec(),
        };
        let mut row = self.build(&window).pop()?;
        if window.len() < history {
            row.ema12 = None;
        }

        let dollar_volume: Vec<f64> = bars.iter().map(|b| b.close * b.volume).collect();
        row.adv = trailing_window_dense(&dollar_volume, end, self.liquidity_window).map(mean);
        Some(row)
    }
}

/// `close[i] / close[i-1] - 1`; missing on the first bar or a non-finite result
fn simple_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let r = if i == 0 {
            None
        } else {
            let r = closes[i] / closes[i - 1] - 1.0;
            r.is_finite().then_some(r)
        };
        out.push(r);
    }
    out
}

/// Recursive EMA seeded with the first value
fn ema_unadjusted(values: &[f64], alpha: f64) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        prev = Some(next);
        out.push(next.is_finite().then_some(next));
    }
    out
}

/// The `window` values ending at `end`, only if all are present
fn trailing_window(values: &[Option<f64>], end: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || end + 1 < window {
        return None;
    }
    values[end + 1 - window..=end].iter().copied().collect()
}

fn trailing_window_dense(values: &[f64], end: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || end + 1 < window {
        return None;
    }
    let slice = &values[end + 1 - window..=end];
    slice.iter().all(|v| v.is_finite()).then(|| slice.to_vec())
}

fn mean(values: Vec<f64>) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
fn sample_std(values: Vec<f64>) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use crate::feed::Bar;
    use chrono::{Duration, TimeZone};

    fn series(symbol: &str, closes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        BarSeries {
            symbol: symbol.to_string(),
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    symbol: symbol.to_string(),
                    open_time: start + Duration::hours(4 * i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 10.0,
                })
                .collect(),
        }
    }

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + if i % 2 == 0 { 0.0 } else { 1.0 } + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn test_returns() {
        let r = simple_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r[0], None);
        assert!((r[1].unwrap() - 0.10).abs() < 1e-12);
        assert!((r[2].unwrap() + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_return_after_zero_close_is_missing() {
        let r = simple_returns(&[0.0, 1.0]);
        assert_eq!(r[1], None);
    }

    #[test]
    fn test_ema_unadjusted() {
        let alpha = 0.5;
        let e = ema_unadjusted(&[10.0, 20.0, 30.0], alpha);
        assert_eq!(e, vec![Some(10.0), Some(15.0), Some(22.5)]);
    }

    #[test]
    fn test_sample_std() {
        let s = sample_std(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        // var = 5/3
        assert!((s - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_rv_missing_until_window_full() {
        let engine = FeatureEngine::new(FeatureSpec::V1, 30);
        let rows = engine.build(&series("A", &zigzag(40)));

        // Returns start at index 1, so 24 returns are first available at index 24
        assert!(rows[23].rv_24.is_none());
        assert!(rows[24].rv_24.is_some());
        assert!(rows[28].adv.is_none());
        assert!(rows[29].adv.is_some());
    }

    #[test]
    fn test_valid_iff_required_features_present() {
        let engine = FeatureEngine::new(FeatureSpec::V1, 30);
        let rows = engine.build(&series("A", &zigzag(40)));
        for row in &rows {
            let all_present = FeatureSpec::V1
                .inference_features
                .iter()
                .all(|f| row.get(*f).is_some());
            assert_eq!(FeatureSpec::V1.is_valid(row), all_present);
        }
        assert!(!FeatureSpec::V1.is_valid(&rows[10]));
        assert!(FeatureSpec::V1.is_valid(&rows[39]));
    }

    #[test]
    fn test_adv_is_rolling_dollar_volume() {
        let engine = FeatureEngine::new(FeatureSpec::V1, 3);
        let rows = engine.build(&series("A", &[1.0, 2.0, 3.0, 4.0]));
        // volume 10 → dollar volumes 10, 20, 30, 40
        assert_eq!(rows[1].adv, None);
        assert_eq!(rows[2].adv, Some(20.0));
        assert_eq!(rows[3].adv, Some(30.0));
    }

    #[test]
    fn test_deterministic_across_calls() {
        let engine = FeatureEngine::new(FeatureSpec::V1, 30);
        let s = series("A", &zigzag(60));
        let a = engine.build(&s);
        let b = engine.build(&s);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.rv_24.map(f64::to_bits), y.rv_24.map(f64::to_bits));
            assert_eq!(x.ema12.map(f64::to_bits), y.ema12.map(f64::to_bits));
        }
    }

    #[test]
    fn test_history_prefix_does_not_change_past_rows() {
        // Appending future bars must not alter features of earlier bars
        let engine = FeatureEngine::new(FeatureSpec::V1, 30);
        let closes = zigzag(60);
        let short = engine.build(&series("A", &closes[..45]));
        let long = engine.build(&series("A", &closes));
        for i in 0..45 {
            assert_eq!(short[i].get(Feature::Rv24), long[i].get(Feature::Rv24));
            assert_eq!(short[i].get(Feature::Ema12), long[i].get(Feature::Ema12));
        }
    }

    #[test]
    fn test_row_at_ignores_history_beyond_window() {
        let engine = FeatureEngine::new(FeatureSpec::V1, 30);
        let deep = series("A", &zigzag(120));
        let t = deep.bars[119].open_time;
        let shallow = BarSeries {
            symbol: "A".to_string(),
            bars: deep.bars[79..].to_vec(),
        };
        let a = engine.row_at(&deep, t).unwrap();
        let b = engine.row_at(&shallow, t).unwrap();
        assert_eq!(a.ema12.map(f64::to_bits), b.ema12.map(f64::to_bits));
        assert_eq!(a.rv_24.map(f64::to_bits), b.rv_24.map(f64::to_bits));
        assert_eq!(a.adv, b.adv);
        assert!(FeatureSpec::V1.is_valid(&a));
    }

    #[test]
    fn test_row_at_without_full_warmup_is_invalid() {
        let engine = FeatureEngine::new(FeatureSpec::V1, 30);
        let s = series("A", &zigzag(39));
        let row = engine.row_at(&s, s.bars[38].open_time).unwrap();
        assert!(row.rv_24.is_some());
        assert!(row.ema12.is_none());
        assert!(!FeatureSpec::V1.is_valid(&row));
    }

    #[test]
    fn test_row_at() {
        let engine = FeatureEngine::new(FeatureSpec::V1, 30);
        let s = series("A", &zigzag(5));
        let t = s.bars[3].open_time;
        assert_eq!(engine.row_at(&s, t).unwrap().bar_time, t);
        assert!(engine.row_at(&s, t + Duration::minutes(1)).is_none());
    }
}
