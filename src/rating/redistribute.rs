//! Step D: population-level redistribution of base ratings.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::{EliteFloors, RedistributionTuning};
use crate::rating::inverse_normal::InverseNormalCdf;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

impl DistributionSummary {
    /// `None` for an empty slice. Non-finite values are ignored.
    pub fn of(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            count: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            std: var.sqrt(),
            p10: quantile_sorted(&sorted, 0.10),
            p25: quantile_sorted(&sorted, 0.25),
            p50: quantile_sorted(&sorted, 0.50),
            p75: quantile_sorted(&sorted, 0.75),
            p90: quantile_sorted(&sorted, 0.90),
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Spread too small relative to the mean for a gaussian rescale.
    pub fn is_degenerate(&self, tuning: &RedistributionTuning) -> bool {
        let scale = self.mean.abs();
        self.count < 2
            || self.std <= tuning.min_relative_std * scale
            || self.range() <= tuning.min_relative_range * scale
    }
}

/// Linear interpolation between closest ranks.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Percentile of every value, `(rank - 0.5) / n`, ranking by `(value,
/// tiebreak)` and giving full ties their mid-rank.
pub fn percentile_ranks(values: &[f64], tiebreak: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    mid_ranks(values, tiebreak)
        .into_iter()
        .map(|rank| (rank - 0.5) / n)
        .collect()
}

/// `(rank - 1) / (n - 1)`: the lowest ranked value maps to 0 and the highest
/// to 1. A lone value sits at 0.5.
pub fn linear_ranks(values: &[f64], tiebreak: &[f64]) -> Vec<f64> {
    let n = values.len();
    mid_ranks(values, tiebreak)
        .into_iter()
        .map(|rank| {
            if n < 2 {
                0.5
            } else {
                (rank - 1.0) / (n - 1) as f64
            }
        })
        .collect()
}

/// 1-based ranks by `(value, tiebreak)`; full ties share their mean rank.
fn mid_ranks(values: &[f64], tiebreak: &[f64]) -> Vec<f64> {
    let n = values.len();
    let key = |i: usize| (values[i], tiebreak.get(i).copied().unwrap_or(0.0));
    let cmp = |a: usize, b: usize| {
        let (va, ta) = key(a);
        let (vb, tb) = key(b);
        va.total_cmp(&vb).then(ta.total_cmp(&tb))
    };
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| cmp(a, b));

    let mut out = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && cmp(order[start], order[end]) == Ordering::Equal {
            end += 1;
        }
        let mid_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            out[idx] = mid_rank;
        }
        start = end;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Strategy {
    Gaussian { spread: f64 },
    PercentileRank,
    Empty,
}

/// Fractional ratings in `[tuning.floor, tuning.ceiling]`, before elite floors
/// and rounding.
pub fn rescale(
    base: &[f64],
    tiebreak: &[f64],
    tuning: &RedistributionTuning,
    inverse: &dyn InverseNormalCdf,
) -> (Vec<f64>, Strategy) {
    let Some(summary) = DistributionSummary::of(base) else {
        return (Vec::new(), Strategy::Empty);
    };
    if summary.is_degenerate(tuning) {
        // Lowest rank lands on the floor, highest on the ceiling.
        let span = tuning.ceiling - tuning.floor;
        let ratings = linear_ranks(base, tiebreak)
            .iter()
            .map(|p| tuning.floor + span * p)
            .collect();
        return (ratings, Strategy::PercentileRank);
    }
    let pct = percentile_ranks(base, tiebreak);

    let z: Vec<f64> = pct.iter().map(|p| inverse.quantile(*p)).collect();
    let z_max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = tuning
        .spread_multipliers
        .iter()
        .map(|m| tuning.base_spread * m)
        .find(|s| tuning.target_mean + z_max * s >= tuning.target_ceiling)
        .or_else(|| {
            tuning
                .spread_multipliers
                .iter()
                .copied()
                .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))))
                .map(|m| tuning.base_spread * m)
        })
        .unwrap_or(tuning.base_spread);
    let ratings = z
        .iter()
        .map(|z| (tuning.target_mean + z * spread).clamp(tuning.floor, tuning.ceiling))
        .collect();
    (ratings, Strategy::Gaussian { spread })
}

/// Percentile by market value among the players with market coverage, the
/// same population the elite floors rank. Players without coverage carry a
/// placeholder value, so they sit at the median.
pub fn covered_percentiles(market_values: &[Option<f64>]) -> Vec<f64> {
    let covered: Vec<f64> = market_values.iter().flatten().copied().collect();
    let mut ranked = percentile_ranks(&covered, &[]).into_iter();
    market_values
        .iter()
        .map(|v| match v {
            Some(_) => ranked.next().unwrap_or(0.5),
            None => 0.5,
        })
        .collect()
}

/// Market-value floor for each player; `None` for players outside every band
/// or without market coverage.
///
/// A player is in the top `p` fraction when `1 + #(strictly higher values)`
/// is at most `ceil(p * n)` over the covered players, so the most valuable
/// player always takes the tightest band.
pub fn market_floors(market_values: &[Option<f64>], elite: &EliteFloors) -> Vec<Option<f64>> {
    let covered: Vec<f64> = market_values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let n = covered.len();
    let all_equal = covered
        .first()
        .is_none_or(|first| covered.iter().all(|v| v == first));
    if n == 0 || all_equal {
        return vec![None; market_values.len()];
    }
    let mut sorted_desc = covered;
    sorted_desc.sort_by(|a, b| b.total_cmp(a));

    market_values
        .iter()
        .map(|value| {
            let v = value.filter(|v| v.is_finite())?;
            let higher = sorted_desc.partition_point(|x| *x > v);
            let rank = higher + 1;
            elite
                .market
                .iter()
                .filter(|band| rank <= band_size(band.top_fraction, n))
                .map(|band| band.floor)
                .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a| a.max(f))))
        })
        .collect()
}

fn band_size(top_fraction: f64, n: usize) -> usize {
    // Guard against 0.07 * 100 landing just above 7.
    (top_fraction * n as f64 - 1e-9).ceil().max(0.0) as usize
}

pub fn external_floor(external_rating: Option<f64>, elite: &EliteFloors) -> Option<f64> {
    let rating = external_rating.filter(|r| r.is_finite())?;
    elite
        .external
        .iter()
        .filter(|band| rating >= band.min_rating)
        .map(|band| band.floor)
        .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a| a.max(f))))
}

/// Round half away from zero and clamp to the displayed range.
pub fn to_final(rating: f64, min: f64, max: f64) -> u8 {
    let r = if rating.is_finite() { rating } else { min };
    r.round().clamp(min, max) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::inverse_normal::RationalInverse;

    #[test]
    fn mid_ranks_for_ties() {
        let p = percentile_ranks(&[10.0, 20.0, 20.0, 30.0], &[0.0; 4]);
        assert_eq!(p, vec![0.125, 0.5, 0.5, 0.875]);
        let p = percentile_ranks(&[20.0, 20.0], &[1.0, 5.0]);
        assert_eq!(p, vec![0.25, 0.75]);
    }

    #[test]
    fn summary_percentiles() {
        let s = DistributionSummary::of(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.p50, 3.0);
        assert_eq!(s.p25, 2.0);
        assert!((s.p90 - 4.6).abs() < 1e-12);
        assert!(DistributionSummary::of(&[]).is_none());
    }

    #[test]
    fn spread_search_reaches_ceiling_for_large_populations() {
        let base: Vec<f64> = (0..500).map(|i| 60.0 + (i % 97) as f64 * 0.2).collect();
        let tuning = RedistributionTuning::default();
        let (ratings, strategy) = rescale(&base, &[], &tuning, &RationalInverse);
        let Strategy::Gaussian { spread } = strategy else {
            panic!("expected gaussian, got {strategy:?}");
        };
        assert!(spread >= tuning.base_spread);
        let max = ratings.iter().copied().fold(f64::MIN, f64::max);
        assert!(max >= tuning.target_ceiling);
        assert!(ratings.iter().all(|r| (50.0..=99.0).contains(r)));
    }

    #[test]
    fn flat_population_uses_percentile_rank() {
        let tuning = RedistributionTuning::default();
        let (ratings, strategy) = rescale(&[70.0; 4], &[1.0, 4.0, 2.0, 3.0], &tuning, &RationalInverse);
        assert_eq!(strategy, Strategy::PercentileRank);
        assert!(ratings[1] > ratings[3] && ratings[3] > ratings[2] && ratings[2] > ratings[0]);
        assert_eq!(ratings[0], tuning.floor);
        assert_eq!(ratings[1], tuning.ceiling);
    }

    #[test]
    fn uncovered_players_do_not_shift_market_percentiles() {
        let pct = covered_percentiles(&[Some(10.0), None, Some(30.0), None, Some(20.0)]);
        assert_eq!(pct, vec![0.5 / 3.0, 0.5, 2.5 / 3.0, 0.5, 1.5 / 3.0]);
    }

    #[test]
    fn linear_ranks_span_the_unit_interval() {
        assert_eq!(linear_ranks(&[3.0, 1.0, 2.0], &[]), vec![1.0, 0.0, 0.5]);
        assert_eq!(linear_ranks(&[7.0], &[]), vec![0.5]);
        assert_eq!(linear_ranks(&[5.0, 5.0], &[]), vec![0.5, 0.5]);
        assert!(linear_ranks(&[], &[]).is_empty());
    }

    #[test]
    fn market_floors_are_rank_based() {
        let values: Vec<Option<f64>> = (1..=100).map(|v| Some(v as f64)).chain([None]).collect();
        let floors = market_floors(&values, &EliteFloors::default());
        assert_eq!(floors[99], Some(92.0));
        assert_eq!(floors[98], Some(87.0));
        assert_eq!(floors[95], Some(87.0));
        assert_eq!(floors[94], Some(82.0));
        assert_eq!(floors[90], Some(82.0));
        assert_eq!(floors[89], None);
        assert_eq!(floors[100], None);
    }

    #[test]
    fn equal_market_values_get_no_floor() {
        let floors = market_floors(&[Some(5.0), Some(5.0), None], &EliteFloors::default());
        assert!(floors.iter().all(Option::is_none));
    }

    #[test]
    fn external_floor_bands() {
        let e = EliteFloors::default();
        assert_eq!(external_floor(Some(88.0), &e), Some(90.0));
        assert_eq!(external_floor(Some(82.0), &e), Some(85.0));
        assert_eq!(external_floor(Some(70.0), &e), None);
        assert_eq!(external_floor(None, &e), None);
    }
}
