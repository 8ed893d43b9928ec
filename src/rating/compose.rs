//! Steps B and C: weighted composite, rating bands, modifiers, and the
//! metric-free heuristic.

use crate::config::{BandTable, FallbackTuning, Modifiers, NormalizationScales};
use crate::error::ScoreError;
use crate::league::LeagueTier;
use crate::player::PlayerRecord;
use crate::profiles::ProfileWeights;
use crate::rating::normalize::normalize_metric;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composite {
    /// 0-100 weighted mean of sub-scores.
    pub score: f64,
    pub metrics_used: usize,
}

/// Weighted mean of `(sub_score, weight)` pairs; `None` when the total weight
/// is zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (sum, total) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(sum, total), (score, weight)| {
            (sum + score * weight, total + weight)
        });
    (total > 0.0).then(|| sum / total)
}

/// Accumulates every profile metric the player actually has. `Ok(None)` means
/// nothing overlapped and the caller should fall back.
pub fn composite(
    record: &PlayerRecord,
    profile: &ProfileWeights,
    scales: &NormalizationScales,
) -> Result<Option<Composite>, ScoreError> {
    let mut pairs = Vec::new();
    for (metric, weight) in profile.weights() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ScoreError::InvalidWeight {
                metric: metric.to_string(),
                weight,
            });
        }
        let Some(value) = record.metrics.get(metric).copied().flatten() else {
            continue;
        };
        pairs.push((normalize_metric(metric, value, scales)?, weight));
    }
    let metrics_used = pairs.len();
    match weighted_mean(pairs) {
        Some(score) if score.is_finite() => Ok(Some(Composite {
            score,
            metrics_used,
        })),
        Some(_) => Err(ScoreError::NonFiniteComposite),
        None => Ok(None),
    }
}

/// Piecewise-linear map from composite to base rating.
pub fn band_rating(composite: f64, table: &BandTable) -> f64 {
    let band = table
        .bands
        .iter()
        .find(|b| composite >= b.min_composite)
        .or_else(|| table.bands.last());
    let rating = match band {
        Some(b) => b.base + b.slope * (composite - b.min_composite),
        None => composite,
    };
    rating.clamp(table.min_rating, table.max_rating)
}

pub fn minutes_penalty(minutes: f64, modifiers: &Modifiers) -> f64 {
    let threshold = modifiers.minutes_threshold;
    if threshold <= 0.0 || minutes >= threshold {
        return 0.0;
    }
    let shortfall = (threshold - minutes.max(0.0)) / threshold;
    (modifiers.max_minutes_penalty * shortfall).min(modifiers.max_minutes_penalty)
}

/// League bonus and low-minutes penalty, re-clamped to the band range.
pub fn apply_modifiers(
    rating: f64,
    record: &PlayerRecord,
    modifiers: &Modifiers,
    table: &BandTable,
) -> f64 {
    let bonus = LeagueTier::classify(&record.league).scoring_bonus(modifiers);
    let penalty = minutes_penalty(record.minutes_played, modifiers);
    (rating + bonus - penalty).clamp(table.min_rating, table.max_rating)
}

/// Metric-free rating from market standing, external rating, league and age.
/// Always within `[fallback.min_rating, fallback.max_rating]`.
pub fn heuristic_rating(
    record: &PlayerRecord,
    market_percentile: f64,
    fallback: &FallbackTuning,
) -> f64 {
    let bucket = fallback
        .buckets
        .iter()
        .find(|b| market_percentile >= b.min_percentile)
        .map(|b| b.rating)
        .unwrap_or(fallback.below_buckets);

    let mut rating = match record.external_rating.filter(|r| r.is_finite()) {
        Some(external) => {
            let w = fallback.external_weight.clamp(0.0, 1.0);
            bucket * (1.0 - w) + external * w
        }
        None => bucket,
    };
    rating += LeagueTier::classify(&record.league).fallback_bonus(fallback);
    if (fallback.prime_age_min..=fallback.prime_age_max).contains(&record.age) {
        rating += fallback.prime_age_bonus;
    }
    if !rating.is_finite() {
        rating = fallback.below_buckets;
    }
    rating.clamp(fallback.min_rating, fallback.max_rating)
}
