//! Step A: raw metric value -> 0-100 sub-score.

use crate::aliases::is_per90;
use crate::config::NormalizationScales;
use crate::error::ScoreError;

/// How a metric's raw values are put on the 0-100 axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricScale {
    Percentage,
    Rate(RateFamily),
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateFamily {
    Goals,
    Assists,
    Shots,
    Passes,
    Tackles,
    Interceptions,
    Saves,
    Other,
}

impl MetricScale {
    pub fn of(metric: &str) -> Self {
        let lower = metric.to_ascii_lowercase();
        if lower.contains('%') || lower.contains("pct") {
            return MetricScale::Percentage;
        }
        if is_per90(&lower) {
            return MetricScale::Rate(RateFamily::of(&lower));
        }
        MetricScale::Generic
    }
}

impl RateFamily {
    fn of(lower: &str) -> Self {
        // Key and progressive passes are an order of magnitude rarer than
        // completed passes and use the catch-all denominator.
        if lower.contains("goal") || lower.starts_with("xg") || lower.starts_with("npxg") {
            RateFamily::Goals
        } else if lower.contains("assist") || lower.starts_with("xa") {
            RateFamily::Assists
        } else if lower.contains("shot") {
            RateFamily::Shots
        } else if lower.contains("pass") && !lower.contains("key") && !lower.contains("progressive") {
            RateFamily::Passes
        } else if lower.contains("tackle") {
            RateFamily::Tackles
        } else if lower.contains("intercept") {
            RateFamily::Interceptions
        } else if lower.contains("save") {
            RateFamily::Saves
        } else {
            RateFamily::Other
        }
    }

    fn denominator(self, scales: &NormalizationScales) -> f64 {
        match self {
            RateFamily::Goals => scales.goals,
            RateFamily::Assists => scales.assists,
            RateFamily::Shots => scales.shots,
            RateFamily::Passes => scales.passes,
            RateFamily::Tackles => scales.tackles,
            RateFamily::Interceptions => scales.interceptions,
            RateFamily::Saves => scales.saves,
            RateFamily::Other => scales.rate_other,
        }
    }
}

/// Sub-score in `[0, scales.cap]`. Negative raw values count as zero.
pub fn normalize_metric(
    metric: &str,
    value: f64,
    scales: &NormalizationScales,
) -> Result<f64, ScoreError> {
    if !value.is_finite() {
        return Err(ScoreError::NonFiniteMetric {
            metric: metric.to_string(),
            value,
        });
    }
    let v = value.max(0.0);
    let score = match MetricScale::of(metric) {
        MetricScale::Percentage => {
            // Fractions (0.87) and percentages (87.0) both occur in sources.
            let pct = if v <= 1.0 { v * 100.0 } else { v };
            pct * scales.percentage_factor
        }
        MetricScale::Rate(family) => ratio(v, family.denominator(scales)),
        MetricScale::Generic => ratio(v, scales.generic),
    };
    Ok(score.min(scales.cap))
}

fn ratio(value: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        value / denominator * 100.0
    } else {
        0.0
    }
}
