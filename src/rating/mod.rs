//! Profile-weighted scoring engine.
//!
//! Per player: normalize metrics, compose them through the profile weights,
//! map the composite through the rating bands and apply modifiers. Then, as a
//! single barrier over the whole population, redistribute base ratings onto a
//! target gaussian and apply the elite floors.

pub mod compose;
pub mod inverse_normal;
pub mod normalize;
pub mod redistribute;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{RatingConfig, Tuning};
use crate::error::ScoreError;
use crate::player::{PlayerRecord, RatingState, ScoreMethod};
use crate::profiles::ProfileCatalog;
use compose::{apply_modifiers, band_rating, composite, heuristic_rating};
use inverse_normal::{InverseNormalCdf, InverseNormalKind};
use redistribute::{
    DistributionSummary, Strategy, covered_percentiles, external_floor, market_floors, rescale,
    to_final,
};

pub const FINAL_MIN: f64 = 40.0;
pub const FINAL_MAX: f64 = 99.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BaseScore {
    pub rating: f64,
    pub method: ScoreMethod,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoringReport {
    pub profile_scored: usize,
    pub heuristic_scored: usize,
    pub neutral: usize,
    /// `(player name, cause)` for every player that got the neutral default.
    #[serde(skip)]
    pub failures: Vec<(String, ScoreError)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedistributionReport {
    pub before: Option<DistributionSummary>,
    pub after: Option<DistributionSummary>,
    pub strategy: Strategy,
    pub inverse_normal: &'static str,
    pub market_floors_applied: usize,
    pub external_floors_applied: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingReport {
    pub scoring: ScoringReport,
    pub redistribution: RedistributionReport,
}

pub struct RatingEngine {
    catalog: ProfileCatalog,
    tuning: Tuning,
    inverse: Box<dyn InverseNormalCdf>,
    parallel: bool,
}

impl RatingEngine {
    pub fn new(catalog: ProfileCatalog, tuning: Tuning, inverse: InverseNormalKind) -> Self {
        Self {
            catalog,
            tuning,
            inverse: inverse.select(),
            parallel: true,
        }
    }

    pub fn from_config(cfg: &RatingConfig, catalog: ProfileCatalog) -> Self {
        Self::new(catalog, cfg.tuning.clone(), cfg.inverse_normal).with_parallel(cfg.parallel)
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    /// Steps A-C for one player. `market_percentile` is the player's standing
    /// in the population by market value and only feeds the heuristic.
    pub fn score_player(
        &self,
        record: &PlayerRecord,
        market_percentile: f64,
    ) -> Result<BaseScore, ScoreError> {
        let t = &self.tuning;
        let profile = self
            .catalog
            .lookup(record.position, record.profile.as_deref());
        if let Some(profile) = profile
            && let Some(c) = composite(record, profile, &t.normalization)?
        {
            let banded = band_rating(c.score, &t.bands);
            let rating = apply_modifiers(banded, record, &t.modifiers, &t.bands);
            return Ok(BaseScore {
                rating,
                method: ScoreMethod::Profile {
                    composite: c.score,
                    metrics_used: c.metrics_used,
                },
            });
        }
        let heuristic = heuristic_rating(record, market_percentile, &t.fallback);
        Ok(BaseScore {
            rating: heuristic.clamp(t.bands.min_rating, t.bands.max_rating),
            method: ScoreMethod::Heuristic,
        })
    }

    /// Assigns a base rating to every player. A scoring failure gives that
    /// player the neutral default and never aborts the batch.
    pub fn score_population(&self, players: &mut [PlayerRecord]) -> ScoringReport {
        let percentiles = covered_percentiles(&market_coverage(players));
        let neutral = self
            .tuning
            .neutral_rating
            .clamp(self.tuning.bands.min_rating, self.tuning.bands.max_rating);

        let score_one = |(player, pct): (&mut PlayerRecord, &f64)| -> Option<(String, ScoreError)> {
            match self.score_player(player, *pct) {
                Ok(score) => {
                    player.set_base_rating(score.rating, score.method);
                    None
                }
                Err(err) => {
                    player.set_base_rating(
                        neutral,
                        ScoreMethod::Neutral {
                            reason: err.to_string(),
                        },
                    );
                    Some((player.name.clone(), err))
                }
            }
        };
        let failures: Vec<(String, ScoreError)> = if self.parallel {
            players
                .par_iter_mut()
                .zip(percentiles.par_iter())
                .filter_map(score_one)
                .collect()
        } else {
            players
                .iter_mut()
                .zip(percentiles.iter())
                .filter_map(score_one)
                .collect()
        };

        for (name, err) in &failures {
            warn!(player = %name, %err, neutral, "scoring failed, neutral rating assigned");
        }
        let mut report = ScoringReport {
            failures,
            ..ScoringReport::default()
        };
        for p in players.iter() {
            match p.score_method {
                Some(ScoreMethod::Profile { .. }) => report.profile_scored += 1,
                Some(ScoreMethod::Heuristic) => report.heuristic_scored += 1,
                Some(ScoreMethod::Neutral { .. }) | None => report.neutral += 1,
            }
        }
        debug!(
            profile = report.profile_scored,
            heuristic = report.heuristic_scored,
            neutral = report.neutral,
            "base ratings assigned"
        );
        report
    }

    /// Step D. Must run after every player is base-scored; players without a
    /// base rating are treated as neutral.
    pub fn redistribute(&self, players: &mut [PlayerRecord]) -> RedistributionReport {
        let t = &self.tuning;
        let base: Vec<f64> = players
            .iter()
            .map(|p| {
                p.base_rating
                    .filter(|r| r.is_finite())
                    .unwrap_or(t.neutral_rating)
            })
            .collect();
        let market: Vec<f64> = players.iter().map(|p| p.market_value).collect();
        let before = DistributionSummary::of(&base);

        let (rescaled, strategy) = rescale(&base, &market, &t.redistribution, self.inverse.as_ref());
        if strategy == Strategy::PercentileRank {
            info!(
                players = players.len(),
                "base ratings are degenerate, using percentile-rank fallback"
            );
        }

        let market_floor = market_floors(&market_coverage(players), &t.elite);

        let mut market_applied = 0;
        let mut external_applied = 0;
        let mut finals = Vec::with_capacity(players.len());
        for (i, player) in players.iter_mut().enumerate() {
            let mut rating = rescaled.get(i).copied().unwrap_or(t.neutral_rating);
            if let Some(floor) = market_floor[i]
                && floor > rating
            {
                rating = floor;
                market_applied += 1;
            }
            if let Some(floor) = external_floor(player.external_rating, &t.elite)
                && floor > rating
            {
                rating = floor;
                external_applied += 1;
            }
            let final_rating = to_final(rating, FINAL_MIN, FINAL_MAX);
            player.set_final_rating(final_rating);
            finals.push(f64::from(final_rating));
        }

        RedistributionReport {
            before,
            after: DistributionSummary::of(&finals),
            strategy,
            inverse_normal: self.inverse.name(),
            market_floors_applied: market_applied,
            external_floors_applied: external_applied,
        }
    }

    /// Base scoring followed by redistribution.
    pub fn rate(&self, players: &mut [PlayerRecord]) -> RatingReport {
        let scoring = self.score_population(players);
        debug_assert!(
            players
                .iter()
                .all(|p| p.rating_state == RatingState::BaseScored)
        );
        let redistribution = self.redistribute(players);
        info!(
            players = players.len(),
            profile = scoring.profile_scored,
            heuristic = scoring.heuristic_scored,
            neutral = scoring.neutral,
            market_floors = redistribution.market_floors_applied,
            external_floors = redistribution.external_floors_applied,
            "ratings computed"
        );
        RatingReport {
            scoring,
            redistribution,
        }
    }
}

/// Market value for players the market source covered, `None` otherwise.
fn market_coverage(players: &[PlayerRecord]) -> Vec<Option<f64>> {
    players
        .iter()
        .map(|p| p.sources.market.then_some(p.market_value))
        .collect()
}
