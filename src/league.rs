use serde::{Deserialize, Serialize};

use crate::config::{FallbackTuning, Modifiers};
use crate::identity::normalize_name;

const TOP_FIVE: &[&str] = &[
    "premier league",
    "english premier league",
    "epl",
    "la liga",
    "laliga",
    "laliga ea sports",
    "primera division",
    "bundesliga",
    "serie a",
    "ligue 1",
    "ligue 1 mcdonalds",
];

const SECOND_TIER: &[&str] = &[
    "eredivisie",
    "primeira liga",
    "liga portugal",
    "championship",
    "efl championship",
    "belgian pro league",
    "jupiler pro league",
    "super lig",
    "scottish premiership",
    "2 bundesliga",
    "serie b",
    "ligue 2",
    "segunda division",
    "laliga hypermotion",
    "mls",
    "major league soccer",
    "liga mx",
    "brasileirao",
    "serie a brazil",
    "liga profesional",
];

/// League quality bucket used by the rating modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeagueTier {
    TopFive,
    SecondTier,
    Other,
}

impl LeagueTier {
    pub fn classify(league: &str) -> Self {
        let key = normalize_name(league);
        if key.is_empty() {
            return LeagueTier::Other;
        }
        // Directory names like "premier_league" or "es-laliga" normalize to
        // spaced tokens, so match whole names first and then containment.
        if TOP_FIVE.contains(&key.as_str()) {
            return LeagueTier::TopFive;
        }
        if SECOND_TIER.contains(&key.as_str()) {
            return LeagueTier::SecondTier;
        }
        if SECOND_TIER.iter().any(|name| contains_words(&key, name)) {
            return LeagueTier::SecondTier;
        }
        if TOP_FIVE.iter().any(|name| contains_words(&key, name)) {
            return LeagueTier::TopFive;
        }
        LeagueTier::Other
    }

    /// Additive bonus applied to a profile-scored base rating.
    pub fn scoring_bonus(self, modifiers: &Modifiers) -> f64 {
        match self {
            LeagueTier::TopFive => modifiers.top_five_bonus,
            LeagueTier::SecondTier => modifiers.second_tier_bonus,
            LeagueTier::Other => 0.0,
        }
    }

    /// Bonus used by the metric-free heuristic.
    pub fn fallback_bonus(self, fallback: &FallbackTuning) -> f64 {
        match self {
            LeagueTier::TopFive => fallback.top_five_bonus,
            LeagueTier::SecondTier => fallback.second_tier_bonus,
            LeagueTier::Other => 0.0,
        }
    }
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    let padded = format!(" {haystack} ");
    padded.contains(&format!(" {needle} "))
}
