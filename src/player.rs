use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::normalize_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    GK,
    CB,
    RB,
    LB,
    CDM,
    CM,
    CAM,
    RW,
    LW,
    ST,
    Unknown,
}

impl Position {
    pub const ALL: [Position; 10] = [
        Position::GK,
        Position::CB,
        Position::RB,
        Position::LB,
        Position::CDM,
        Position::CM,
        Position::CAM,
        Position::RW,
        Position::LW,
        Position::ST,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Position::GK => "GK",
            Position::CB => "CB",
            Position::RB => "RB",
            Position::LB => "LB",
            Position::CDM => "CDM",
            Position::CM => "CM",
            Position::CAM => "CAM",
            Position::RW => "RW",
            Position::LW => "LW",
            Position::ST => "ST",
            Position::Unknown => "Unknown",
        }
    }

    /// Maps position labels from the three sources (codes, English and
    /// Spanish names, multi-position strings such as "DF,MF"). The first
    /// recognizable label wins.
    pub fn from_label(raw: &str) -> Position {
        raw.split([',', '/', ';', '|'])
            .map(Self::from_single_label)
            .find(|p| *p != Position::Unknown)
            .unwrap_or(Position::Unknown)
    }

    fn from_single_label(raw: &str) -> Position {
        let s = normalize_name(raw);
        match s.as_str() {
            "gk" | "goalkeeper" | "keeper" | "portero" | "arquero" | "por" => return Position::GK,
            "cb" | "dc" | "centre back" | "center back" | "central defender" | "defensa central"
            | "central" | "df" | "defender" => return Position::CB,
            "rb" | "rwb" | "right back" | "right wing back" | "lateral derecho" | "ld" => {
                return Position::RB;
            }
            "lb" | "lwb" | "left back" | "left wing back" | "lateral izquierdo" | "li" => {
                return Position::LB;
            }
            "cdm" | "dm" | "dmf" | "defensive midfield" | "defensive midfielder" | "pivote"
            | "mcd" | "mediocentro defensivo" => return Position::CDM,
            "cm" | "mc" | "mf" | "central midfield" | "midfielder" | "centrocampista"
            | "mediocentro" => return Position::CM,
            "cam" | "am" | "amf" | "attacking midfield" | "attacking midfielder" | "mco"
            | "mediapunta" => return Position::CAM,
            "rw" | "rm" | "right winger" | "right wing" | "right midfield" | "extremo derecho"
            | "ed" => return Position::RW,
            "lw" | "lm" | "left winger" | "left wing" | "left midfield" | "extremo izquierdo"
            | "ei" => return Position::LW,
            "st" | "cf" | "fw" | "forward" | "striker" | "centre forward" | "center forward"
            | "delantero" | "delantero centro" | "dc9" | "attack" => return Position::ST,
            _ => {}
        }
        if s.contains("keeper") || s.contains("portero") {
            Position::GK
        } else if s.contains("left") && s.contains("back") {
            Position::LB
        } else if s.contains("right") && s.contains("back") {
            Position::RB
        } else if s.contains("back") || s.contains("defen") {
            Position::CB
        } else if s.contains("left") && s.contains("wing") {
            Position::LW
        } else if s.contains("right") && s.contains("wing") || s.contains("winger") {
            Position::RW
        } else if s.contains("defensive") {
            Position::CDM
        } else if s.contains("attacking") {
            Position::CAM
        } else if s.contains("midfield") {
            Position::CM
        } else if s.contains("forward") || s.contains("striker") {
            Position::ST
        } else {
            Position::Unknown
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Scoring lifecycle: `Unscored -> BaseScored -> Redistributed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RatingState {
    #[default]
    Unscored,
    BaseScored,
    Redistributed,
}

/// How the base rating was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoreMethod {
    Profile { composite: f64, metrics_used: usize },
    Heuristic,
    /// Scoring failed and the neutral default was assigned.
    Neutral { reason: String },
}

impl ScoreMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ScoreMethod::Profile { .. } => "profile",
            ScoreMethod::Heuristic => "heuristic",
            ScoreMethod::Neutral { .. } => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceCoverage {
    pub statistics: bool,
    pub market: bool,
    pub salary: bool,
}

/// One player per season snapshot, merged from the three sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub canonical_key: String,
    pub age: u32,
    pub position: Position,
    pub profile: Option<String>,
    pub club: String,
    pub league: String,
    pub minutes_played: f64,
    /// Millions of euros.
    pub market_value: f64,
    /// Euros per year.
    pub salary_annual: f64,
    pub contract_end_year: i32,
    pub has_release_clause: bool,
    pub release_clause_value: Option<f64>,
    pub height_cm: f64,
    pub foot: String,
    /// Prior rating from a source, on a 0-100 scale.
    pub external_rating: Option<f64>,
    pub metrics: BTreeMap<String, Option<f64>>,
    pub sources: SourceCoverage,
    pub base_rating: Option<f64>,
    pub final_rating: Option<u8>,
    pub rating_state: RatingState,
    pub score_method: Option<ScoreMethod>,
}

impl PlayerRecord {
    /// A record with every field at its documented default.
    pub fn with_defaults(name: &str, contract_end_year: i32) -> Self {
        Self {
            name: name.trim().to_string(),
            canonical_key: normalize_name(name),
            age: 25,
            position: Position::Unknown,
            profile: None,
            club: String::new(),
            league: String::new(),
            minutes_played: 2700.0,
            market_value: 5.0,
            salary_annual: 1_000_000.0,
            contract_end_year,
            has_release_clause: false,
            release_clause_value: None,
            height_cm: 175.0,
            foot: "Right".to_string(),
            external_rating: None,
            metrics: BTreeMap::new(),
            sources: SourceCoverage::default(),
            base_rating: None,
            final_rating: None,
            rating_state: RatingState::Unscored,
            score_method: None,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().flatten()
    }

    pub fn set_base_rating(&mut self, rating: f64, method: ScoreMethod) {
        self.base_rating = Some(rating);
        self.score_method = Some(method);
        self.rating_state = RatingState::BaseScored;
    }

    pub fn set_final_rating(&mut self, rating: u8) {
        self.final_rating = Some(rating);
        self.rating_state = RatingState::Redistributed;
    }
}

/// External ratings arrive on 0-10 (match ratings) or 0-100 scales.
pub fn external_rating_100(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    let scaled = if raw <= 10.0 { raw * 10.0 } else { raw };
    Some(scaled.min(100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_labels_from_sources() {
        assert_eq!(Position::from_label("GK"), Position::GK);
        assert_eq!(Position::from_label("Centre-Back"), Position::CB);
        assert_eq!(Position::from_label("Lateral izquierdo"), Position::LB);
        assert_eq!(Position::from_label("Right Winger"), Position::RW);
        assert_eq!(Position::from_label("Defensive Midfield"), Position::CDM);
        assert_eq!(Position::from_label("Mediapunta"), Position::CAM);
        assert_eq!(Position::from_label("FW,MF"), Position::ST);
        assert_eq!(Position::from_label("Centre-Forward"), Position::ST);
        assert_eq!(Position::from_label("???"), Position::Unknown);
    }

    #[test]
    fn defaults_match_documented_values() {
        let r = PlayerRecord::with_defaults("Pedri González", 2026);
        assert_eq!(r.canonical_key, "pedri gonzalez");
        assert_eq!(r.age, 25);
        assert_eq!(r.position, Position::Unknown);
        assert_eq!(r.market_value, 5.0);
        assert_eq!(r.salary_annual, 1_000_000.0);
        assert_eq!(r.contract_end_year, 2026);
        assert!(!r.has_release_clause);
        assert_eq!(r.height_cm, 175.0);
        assert_eq!(r.foot, "Right");
        assert_eq!(r.minutes_played, 2700.0);
        assert_eq!(r.rating_state, RatingState::Unscored);
    }

    #[test]
    fn external_scale_detection() {
        assert_eq!(external_rating_100(7.4), Some(74.0));
        assert_eq!(external_rating_100(86.0), Some(86.0));
        assert_eq!(external_rating_100(0.0), None);
    }
}
