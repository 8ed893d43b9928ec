use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::rating::inverse_normal::InverseNormalKind;

const APP_DIR: &str = "scout_ratings";
const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 80.0;

/// A football season, e.g. 2024-2025. Seasons start in July.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Season {
    pub start: i32,
    pub end: i32,
}

impl Season {
    pub fn starting(start: i32) -> Self {
        Self {
            start,
            end: start + 1,
        }
    }

    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= 7 {
            Self::starting(date.year())
        } else {
            Self::starting(date.year() - 1)
        }
    }

    /// Accepts `2024-2025`, `2024/25`, `24/25`, `2024-25` and a bare end
    /// year such as `2025`.
    pub fn parse(raw: &str) -> Option<Season> {
        let groups: Vec<&str> = raw
            .split(|c: char| !c.is_ascii_digit())
            .filter(|g| !g.is_empty())
            .collect();
        match groups.as_slice() {
            [single] => {
                let year = expand_year(single)?;
                Some(Self::starting(year - 1))
            }
            [first, second] => {
                let start = expand_year(first)?;
                let end = if second.len() <= 2 {
                    let yy: i32 = second.parse().ok()?;
                    let mut end = start / 100 * 100 + yy;
                    if end < start {
                        end += 100;
                    }
                    end
                } else {
                    expand_year(second)?
                };
                (end == start + 1).then_some(Season { start, end })
            }
            _ => None,
        }
    }

    pub fn slug(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

fn expand_year(raw: &str) -> Option<i32> {
    let value: i32 = raw.parse().ok()?;
    match raw.len() {
        1 | 2 => Some(2000 + value),
        4 => Some(value),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Json,
    Sqlite,
}

// ---------------------------------------------------------------------------
// Tuning: every empirical constant of the rating mechanism.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationScales {
    pub percentage_factor: f64,
    pub cap: f64,
    pub goals: f64,
    pub assists: f64,
    pub shots: f64,
    pub passes: f64,
    pub tackles: f64,
    pub interceptions: f64,
    pub saves: f64,
    pub rate_other: f64,
    pub generic: f64,
}

impl Default for NormalizationScales {
    fn default() -> Self {
        Self {
            percentage_factor: 0.9,
            cap: 95.0,
            goals: 1.0,
            assists: 0.7,
            shots: 5.0,
            passes: 70.0,
            tackles: 4.0,
            interceptions: 3.0,
            saves: 5.0,
            rate_other: 5.0,
            generic: 10.0,
        }
    }
}

/// One segment of the piecewise rating map:
/// `rating = base + slope * (composite - min_composite)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingBand {
    pub min_composite: f64,
    pub base: f64,
    pub slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandTable {
    /// Ordered by descending `min_composite`; the last band should start at 0.
    pub bands: Vec<RatingBand>,
    pub min_rating: f64,
    pub max_rating: f64,
}

impl Default for BandTable {
    fn default() -> Self {
        let band = |min_composite, base, slope| RatingBand {
            min_composite,
            base,
            slope,
        };
        Self {
            bands: vec![
                band(90.0, 80.0, 1.0),
                band(75.0, 70.0, 0.67),
                band(60.0, 60.0, 0.67),
                band(40.0, 50.0, 0.5),
                band(0.0, 40.0, 0.25),
            ],
            min_rating: 40.0,
            max_rating: 90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub top_five_bonus: f64,
    pub second_tier_bonus: f64,
    pub minutes_threshold: f64,
    pub max_minutes_penalty: f64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            top_five_bonus: 2.0,
            second_tier_bonus: 1.0,
            minutes_threshold: 900.0,
            max_minutes_penalty: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackBucket {
    pub min_percentile: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTuning {
    /// Ordered by descending `min_percentile`.
    pub buckets: Vec<FallbackBucket>,
    pub below_buckets: f64,
    pub external_weight: f64,
    pub top_five_bonus: f64,
    pub second_tier_bonus: f64,
    pub prime_age_min: u32,
    pub prime_age_max: u32,
    pub prime_age_bonus: f64,
    pub min_rating: f64,
    pub max_rating: f64,
}

impl Default for FallbackTuning {
    fn default() -> Self {
        let bucket = |min_percentile, rating| FallbackBucket {
            min_percentile,
            rating,
        };
        Self {
            buckets: vec![
                bucket(0.99, 82.0),
                bucket(0.95, 78.0),
                bucket(0.90, 75.0),
                bucket(0.75, 70.0),
                bucket(0.50, 65.0),
                bucket(0.25, 60.0),
            ],
            below_buckets: 55.0,
            external_weight: 0.5,
            top_five_bonus: 3.0,
            second_tier_bonus: 1.5,
            prime_age_min: 24,
            prime_age_max: 29,
            prime_age_bonus: 2.0,
            min_rating: 40.0,
            max_rating: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedistributionTuning {
    pub target_mean: f64,
    pub base_spread: f64,
    /// Tried in order; the first one whose maximum reaches `target_ceiling` wins.
    pub spread_multipliers: Vec<f64>,
    pub target_ceiling: f64,
    /// Degeneracy thresholds, relative to the population mean.
    pub min_relative_std: f64,
    pub min_relative_range: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for RedistributionTuning {
    fn default() -> Self {
        Self {
            target_mean: 70.0,
            base_spread: 6.0,
            spread_multipliers: (0..=8).map(|i| 1.0 + 0.25 * i as f64).collect(),
            target_ceiling: 98.0,
            min_relative_std: 1e-6,
            min_relative_range: 1e-6,
            floor: 50.0,
            ceiling: 99.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketFloor {
    pub top_fraction: f64,
    pub floor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalFloor {
    pub min_rating: f64,
    pub floor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EliteFloors {
    /// Ordered tightest band first.
    pub market: Vec<MarketFloor>,
    pub external: Vec<ExternalFloor>,
}

impl Default for EliteFloors {
    fn default() -> Self {
        Self {
            market: vec![
                MarketFloor {
                    top_fraction: 0.01,
                    floor: 92.0,
                },
                MarketFloor {
                    top_fraction: 0.05,
                    floor: 87.0,
                },
                MarketFloor {
                    top_fraction: 0.10,
                    floor: 82.0,
                },
            ],
            external: vec![
                ExternalFloor {
                    min_rating: 85.0,
                    floor: 90.0,
                },
                ExternalFloor {
                    min_rating: 80.0,
                    floor: 85.0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub normalization: NormalizationScales,
    pub bands: BandTable,
    pub modifiers: Modifiers,
    pub fallback: FallbackTuning,
    pub redistribution: RedistributionTuning,
    pub elite: EliteFloors,
    pub neutral_rating: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            normalization: NormalizationScales::default(),
            bands: BandTable::default(),
            modifiers: Modifiers::default(),
            fallback: FallbackTuning::default(),
            redistribution: RedistributionTuning::default(),
            elite: EliteFloors::default(),
            neutral_rating: 65.0,
        }
    }
}

impl Tuning {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read tuning file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse tuning file {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RatingConfig {
    pub season: Season,
    pub cache_dir: Option<PathBuf>,
    pub cache_backend: CacheBackend,
    pub data_dir: PathBuf,
    pub overrides_path: Option<PathBuf>,
    pub profiles_path: Option<PathBuf>,
    pub fuzzy_threshold: f64,
    pub inverse_normal: InverseNormalKind,
    pub parallel: bool,
    pub tuning: Tuning,
}

impl RatingConfig {
    pub fn for_season(season: Season) -> Self {
        Self {
            season,
            cache_dir: app_cache_dir(),
            cache_backend: CacheBackend::Json,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            overrides_path: None,
            profiles_path: None,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            inverse_normal: InverseNormalKind::Numeric,
            parallel: true,
            tuning: Tuning::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let season = match env::var("SCOUT_SEASON") {
            Ok(raw) if !raw.trim().is_empty() => Season::parse(&raw)
                .ok_or_else(|| anyhow!("SCOUT_SEASON '{raw}' is not a season tag"))?,
            _ => Season::containing(Utc::now().date_naive()),
        };
        let mut cfg = Self::for_season(season);

        if let Some(dir) = env_path("SCOUT_CACHE_DIR") {
            cfg.cache_dir = Some(dir);
        }
        if let Some(dir) = env_path("SCOUT_DATA_DIR") {
            cfg.data_dir = dir;
        }
        cfg.overrides_path = env_path("SCOUT_OVERRIDES_PATH");
        cfg.profiles_path = env_path("SCOUT_PROFILES_PATH");
        if let Some(threshold) = env_f64("SCOUT_FUZZY_THRESHOLD") {
            cfg.fuzzy_threshold = threshold.clamp(0.0, 100.0);
        }
        if let Ok(raw) = env::var("SCOUT_INVERSE_NORMAL") {
            cfg.inverse_normal = InverseNormalKind::parse(&raw).ok_or_else(|| {
                anyhow!("SCOUT_INVERSE_NORMAL '{raw}' must be 'numeric' or 'rational'")
            })?;
        }
        if let Some(parallel) = env_bool("SCOUT_PARALLEL") {
            cfg.parallel = parallel;
        }
        if let Ok(raw) = env::var("SCOUT_CACHE_BACKEND") {
            cfg.cache_backend = match raw.trim().to_ascii_lowercase().as_str() {
                "sqlite" => CacheBackend::Sqlite,
                "json" | "" => CacheBackend::Json,
                other => return Err(anyhow!("unknown SCOUT_CACHE_BACKEND '{other}'")),
            };
        }
        if let Some(path) = env_path("SCOUT_TUNING_PATH") {
            cfg.tuning = Tuning::from_json_file(&path)?;
        }
        Ok(cfg)
    }

    /// Contract year assumed when no source supplies one.
    pub fn default_contract_end_year(&self) -> i32 {
        self.season.end + 1
    }
}

/// `$XDG_CACHE_HOME/scout_ratings`, falling back to `~/.cache/scout_ratings`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
