use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::identity::normalize_name;
use crate::player::Position;

/// Weight tables for one sub-role. Weights are percentages and are
/// renormalized by their total at scoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileWeights {
    pub name: String,
    pub positions: Vec<Position>,
    #[serde(default)]
    pub off_ball: BTreeMap<String, f64>,
    #[serde(default)]
    pub on_ball: BTreeMap<String, f64>,
}

impl ProfileWeights {
    pub fn new(
        name: &str,
        positions: &[Position],
        off_ball: &[(&str, f64)],
        on_ball: &[(&str, f64)],
    ) -> Self {
        let table = |pairs: &[(&str, f64)]| {
            pairs
                .iter()
                .map(|(metric, weight)| (metric.to_string(), *weight))
                .collect()
        };
        Self {
            name: name.to_string(),
            positions: positions.to_vec(),
            off_ball: table(off_ball),
            on_ball: table(on_ball),
        }
    }

    /// Off-ball entries first, then on-ball.
    pub fn weights(&self) -> impl Iterator<Item = (&str, f64)> {
        self.off_ball
            .iter()
            .chain(self.on_ball.iter())
            .map(|(metric, weight)| (metric.as_str(), *weight))
    }

    pub fn total_weight(&self) -> f64 {
        self.weights().map(|(_, w)| w).sum()
    }
}

/// (position, profile) -> weight tables. Loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileCatalog {
    profiles: Vec<ProfileWeights>,
}

static BUILTIN: Lazy<ProfileCatalog> = Lazy::new(|| ProfileCatalog::new(builtin_profiles()));

impl Default for ProfileCatalog {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<ProfileWeights>) -> Self {
        Self { profiles }
    }

    pub fn builtin() -> &'static ProfileCatalog {
        &BUILTIN
    }

    /// Replaces the built-in catalog with a JSON list of profiles.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read profile catalog {}", path.display()))?;
        let profiles: Vec<ProfileWeights> = serde_json::from_str(&raw)
            .with_context(|| format!("parse profile catalog {}", path.display()))?;
        if profiles.is_empty() {
            bail!("profile catalog {} defines no profiles", path.display());
        }
        for p in &profiles {
            if let Some((metric, weight)) = p.weights().find(|(_, w)| !w.is_finite() || *w < 0.0) {
                bail!(
                    "profile '{}' has invalid weight {weight} for '{metric}'",
                    p.name
                );
            }
        }
        Ok(Self::new(profiles))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profiles_for(&self, position: Position) -> impl Iterator<Item = &ProfileWeights> {
        self.profiles
            .iter()
            .filter(move |p| p.positions.contains(&position))
    }

    /// Exact profile for the position when named, otherwise the position's
    /// first profile.
    pub fn lookup(&self, position: Position, profile: Option<&str>) -> Option<&ProfileWeights> {
        if let Some(requested) = profile.map(normalize_name).filter(|p| !p.is_empty())
            && let Some(found) = self
                .profiles_for(position)
                .find(|p| normalize_name(&p.name) == requested)
        {
            return Some(found);
        }
        self.profiles_for(position).next()
    }
}

fn builtin_profiles() -> Vec<ProfileWeights> {
    use Position::*;
    vec![
        ProfileWeights::new(
            "Shot Stopper",
            &[GK],
            &[("Clean_Sheet_Pct", 20.0), ("Aerial_Win_Pct", 10.0)],
            &[("Save_Pct", 45.0), ("Saves_90", 25.0)],
        ),
        ProfileWeights::new(
            "Sweeper Keeper",
            &[GK],
            &[("Sweeper_Actions_90", 25.0), ("Clean_Sheet_Pct", 10.0)],
            &[("Save_Pct", 30.0), ("Pass_Completion_Pct", 20.0), ("Long_Pass_Pct", 15.0)],
        ),
        ProfileWeights::new(
            "Ball Playing",
            &[CB],
            &[("Interceptions_90", 15.0), ("Aerial_Win_Pct", 10.0), ("Tackles_90", 10.0)],
            &[
                ("Pass_Completion_Pct", 25.0),
                ("Progressive_Passes_90", 25.0),
                ("Long_Pass_Pct", 15.0),
            ],
        ),
        ProfileWeights::new(
            "Stopper",
            &[CB],
            &[
                ("Aerial_Win_Pct", 25.0),
                ("Clearances_90", 20.0),
                ("Tackles_90", 15.0),
                ("Blocks_90", 15.0),
                ("Interceptions_90", 15.0),
            ],
            &[("Pass_Completion_Pct", 10.0)],
        ),
        ProfileWeights::new(
            "Attacking Fullback",
            &[RB, LB],
            &[("Tackles_90", 10.0), ("Interceptions_90", 10.0)],
            &[
                ("Crosses_90", 20.0),
                ("Key_Passes_90", 20.0),
                ("Progressive_Carries_90", 20.0),
                ("xA_90", 20.0),
            ],
        ),
        ProfileWeights::new(
            "Defensive Fullback",
            &[RB, LB],
            &[
                ("Tackles_90", 25.0),
                ("Interceptions_90", 20.0),
                ("Duels_Won_Pct", 20.0),
                ("Aerial_Win_Pct", 10.0),
            ],
            &[("Pass_Completion_Pct", 15.0), ("Crosses_90", 10.0)],
        ),
        ProfileWeights::new(
            "Anchor",
            &[CDM],
            &[
                ("Tackles_90", 25.0),
                ("Interceptions_90", 25.0),
                ("Recoveries_90", 20.0),
                ("Duels_Won_Pct", 15.0),
            ],
            &[("Pass_Completion_Pct", 15.0)],
        ),
        ProfileWeights::new(
            "Deep Playmaker",
            &[CDM],
            &[("Interceptions_90", 15.0), ("Recoveries_90", 15.0)],
            &[
                ("Pass_Completion_Pct", 25.0),
                ("Progressive_Passes_90", 25.0),
                ("Long_Pass_Pct", 20.0),
            ],
        ),
        ProfileWeights::new(
            "Box to Box",
            &[CM],
            &[("Tackles_90", 15.0), ("Recoveries_90", 15.0), ("Pressures_90", 10.0)],
            &[
                ("Progressive_Carries_90", 20.0),
                ("Pass_Completion_Pct", 15.0),
                ("Goals_90", 10.0),
                ("Key_Passes_90", 15.0),
            ],
        ),
        ProfileWeights::new(
            "Playmaker",
            &[CM],
            &[("Recoveries_90", 10.0)],
            &[
                ("Key_Passes_90", 25.0),
                ("Progressive_Passes_90", 25.0),
                ("Pass_Completion_Pct", 20.0),
                ("xA_90", 20.0),
            ],
        ),
        ProfileWeights::new(
            "Creator",
            &[CAM],
            &[("Pressures_90", 10.0)],
            &[
                ("Key_Passes_90", 30.0),
                ("xA_90", 25.0),
                ("Assists_90", 15.0),
                ("Dribbles_90", 20.0),
            ],
        ),
        ProfileWeights::new(
            "Shadow Striker",
            &[CAM],
            &[("Touches_In_Box_90", 20.0)],
            &[
                ("Goals_90", 30.0),
                ("xG_90", 20.0),
                ("Shots_90", 15.0),
                ("Key_Passes_90", 15.0),
            ],
        ),
        ProfileWeights::new(
            "Inverted Winger",
            &[RW, LW],
            &[("Touches_In_Box_90", 10.0), ("Pressures_90", 5.0)],
            &[
                ("Goals_90", 20.0),
                ("xG_90", 15.0),
                ("Dribbles_90", 20.0),
                ("Shots_90", 15.0),
                ("Key_Passes_90", 15.0),
            ],
        ),
        ProfileWeights::new(
            "Classic Winger",
            &[RW, LW],
            &[("Pressures_90", 10.0)],
            &[
                ("Crosses_90", 25.0),
                ("Assists_90", 20.0),
                ("xA_90", 15.0),
                ("Dribbles_90", 20.0),
                ("Dribble_Success_Pct", 10.0),
            ],
        ),
        ProfileWeights::new(
            "Poacher",
            &[ST],
            &[("Touches_In_Box_90", 20.0)],
            &[
                ("Goals_90", 35.0),
                ("xG_90", 25.0),
                ("Shots_On_Target_90", 20.0),
            ],
        ),
        ProfileWeights::new(
            "Target Man",
            &[ST],
            &[("Aerial_Win_Pct", 30.0), ("Duels_Won_Pct", 15.0)],
            &[("Goals_90", 25.0), ("Assists_90", 10.0), ("Shots_90", 20.0)],
        ),
        ProfileWeights::new(
            "Complete Forward",
            &[ST],
            &[("Pressures_90", 10.0), ("Aerial_Win_Pct", 10.0)],
            &[
                ("Goals_90", 25.0),
                ("xG_90", 15.0),
                ("Assists_90", 15.0),
                ("Key_Passes_90", 15.0),
                ("Dribbles_90", 10.0),
            ],
        ),
    ]
}
