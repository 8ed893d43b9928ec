//! Synthetic three-source tree for trying the pipeline without scraped data.
//!
//! Writes `<out>/statistics/<league>/<club>/players.csv`,
//! `<out>/market/<league>/<club>/players.json` and
//! `<out>/salary/<league>/<club>/salarios.csv` (semicolon separated, Spanish
//! headers). Each source spells the season and the numbers its own way.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::config::Season;
use crate::player::Position;

const LEAGUES: &[(&str, &[&str])] = &[
    ("Premier League", &["Arsenal", "Chelsea", "Brighton"]),
    ("La Liga", &["Real Madrid", "Real Sociedad", "Getafe"]),
    ("Serie A", &["Inter", "Atalanta"]),
    ("Eredivisie", &["Ajax", "Feyenoord"]),
    ("Liga MX", &["Club America"]),
];

const FIRST_NAMES: &[&str] = &[
    "Álvaro", "Bruno", "Carlos", "Dani", "Emil", "Fabián", "Gonzalo", "Hugo", "Iñaki", "João",
    "Kai", "Luka", "Mikel", "Nico", "Óscar", "Pau", "Rafael", "Sergio", "Theo", "Unai",
];

const LAST_NAMES: &[&str] = &[
    "Aguirre", "Benítez", "Castro", "Díaz", "Eriksen", "Fernández", "García", "Hernández",
    "Iglesias", "Jiménez", "Kovačić", "López", "Martínez", "Núñez", "Olmo", "Pérez", "Quiroga",
    "Ramos", "Sánchez", "Torres", "Urrutia", "Valverde", "Williams", "Zubimendi",
];

const NAME_ATTEMPTS: usize = 32;

const STAT_COLUMNS: &[&str] = &[
    "Player", "Season", "Age", "Pos", "Min", "Gls/90", "Ast/90", "xG/90", "xA/90", "Sh/90",
    "KP/90", "PrgP/90", "Cmp%", "Succ/90", "Tkl/90", "Int/90", "Clr/90", "Won%", "Saves/90",
    "Save%",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub root: PathBuf,
    pub players: usize,
    pub files: usize,
}

struct DemoPlayer {
    name: String,
    position: Position,
    age: u32,
    minutes: u32,
    /// Latent quality in [0, 1]; drives both stats and market value.
    quality: f64,
    market_value: f64,
}

/// Generates `players` synthetic players for `season` under `out`.
/// The same seed always produces the same tree.
pub fn write_demo_tree(out: &Path, season: Season, players: usize, seed: u64) -> Result<DemoReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let clubs: Vec<(&str, &str)> = LEAGUES
        .iter()
        .flat_map(|(league, clubs)| clubs.iter().map(move |club| (*league, *club)))
        .collect();

    let mut used = HashSet::new();
    let mut by_club: Vec<Vec<DemoPlayer>> = clubs.iter().map(|_| Vec::new()).collect();
    for idx in 0..players {
        let name = unique_name(&mut rng, &mut used, idx);
        let club = idx % clubs.len();
        by_club[club].push(demo_player(&mut rng, name, clubs[club].0));
    }

    let mut files = 0;
    for ((league, club), squad) in clubs.iter().zip(&by_club) {
        if squad.is_empty() {
            continue;
        }
        let rel = Path::new(&slug(league)).join(slug(club));
        write_statistics(&out.join("statistics").join(&rel), season, squad, &mut rng)?;
        write_market(&out.join("market").join(&rel), season, league, club, squad, &mut rng)?;
        write_salary(&out.join("salary").join(&rel), season, squad, &mut rng)?;
        files += 3;
    }

    Ok(DemoReport {
        root: out.to_path_buf(),
        players,
        files,
    })
}

fn unique_name(rng: &mut StdRng, used: &mut HashSet<String>, idx: usize) -> String {
    for _ in 0..NAME_ATTEMPTS {
        let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
        let name = format!("{first} {last}");
        if used.insert(name.clone()) {
            return name;
        }
        let second = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
        let name = format!("{first} {last} {second}");
        if used.insert(name.clone()) {
            return name;
        }
    }
    // Pool nearly exhausted: the player index keeps the name unique, since
    // generated names never contain digits.
    let first = FIRST_NAMES[idx % FIRST_NAMES.len()];
    let last = LAST_NAMES[(idx / FIRST_NAMES.len()) % LAST_NAMES.len()];
    let name = format!("{first} {last} {idx}");
    used.insert(name.clone());
    name
}

fn demo_player(rng: &mut StdRng, name: String, league: &str) -> DemoPlayer {
    let position = Position::ALL[rng.gen_range(0..Position::ALL.len())];
    let quality: f64 = rng.gen_range(0.0..1.0);
    let league_factor = match league {
        "Premier League" => 1.6,
        "La Liga" | "Serie A" => 1.3,
        _ => 0.6,
    };
    let market_value = (0.5 + quality.powi(3) * 120.0 * league_factor) * rng.gen_range(0.7..1.3);
    DemoPlayer {
        name,
        position,
        age: rng.gen_range(18..36),
        minutes: rng.gen_range(150..3400),
        quality,
        market_value,
    }
}

fn write_statistics(dir: &Path, season: Season, squad: &[DemoPlayer], rng: &mut StdRng) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join("players.csv");
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("create {}", path.display()))?;
    writer.write_record(STAT_COLUMNS)?;

    let tag = season.slug();
    let previous = Season::starting(season.start - 1).slug();
    for p in squad {
        let q = p.quality;
        let mut jitter = |scale: f64| (scale * (0.4 + q) * rng.gen_range(0.6..1.4)).max(0.0);
        let attacking = matches!(p.position, Position::ST | Position::RW | Position::LW | Position::CAM);
        let defending = matches!(p.position, Position::CB | Position::RB | Position::LB | Position::CDM);
        let keeper = p.position == Position::GK;

        let goals = if attacking { jitter(0.45) } else { jitter(0.05) };
        let assists = if attacking { jitter(0.25) } else { jitter(0.08) };
        let xg = goals * 0.9;
        let xa = assists * 0.9;
        let shots = if attacking { jitter(2.5) } else { jitter(0.6) };
        let key_passes = jitter(1.2);
        let prog_passes = jitter(4.0);
        let pass_pct = 70.0 + 20.0 * q;
        let dribbles = if attacking { jitter(2.0) } else { jitter(0.5) };
        let tackles = if defending { jitter(2.5) } else { jitter(0.8) };
        let interceptions = if defending { jitter(1.6) } else { jitter(0.4) };
        let clearances = if defending { jitter(3.5) } else { jitter(0.3) };
        let aerial = 40.0 + 30.0 * q;
        let (saves, save_pct) = if keeper {
            (format!("{:.2}", jitter(2.5)), format!("{:.1}", 60.0 + 20.0 * q))
        } else {
            (String::new(), String::new())
        };

        let stats = [
            goals, assists, xg, xa, shots, key_passes, prog_passes, pass_pct, dribbles, tackles,
            interceptions, clearances, aerial,
        ];
        let mut record = vec![
            p.name.clone(),
            tag.clone(),
            p.age.to_string(),
            p.position.code().to_string(),
            p.minutes.to_string(),
        ];
        record.extend(stats.iter().map(|v| format!("{v:.2}")));
        record.push(saves);
        record.push(save_pct);
        writer.write_record(&record)?;

        // A stale row from the previous season that ingestion must drop.
        if rng.gen_bool(0.1) {
            record[1] = previous.clone();
            writer.write_record(&record)?;
        }
    }
    writer.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn write_market(
    dir: &Path,
    season: Season,
    league: &str,
    club: &str,
    squad: &[DemoPlayer],
    rng: &mut StdRng,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let tag = format!("{}/{:02}", season.start, season.end % 100);
    let players: Vec<_> = squad
        .iter()
        .map(|p| {
            let value = if p.market_value >= 1.0 {
                format!("€{:.1}m", p.market_value)
            } else {
                format!("€{:.0}k", p.market_value * 1000.0)
            };
            let expires = season.end + rng.gen_range(0..5);
            json!({
                "name": p.name,
                "season": tag,
                "market_value": value,
                "position": p.position.code(),
                "club": club,
                "league": league,
                "contract_expires": format!("30/06/{expires}"),
                "height": rng.gen_range(168..198),
                "foot": if rng.gen_bool(0.25) { "left" } else { "right" },
            })
        })
        .collect();
    let path = dir.join("players.json");
    let body = serde_json::to_string_pretty(&json!({ "players": players }))?;
    fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn write_salary(dir: &Path, season: Season, squad: &[DemoPlayer], rng: &mut StdRng) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join("salarios.csv");
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record(["Jugador", "Temporada", "Salario", "Cláusula"])?;
    let tag = format!("{:02}/{:02}", season.start % 100, season.end % 100);
    for p in squad {
        let salary = (300_000.0 + p.market_value * 90_000.0 * rng.gen_range(0.6..1.4)).round();
        let clause = if rng.gen_bool(0.3) { "Sí" } else { "No" };
        // Salary listings often drop the accents.
        let name = if rng.gen_bool(0.5) {
            strip_accents(&p.name)
        } else {
            p.name.clone()
        };
        writer.write_record([name, tag.clone(), format!("{salary:.0}"), clause.to_string()])?;
    }
    writer.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn strip_accents(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'á' | 'ã' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ñ' => 'n',
            'č' => 'c',
            'Á' => 'A',
            'Ó' => 'O',
            _ => c,
        })
        .collect()
}

fn slug(label: &str) -> String {
    label
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
