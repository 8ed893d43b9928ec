use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

use scout_ratings::cache_store::Invalidate;
use scout_ratings::config::RatingConfig;
use scout_ratings::demo_sources;
use scout_ratings::export;
use scout_ratings::pipeline::{self, PipelineReport, SourceRoots};
use scout_ratings::player::PlayerRecord;
use scout_ratings::telemetry;

const DEFAULT_TOP: usize = 20;
const DEFAULT_DEMO_PLAYERS: usize = 120;
const DEFAULT_DEMO_SEED: u64 = 2024;

const USAGE: &str = "usage:
  scout_ratings rate [--data DIR] [--out FILE.xlsx|FILE.csv] [--top N]
  scout_ratings invalidate <key|all>
  scout_ratings cache-list
  scout_ratings demo --out DIR [--players N] [--seed S]";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    telemetry::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };
    let rest = &args[1..];
    let cfg = RatingConfig::from_env()?;

    match command.as_str() {
        "rate" => rate(&cfg, rest),
        "invalidate" => invalidate(&cfg, rest),
        "cache-list" => cache_list(&cfg),
        "demo" => demo(&cfg, rest),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'\n{USAGE}")),
    }
}

fn rate(cfg: &RatingConfig, args: &[String]) -> Result<()> {
    let data_dir = flag_value(args, "data")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.data_dir.clone());
    let top = parse_flag::<usize>(args, "top")?.unwrap_or(DEFAULT_TOP);
    let roots = SourceRoots::under(&data_dir);

    let (players, report) = pipeline::run_with_config(cfg, &roots)?;
    print_summary(&report);
    print_top(&players, top);

    if let Some(out) = flag_value(args, "out") {
        let path = PathBuf::from(out);
        let written = match extension(&path).as_deref() {
            Some("csv") => export::write_csv(&path, &players)?,
            Some("xlsx") => export::write_xlsx(&path, &players, &report)?,
            _ => bail!("--out must end in .xlsx or .csv"),
        };
        println!("Exported {} players to {}", written.players, path.display());
    }
    Ok(())
}

fn invalidate(cfg: &RatingConfig, args: &[String]) -> Result<()> {
    let target = args
        .first()
        .ok_or_else(|| anyhow!("invalidate needs a cache key or 'all'"))?;
    let store = pipeline::open_store(cfg).context("open cache store")?;
    let removed = store.invalidate(Invalidate::parse(target))?;
    info!(target = %target, removed, "cache invalidated");
    println!("Removed {removed} cache entr{}", if removed == 1 { "y" } else { "ies" });
    Ok(())
}

fn cache_list(cfg: &RatingConfig) -> Result<()> {
    let store = pipeline::open_store(cfg).context("open cache store")?;
    let keys = store.keys();
    if keys.is_empty() {
        println!("Cache is empty");
    }
    for key in keys {
        match store.entry(&key) {
            Some(entry) => println!(
                "{key}  rows={}  created={}",
                entry.payload.len(),
                entry.created_at.format("%Y-%m-%d %H:%M")
            ),
            None => println!("{key}  (unreadable)"),
        }
    }
    Ok(())
}

fn demo(cfg: &RatingConfig, args: &[String]) -> Result<()> {
    let out = flag_value(args, "out")
        .map(PathBuf::from)
        .context("demo needs --out DIR")?;
    let players = parse_flag::<usize>(args, "players")?.unwrap_or(DEFAULT_DEMO_PLAYERS);
    let seed = parse_flag::<u64>(args, "seed")?.unwrap_or(DEFAULT_DEMO_SEED);
    let report = demo_sources::write_demo_tree(&out, cfg.season, players, seed)?;
    println!(
        "Wrote {} players across {} files for {} under {}",
        report.players,
        report.files,
        cfg.season,
        report.root.display()
    );
    Ok(())
}

fn print_summary(report: &PipelineReport) {
    println!("Season {}", report.season);
    for source in &report.sources {
        println!(
            "  {:<10} rows={:<6} files={} skipped_files={} wrong_season={}{}",
            source.kind.label(),
            source.rows_kept,
            source.files_scanned,
            source.files_skipped,
            source.rows_wrong_season,
            if source.from_cache { " (cache)" } else { "" }
        );
    }
    if let Some(c) = &report.consolidation {
        println!(
            "  matched market={}/{} salary={}/{}",
            c.market.matched(),
            c.players,
            c.salary.matched(),
            c.players
        );
    } else if report.consolidated_from_cache {
        println!("  consolidated population from cache");
    }
    let s = &report.rating.scoring;
    println!(
        "  scored profile={} heuristic={} neutral={}",
        s.profile_scored, s.heuristic_scored, s.neutral
    );
    let r = &report.rating.redistribution;
    println!(
        "  redistribution={:?} inverse={} market_floors={} external_floors={}",
        r.strategy, r.inverse_normal, r.market_floors_applied, r.external_floors_applied
    );
}

fn print_top(players: &[PlayerRecord], top: usize) {
    println!();
    println!(
        "{:>3}  {:<28} {:<5} {:<18} {:>7} {:>6} {:>5}",
        "#", "Player", "Pos", "Club", "Value", "Base", "Final"
    );
    for (idx, p) in export::ranked(players).into_iter().take(top).enumerate() {
        println!(
            "{:>3}  {:<28} {:<5} {:<18} {:>7.1} {:>6.1} {:>5}",
            idx + 1,
            truncate(&p.name, 28),
            p.position.code(),
            truncate(&p.club, 18),
            p.market_value,
            p.base_rating.unwrap_or_default(),
            p.final_rating.map(|r| r.to_string()).unwrap_or_default()
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// `--name=value` or `--name value`.
fn flag_value(args: &[String], name: &str) -> Option<String> {
    let long = format!("--{name}");
    let prefix = format!("--{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == long {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn parse_flag<T: std::str::FromStr>(args: &[String], name: &str) -> Result<Option<T>> {
    match flag_value(args, name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("--{name} '{raw}' is not valid")),
        None => Ok(None),
    }
}
