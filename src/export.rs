use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::pipeline::PipelineReport;
use crate::player::PlayerRecord;
use crate::rating::redistribute::{DistributionSummary, Strategy};

pub struct ExportReport {
    pub players: usize,
    pub summary_rows: usize,
}

const HEADER: [&str; 13] = [
    "Player",
    "Club",
    "League",
    "Position",
    "Profile",
    "Age",
    "Minutes",
    "Market Value (M EUR)",
    "Salary (EUR)",
    "Contract End",
    "Base Rating",
    "Final Rating",
    "Method",
];

/// Players ordered by final rating, highest first; ties by name.
pub fn ranked(players: &[PlayerRecord]) -> Vec<&PlayerRecord> {
    let mut out: Vec<&PlayerRecord> = players.iter().collect();
    out.sort_by(|a, b| {
        b.final_rating
            .cmp(&a.final_rating)
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

pub fn write_xlsx(path: &Path, players: &[PlayerRecord], report: &PipelineReport) -> Result<ExportReport> {
    let rating_rows = rating_rows(players);
    let summary_rows = summary_rows(report);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Ratings")?;
        write_rows(sheet, &rating_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        players: rating_rows.len().saturating_sub(1),
        summary_rows: summary_rows.len().saturating_sub(1),
    })
}

pub fn write_csv(path: &Path, players: &[PlayerRecord]) -> Result<ExportReport> {
    let rows = rating_rows(players);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed creating {}", path.display()))?;
    for row in &rows {
        writer
            .write_record(row)
            .with_context(|| format!("failed writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed flushing {}", path.display()))?;
    Ok(ExportReport {
        players: rows.len().saturating_sub(1),
        summary_rows: 0,
    })
}

fn rating_rows(players: &[PlayerRecord]) -> Vec<Vec<String>> {
    let mut rows = vec![HEADER.iter().map(|h| h.to_string()).collect()];
    rows.extend(ranked(players).into_iter().map(player_row));
    rows
}

fn player_row(p: &PlayerRecord) -> Vec<String> {
    vec![
        p.name.clone(),
        p.club.clone(),
        p.league.clone(),
        p.position.code().to_string(),
        p.profile.clone().unwrap_or_default(),
        p.age.to_string(),
        format!("{:.0}", p.minutes_played),
        format!("{:.2}", p.market_value),
        format!("{:.0}", p.salary_annual),
        p.contract_end_year.to_string(),
        p.base_rating.map(|r| format!("{r:.1}")).unwrap_or_default(),
        p.final_rating.map(|r| r.to_string()).unwrap_or_default(),
        p.score_method
            .as_ref()
            .map(|m| m.label().to_string())
            .unwrap_or_default(),
    ]
}

fn summary_rows(report: &PipelineReport) -> Vec<Vec<String>> {
    let mut rows = vec![vec!["Metric".to_string(), "Value".to_string()]];
    let mut push = |k: &str, v: String| rows.push(vec![k.to_string(), v]);

    push("Season", report.season.to_string());
    for source in &report.sources {
        push(
            &format!("{} rows", source.kind),
            format!(
                "{}{}",
                source.rows_kept,
                if source.from_cache { " (cache)" } else { "" }
            ),
        );
    }
    push(
        "Consolidated from cache",
        report.consolidated_from_cache.to_string(),
    );
    let scoring = &report.rating.scoring;
    push("Profile scored", scoring.profile_scored.to_string());
    push("Heuristic scored", scoring.heuristic_scored.to_string());
    push("Neutral default", scoring.neutral.to_string());

    let redistribution = &report.rating.redistribution;
    let strategy = match redistribution.strategy {
        Strategy::Gaussian { spread } => format!("gaussian (spread {spread:.2})"),
        Strategy::PercentileRank => "percentile rank".to_string(),
        Strategy::Empty => "none".to_string(),
    };
    push("Redistribution", strategy);
    push("Inverse normal", redistribution.inverse_normal.to_string());
    push(
        "Market floors applied",
        redistribution.market_floors_applied.to_string(),
    );
    push(
        "External floors applied",
        redistribution.external_floors_applied.to_string(),
    );
    for (label, summary) in [
        ("Base", redistribution.before.as_ref()),
        ("Final", redistribution.after.as_ref()),
    ] {
        if let Some(s) = summary {
            for (name, value) in summary_fields(s) {
                push(&format!("{label} {name}"), format!("{value:.2}"));
            }
        }
    }
    rows
}

pub fn summary_fields(s: &DistributionSummary) -> [(&'static str, f64); 9] {
    [
        ("min", s.min),
        ("p10", s.p10),
        ("p25", s.p25),
        ("median", s.p50),
        ("p75", s.p75),
        ("p90", s.p90),
        ("max", s.max),
        ("mean", s.mean),
        ("std", s.std),
    ]
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            // Header stays text; numeric cells are written as numbers so
            // they sort in a spreadsheet.
            match value.parse::<f64>() {
                Ok(number) if row_idx > 0 && number.is_finite() => {
                    worksheet.write_number(r, c, number)
                }
                _ => worksheet.write_string(r, c, value),
            }
            .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
