use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::aliases::{
    Field, field_for_column, field_number, field_text, is_per90, metric_name, parse_flag,
    parse_market_value, parse_money, parse_number, parse_year,
};
use crate::dataset::{Cell, Dataset, Row};
use crate::error::ConsolidateError;
use crate::identity::{CandidateIndex, IdentityMatcher, MatchKind};
use crate::ingest::{COL_CLUB, COL_LEAGUE, SourceKind};
use crate::player::{PlayerRecord, Position, SourceCoverage, external_rating_100};

/// Imputed value for a per-90 metric the statistics source defines but a
/// row leaves empty. Non-zero so downstream ratios stay finite.
pub const MISSING_METRIC_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchCounts {
    pub overrides: usize,
    pub exact: usize,
    pub last_name: usize,
    pub fuzzy: usize,
    pub unmatched: usize,
}

impl MatchCounts {
    fn record(&mut self, kind: Option<MatchKind>) {
        match kind {
            Some(MatchKind::Override) => self.overrides += 1,
            Some(MatchKind::Exact) => self.exact += 1,
            Some(MatchKind::LastName) => self.last_name += 1,
            Some(MatchKind::Fuzzy { .. }) => self.fuzzy += 1,
            None => self.unmatched += 1,
        }
    }

    pub fn matched(&self) -> usize {
        self.overrides + self.exact + self.last_name + self.fuzzy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub spine: SourceKind,
    pub players: usize,
    pub market: MatchCounts,
    pub salary: MatchCounts,
    pub imputed_metrics: usize,
}

/// Merges the three source datasets into one record per spine row.
pub struct Consolidator {
    matcher: IdentityMatcher,
    contract_end_default: i32,
}

impl Consolidator {
    pub fn new(matcher: IdentityMatcher, contract_end_default: i32) -> Self {
        Self {
            matcher,
            contract_end_default,
        }
    }

    pub fn matcher(&self) -> &IdentityMatcher {
        &self.matcher
    }

    /// Statistics rows are the spine; with no statistics the market rows are.
    pub fn consolidate(
        &self,
        statistics: &Dataset,
        market: &Dataset,
        salary: &Dataset,
    ) -> Result<(Vec<PlayerRecord>, ConsolidationReport), ConsolidateError> {
        let (spine_kind, spine) = if !statistics.is_empty() {
            (SourceKind::Statistics, statistics)
        } else if !market.is_empty() {
            info!("statistics source is empty, using market source as spine");
            (SourceKind::Market, market)
        } else {
            return Err(ConsolidateError::NoSpine);
        };

        let market_index = name_index(market);
        let salary_index = name_index(salary);
        let metric_columns = if spine_kind == SourceKind::Statistics {
            metric_columns(statistics)
        } else {
            Vec::new()
        };

        let mut report = ConsolidationReport {
            spine: spine_kind,
            players: 0,
            market: MatchCounts::default(),
            salary: MatchCounts::default(),
            imputed_metrics: 0,
        };
        let mut players = Vec::with_capacity(spine.len());
        for row in spine.rows() {
            let Some(name) = field_text(row, Field::Name) else {
                continue;
            };

            let (stats_row, market_row) = match spine_kind {
                SourceKind::Statistics => {
                    let found = self.matcher.resolve(&name, &market_index);
                    report.market.record(found.map(|m| m.kind));
                    (Some(row), found.and_then(|m| market.rows().get(m.index)))
                }
                _ => (None, Some(row)),
            };
            let found = self.matcher.resolve(&name, &salary_index);
            report.salary.record(found.map(|m| m.kind));
            let salary_row = found.and_then(|m| salary.rows().get(m.index));

            let sources = Sources {
                stats: stats_row,
                market: market_row,
                salary: salary_row,
            };
            let mut record = self.merge(&name, &sources);
            if let Some(stats_row) = stats_row {
                report.imputed_metrics += fill_metrics(&mut record, stats_row, &metric_columns);
            }
            players.push(record);
        }

        report.players = players.len();
        info!(
            spine = %spine_kind,
            players = report.players,
            market_matched = report.market.matched(),
            salary_matched = report.salary.matched(),
            imputed_metrics = report.imputed_metrics,
            "population consolidated"
        );
        Ok((players, report))
    }

    fn merge(&self, name: &str, src: &Sources<'_>) -> PlayerRecord {
        let mut r = PlayerRecord::with_defaults(name, self.contract_end_default);
        r.sources = SourceCoverage {
            statistics: src.stats.is_some(),
            market: src.market.is_some(),
            salary: src.salary.is_some(),
        };

        let profile_order = src.profile_first();
        let market_order = src.market_first();
        let salary_order = src.salary_first();

        if let Some(age) = first(&profile_order, |row| field_number(row, Field::Age))
            .filter(|a| (10.0..=60.0).contains(a))
        {
            r.age = age.round() as u32;
        }
        if let Some(position) = first(&profile_order, |row| {
            field_text(row, Field::Position)
                .map(|s| Position::from_label(&s))
                .filter(|p| *p != Position::Unknown)
        }) {
            r.position = position;
        }
        r.profile = first(&profile_order, |row| field_text(row, Field::Profile));
        r.club = first(&profile_order, |row| {
            field_text(row, Field::Club).or_else(|| non_empty_text(row, COL_CLUB))
        })
        .unwrap_or_else(|| "Unknown".to_string());
        r.league = first(&profile_order, |row| {
            field_text(row, Field::League).or_else(|| non_empty_text(row, COL_LEAGUE))
        })
        .unwrap_or_else(|| "Unknown".to_string());
        if let Some(minutes) = first(&profile_order, |row| field_number(row, Field::Minutes))
            .filter(|m| *m >= 0.0)
        {
            r.minutes_played = minutes;
        }
        if let Some(height) = first(&profile_order, |row| field_number(row, Field::Height)) {
            // Metres in some sources.
            let cm = if height < 3.0 { height * 100.0 } else { height };
            if (120.0..=230.0).contains(&cm) {
                r.height_cm = cm;
            }
        }
        if let Some(foot) = first(&profile_order, |row| {
            field_text(row, Field::Foot).and_then(|s| canonical_foot(&s))
        }) {
            r.foot = foot.to_string();
        }
        r.external_rating = first(&profile_order, |row| {
            field_number(row, Field::ExternalRating).and_then(external_rating_100)
        });

        if let Some(value) = first(&market_order, |row| {
            field_text(row, Field::MarketValue).and_then(|s| parse_market_value(&s))
        }) {
            r.market_value = value;
        }
        if let Some(year) = first(&market_order, |row| {
            field_text(row, Field::ContractEnd).and_then(|s| parse_year(&s))
        }) {
            r.contract_end_year = year;
        }
        if let Some(salary) = first(&salary_order, |row| {
            field_text(row, Field::Salary).and_then(|s| parse_money(&s))
        }) {
            r.salary_annual = salary;
        }

        r.release_clause_value = first(&market_order, |row| {
            field_text(row, Field::ReleaseClauseValue).and_then(|s| parse_market_value(&s))
        })
        .filter(|v| *v > 0.0);
        let clause = first(&salary_order, |row| {
            let raw = field_text(row, Field::ReleaseClause)?;
            match parse_flag(&raw) {
                Some(flag) => Some((flag, None)),
                // "€100m" in a clause column: a clause with its amount.
                None => parse_market_value(&raw).map(|v| (v > 0.0, Some(v))),
            }
        });
        if let Some((flag, amount)) = clause {
            r.has_release_clause = flag;
            if r.release_clause_value.is_none() {
                r.release_clause_value = amount.filter(|v| *v > 0.0);
            }
        }
        if r.release_clause_value.is_some() {
            r.has_release_clause = true;
        }
        r
    }
}

struct Sources<'a> {
    stats: Option<&'a Row>,
    market: Option<&'a Row>,
    salary: Option<&'a Row>,
}

impl<'a> Sources<'a> {
    fn profile_first(&self) -> [Option<&'a Row>; 3] {
        [self.stats, self.market, self.salary]
    }

    fn market_first(&self) -> [Option<&'a Row>; 3] {
        [self.market, self.stats, self.salary]
    }

    fn salary_first(&self) -> [Option<&'a Row>; 3] {
        [self.salary, self.market, self.stats]
    }
}

fn first<T>(rows: &[Option<&Row>; 3], pick: impl Fn(&Row) -> Option<T>) -> Option<T> {
    rows.iter().flatten().find_map(|row| pick(row))
}

fn non_empty_text(row: &Row, column: &str) -> Option<String> {
    row.text(column)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn canonical_foot(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "right" | "r" | "derecho" | "diestro" | "d" => Some("Right"),
        "left" | "l" | "izquierdo" | "zurdo" | "i" => Some("Left"),
        "both" | "ambidextrous" | "ambidiestro" | "ambos" => Some("Both"),
        _ => None,
    }
}

fn name_index(dataset: &Dataset) -> CandidateIndex {
    CandidateIndex::new(
        dataset
            .rows()
            .iter()
            .map(|row| field_text(row, Field::Name).unwrap_or_default()),
    )
}

/// `(source column, canonical metric)` for every performance column: not a
/// known field, not metadata, numeric in at least one row.
fn metric_columns(statistics: &Dataset) -> Vec<(String, String)> {
    statistics
        .columns()
        .iter()
        .filter(|c| !c.starts_with('_') && field_for_column(c).is_none())
        .filter(|c| statistics.rows().iter().any(|row| cell_number(row.get(c)).is_some()))
        .map(|c| (c.clone(), metric_name(c)))
        .collect()
}

fn cell_number(cell: Option<&Cell>) -> Option<f64> {
    match cell? {
        Cell::Number(v) => Some(*v),
        Cell::Text(s) => parse_number(s),
        _ => None,
    }
}

/// Copies performance metrics onto the record; returns how many values were
/// imputed.
fn fill_metrics(record: &mut PlayerRecord, row: &Row, columns: &[(String, String)]) -> usize {
    let mut imputed = 0;
    for (column, metric) in columns {
        let value = match cell_number(row.get(column)) {
            Some(v) => Some(v),
            None if is_per90(metric) => {
                imputed += 1;
                Some(MISSING_METRIC_FLOOR)
            }
            None => None,
        };
        // Two source spellings of one metric: keep the first present value.
        let slot = record.metrics.entry(metric.clone()).or_insert(None);
        if slot.is_none() {
            *slot = value;
        }
    }
    imputed
}

// ---------------------------------------------------------------------------
// Population <-> Dataset, for caching the consolidated population
// ---------------------------------------------------------------------------

const METRIC_PREFIX: &str = "metric:";

pub fn population_to_dataset(players: &[PlayerRecord]) -> Dataset {
    players
        .iter()
        .map(|p| {
            let mut row = Row::new();
            row.insert("name", p.name.as_str());
            row.insert("canonical_key", p.canonical_key.as_str());
            row.insert("age", f64::from(p.age));
            row.insert("position", p.position.code());
            row.insert("profile", p.profile.clone().map(Cell::Text).unwrap_or(Cell::Empty));
            row.insert("club", p.club.as_str());
            row.insert("league", p.league.as_str());
            row.insert("minutes_played", p.minutes_played);
            row.insert("market_value", p.market_value);
            row.insert("salary_annual", p.salary_annual);
            row.insert("contract_end_year", f64::from(p.contract_end_year));
            row.insert("has_release_clause", p.has_release_clause);
            row.insert("release_clause_value", p.release_clause_value);
            row.insert("height_cm", p.height_cm);
            row.insert("foot", p.foot.as_str());
            row.insert("external_rating", p.external_rating);
            row.insert("source_statistics", p.sources.statistics);
            row.insert("source_market", p.sources.market);
            row.insert("source_salary", p.sources.salary);
            for (metric, value) in &p.metrics {
                row.insert(format!("{METRIC_PREFIX}{metric}"), *value);
            }
            row
        })
        .collect()
}

/// Inverse of [`population_to_dataset`]. Rows without a name are dropped.
pub fn population_from_dataset(dataset: &Dataset) -> Vec<PlayerRecord> {
    dataset
        .rows()
        .iter()
        .filter_map(|row| {
            let name = non_empty_text(row, "name")?;
            let contract = row.number("contract_end_year")? as i32;
            let mut p = PlayerRecord::with_defaults(&name, contract);
            if let Some(key) = non_empty_text(row, "canonical_key") {
                p.canonical_key = key;
            }
            let num = |col: &str, default: f64| row.number(col).unwrap_or(default);
            let flag = |col: &str| matches!(row.get(col), Some(Cell::Bool(true)));
            p.age = num("age", f64::from(p.age)) as u32;
            p.position = row
                .text("position")
                .map(|s| Position::from_label(&s))
                .unwrap_or(Position::Unknown);
            p.profile = non_empty_text(row, "profile");
            p.club = row.text("club").unwrap_or_default();
            p.league = row.text("league").unwrap_or_default();
            p.minutes_played = num("minutes_played", p.minutes_played);
            p.market_value = num("market_value", p.market_value);
            p.salary_annual = num("salary_annual", p.salary_annual);
            p.has_release_clause = flag("has_release_clause");
            p.release_clause_value = row.number("release_clause_value");
            p.height_cm = num("height_cm", p.height_cm);
            p.foot = row.text("foot").unwrap_or_else(|| p.foot.clone());
            p.external_rating = row.number("external_rating");
            p.sources = SourceCoverage {
                statistics: flag("source_statistics"),
                market: flag("source_market"),
                salary: flag("source_salary"),
            };
            p.metrics = row
                .iter()
                .filter_map(|(col, cell)| {
                    let metric = col.strip_prefix(METRIC_PREFIX)?;
                    Some((metric.to_string(), cell.as_number()))
                })
                .collect::<BTreeMap<_, _>>();
            Some(p)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Cell)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn foot_labels() {
        assert_eq!(canonical_foot("izquierdo"), Some("Left"));
        assert_eq!(canonical_foot("Right"), Some("Right"));
        assert_eq!(canonical_foot("?"), None);
    }

    #[test]
    fn metric_columns_skip_fields_and_metadata() {
        let ds: Dataset = std::iter::once(row(&[
            ("Player", "A".into()),
            ("Season", "2024-2025".into()),
            ("Gls/90", 0.5.into()),
            ("Custom", 3.0.into()),
            ("Nationality", "ESP".into()),
            ("_league", "x".into()),
        ]))
        .collect();
        let cols = metric_columns(&ds);
        let names: Vec<&str> = cols.iter().map(|(_, m)| m.as_str()).collect();
        assert_eq!(names, vec!["Custom", "Goals_90"]);
    }

    #[test]
    fn population_round_trips_through_dataset() {
        let mut p = PlayerRecord::with_defaults("Álvaro Test", 2027);
        p.position = Position::LB;
        p.profile = Some("Attacking Fullback".into());
        p.metrics.insert("Crosses_90".into(), Some(2.5));
        p.metrics.insert("Odd".into(), None);
        p.sources.market = true;
        p.release_clause_value = Some(60.0);
        p.has_release_clause = true;
        let back = population_from_dataset(&population_to_dataset(std::slice::from_ref(&p)));
        assert_eq!(back, vec![p]);
    }
}
