use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::aliases::{Field, field_text};
use crate::cache_store::CacheStore;
use crate::config::Season;
use crate::dataset::{Cell, Dataset, Row};
use crate::error::IngestError;

pub const COL_LEAGUE: &str = "_league";
pub const COL_CLUB: &str = "_club";
pub const COL_SOURCE_FILE: &str = "_source_file";
pub const COL_SOURCE: &str = "_source";

const JSON_ROW_KEYS: &[&str] = &["players", "data", "rows"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    Statistics,
    Market,
    Salary,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Statistics, SourceKind::Market, SourceKind::Salary];

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Statistics => "statistics",
            SourceKind::Market => "market",
            SourceKind::Salary => "salary",
        }
    }

    /// One extract per source and season, e.g. `statistics_2024-2025`.
    pub fn cache_key(self, season: Season) -> String {
        format!("{}_{}", self.label(), season.slug())
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub kind: SourceKind,
    pub from_cache: bool,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_wrong_season: usize,
    pub rows_skipped: usize,
    pub errors: Vec<String>,
}

impl IngestReport {
    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            from_cache: false,
            files_scanned: 0,
            files_skipped: 0,
            rows_read: 0,
            rows_kept: 0,
            rows_wrong_season: 0,
            rows_skipped: 0,
            errors: Vec::new(),
        }
    }
}

/// Loads one source type from a `<root>/<league>/<club>/<file>` tree, going
/// through the cache first.
pub struct SourceIngestor<'a> {
    kind: SourceKind,
    season: Season,
    store: &'a dyn CacheStore,
}

impl<'a> SourceIngestor<'a> {
    pub fn new(kind: SourceKind, season: Season, store: &'a dyn CacheStore) -> Self {
        Self {
            kind,
            season,
            store,
        }
    }

    pub fn cache_key(&self) -> String {
        self.kind.cache_key(self.season)
    }

    pub fn ingest(&self, root: &Path) -> Result<(Dataset, IngestReport), IngestError> {
        let key = self.cache_key();
        let mut report = IngestReport::new(self.kind);

        if let Some(cached) = self.store.get(&key) {
            report.from_cache = true;
            report.rows_kept = cached.len();
            debug!(source = %self.kind, key = %key, rows = cached.len(), "source served from cache");
            return Ok((cached, report));
        }

        if !root.is_dir() {
            return Err(IngestError::MissingRoot {
                path: root.to_path_buf(),
            });
        }

        let files = source_files(root)?;
        let mut dataset = Dataset::new();
        for file in files {
            report.files_scanned += 1;
            let rel = file
                .strip_prefix(root)
                .unwrap_or(file.as_path())
                .to_string_lossy()
                .replace('\\', "/");
            let rows = match read_table(&file, &mut report.rows_skipped) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(source = %self.kind, file = %rel, err = %format!("{err:#}"), "skipping unreadable source file");
                    report.files_skipped += 1;
                    report.errors.push(format!("{rel}: {err:#}"));
                    continue;
                }
            };
            let (league, club) = partition_labels(&rel);
            for mut row in rows {
                report.rows_read += 1;
                if field_text(&row, Field::Name).is_none() {
                    report.rows_skipped += 1;
                    continue;
                }
                let season = field_text(&row, Field::Season).and_then(|s| Season::parse(&s));
                if season != Some(self.season) {
                    report.rows_wrong_season += 1;
                    continue;
                }
                row.insert(COL_LEAGUE, league.clone());
                row.insert(COL_CLUB, club.clone());
                row.insert(COL_SOURCE_FILE, rel.clone());
                row.insert(COL_SOURCE, self.kind.label());
                dataset.push(row);
                report.rows_kept += 1;
            }
        }

        if dataset.is_empty() {
            warn!(source = %self.kind, root = %root.display(), season = %self.season, "source produced no rows, not caching");
        } else if let Err(err) = self.store.put(&key, &dataset) {
            warn!(source = %self.kind, key = %key, %err, "failed to write source cache");
            report.errors.push(format!("cache write {key}: {err}"));
        }
        info!(
            source = %self.kind,
            files = report.files_scanned,
            skipped_files = report.files_skipped,
            rows = report.rows_kept,
            wrong_season = report.rows_wrong_season,
            skipped_rows = report.rows_skipped,
            "source ingested"
        );
        Ok((dataset, report))
    }
}

/// Supported files under `root`, sorted by path at every level.
fn source_files(root: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let read = fs::read_dir(&dir).map_err(|source| IngestError::ReadDir {
            path: dir.clone(),
            source,
        })?;
        let mut entries: Vec<PathBuf> = read.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        entries.sort();
        for path in entries {
            if path.is_dir() {
                stack.push(path);
            } else if TableFormat::of(&path).is_some() {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// League and club from a relative `league/club/file` path.
fn partition_labels(rel: &str) -> (String, String) {
    let parts: Vec<&str> = rel.split('/').collect();
    let dirs = &parts[..parts.len().saturating_sub(1)];
    let league = dirs.first().copied().unwrap_or_default().to_string();
    let club = dirs.get(1).copied().unwrap_or_default().to_string();
    (league, club)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Json,
}

impl TableFormat {
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(TableFormat::Csv),
            "tsv" => Some(TableFormat::Tsv),
            "json" => Some(TableFormat::Json),
            _ => None,
        }
    }
}

/// Parses one source file. Rows that fail to decode are counted in
/// `rows_skipped` and left out.
pub fn read_table(path: &Path, rows_skipped: &mut usize) -> Result<Vec<Row>> {
    let format = TableFormat::of(path).ok_or_else(|| anyhow!("unsupported file type"))?;
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let raw = raw.trim_start_matches('\u{feff}');
    match format {
        TableFormat::Json => json_rows(raw, rows_skipped),
        TableFormat::Tsv => delimited_rows(raw, b'\t', rows_skipped),
        TableFormat::Csv => delimited_rows(raw, sniff_delimiter(raw), rows_skipped),
    }
}

fn sniff_delimiter(raw: &str) -> u8 {
    let header = raw.lines().next().unwrap_or_default();
    let count = |c: char| header.matches(c).count();
    if count(';') > count(',') {
        b';'
    } else if count('\t') > count(',') {
        b'\t'
    } else {
        b','
    }
}

fn delimited_rows(raw: &str, delimiter: u8, rows_skipped: &mut usize) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let headers = reader.headers().context("read header row")?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        bail!("header row is empty");
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else {
            *rows_skipped += 1;
            continue;
        };
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.to_string(), Cell::parse(v)))
            .collect();
        if row.iter().all(|(_, c)| c.is_empty()) {
            *rows_skipped += 1;
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn json_rows(raw: &str, rows_skipped: &mut usize) -> Result<Vec<Row>> {
    let value: Value = serde_json::from_str(raw).context("parse json")?;
    let items: Vec<&Value> = match &value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match JSON_ROW_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
        {
            Some(items) => items.iter().collect(),
            None => vec![&value],
        },
        _ => bail!("expected a JSON array or object"),
    };
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Some(obj) = item.as_object() else {
            *rows_skipped += 1;
            continue;
        };
        let row: Row = obj
            .iter()
            .filter_map(|(k, v)| Cell::from_json(v).map(|c| (k.clone(), c)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
