use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::cache_store::{CacheStore, FileCacheStore, SqliteCacheStore, fingerprint};
use crate::config::{CacheBackend, RatingConfig, Season};
use crate::consolidate::{
    ConsolidationReport, Consolidator, population_from_dataset, population_to_dataset,
};
use crate::dataset::Dataset;
use crate::error::{CacheError, PipelineError};
use crate::identity::{IdentityMatcher, load_overrides};
use crate::ingest::{IngestReport, SourceIngestor, SourceKind};
use crate::player::PlayerRecord;
use crate::profiles::ProfileCatalog;
use crate::rating::{RatingEngine, RatingReport};

const SQLITE_FILE: &str = "cache.sqlite";

/// Root directory of each source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoots {
    pub statistics: PathBuf,
    pub market: PathBuf,
    pub salary: PathBuf,
}

impl SourceRoots {
    /// `<data_dir>/statistics`, `<data_dir>/market`, `<data_dir>/salary`.
    pub fn under(data_dir: &Path) -> Self {
        Self {
            statistics: data_dir.join(SourceKind::Statistics.label()),
            market: data_dir.join(SourceKind::Market.label()),
            salary: data_dir.join(SourceKind::Salary.label()),
        }
    }

    pub fn root(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Statistics => &self.statistics,
            SourceKind::Market => &self.market,
            SourceKind::Salary => &self.salary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub season: Season,
    pub sources: Vec<IngestReport>,
    pub consolidated_key: Option<String>,
    pub consolidated_from_cache: bool,
    pub consolidation: Option<ConsolidationReport>,
    pub rating: RatingReport,
}

/// Ingest -> consolidate -> score -> redistribute, as ordered phases.
pub struct Pipeline<'a> {
    season: Season,
    store: &'a dyn CacheStore,
    consolidator: Consolidator,
    engine: RatingEngine,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        season: Season,
        store: &'a dyn CacheStore,
        consolidator: Consolidator,
        engine: RatingEngine,
    ) -> Self {
        Self {
            season,
            store,
            consolidator,
            engine,
        }
    }

    /// Builds the collaborators from configuration, loading the override
    /// table and profile catalog when paths are set.
    pub fn from_config(cfg: &RatingConfig, store: &'a dyn CacheStore) -> anyhow::Result<Self> {
        let overrides = match &cfg.overrides_path {
            Some(path) => load_overrides(path)?,
            None => Vec::new(),
        };
        let matcher = IdentityMatcher::new(overrides, cfg.fuzzy_threshold);
        let catalog = match &cfg.profiles_path {
            Some(path) => ProfileCatalog::from_json_file(path)?,
            None => ProfileCatalog::default(),
        };
        info!(
            season = %cfg.season,
            overrides = matcher.override_count(),
            profiles = catalog.len(),
            inverse_normal = ?cfg.inverse_normal,
            "pipeline configured"
        );
        Ok(Self::new(
            cfg.season,
            store,
            Consolidator::new(matcher, cfg.default_contract_end_year()),
            RatingEngine::from_config(cfg, catalog),
        ))
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }

    pub fn run(
        &self,
        roots: &SourceRoots,
    ) -> Result<(Vec<PlayerRecord>, PipelineReport), PipelineError> {
        let mut reports = Vec::with_capacity(SourceKind::ALL.len());
        let mut ingest = |kind: SourceKind| -> Dataset {
            let ingestor = SourceIngestor::new(kind, self.season, self.store);
            match ingestor.ingest(roots.root(kind)) {
                Ok((dataset, report)) => {
                    reports.push(report);
                    dataset
                }
                Err(err) => {
                    warn!(source = %kind, %err, "source unavailable, continuing with an empty dataset");
                    Dataset::new()
                }
            }
        };
        let statistics = ingest(SourceKind::Statistics);
        let market = ingest(SourceKind::Market);
        let salary = ingest(SourceKind::Salary);

        let key = self.consolidated_key(&statistics, &market, &salary);
        let cached = key
            .as_deref()
            .and_then(|k| self.store.get(k))
            .map(|ds| population_from_dataset(&ds))
            .filter(|players| !players.is_empty());

        let (mut players, consolidation, from_cache) = match cached {
            Some(players) => {
                info!(players = players.len(), "consolidated population served from cache");
                (players, None, true)
            }
            None => {
                let (players, report) =
                    self.consolidator.consolidate(&statistics, &market, &salary)?;
                if let Some(k) = key.as_deref()
                    && !players.is_empty()
                    && let Err(err) = self.store.put(k, &population_to_dataset(&players))
                {
                    warn!(key = k, %err, "failed to cache consolidated population");
                }
                (players, Some(report), false)
            }
        };

        if players.is_empty() {
            return Err(PipelineError::EmptyPopulation);
        }

        let rating = self.engine.rate(&mut players);
        Ok((
            players,
            PipelineReport {
                season: self.season,
                sources: reports,
                consolidated_key: key,
                consolidated_from_cache: from_cache,
                consolidation,
                rating,
            },
        ))
    }

    /// `consolidated_<season>_<hash>`, where the hash covers every source
    /// extract and the identity settings. `None` when the inputs cannot be
    /// fingerprinted.
    fn consolidated_key(
        &self,
        statistics: &Dataset,
        market: &Dataset,
        salary: &Dataset,
    ) -> Option<String> {
        let mut hasher = Sha256::new();
        for ds in [statistics, market, salary] {
            hasher.update(fingerprint(ds).ok()?.as_bytes());
            hasher.update(b"|");
        }
        hasher.update(self.consolidator.matcher().signature().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Some(format!("consolidated_{}_{}", self.season.slug(), &digest[..16]))
    }
}

/// The configured cache backend under the configured cache directory.
pub fn open_store(cfg: &RatingConfig) -> Result<Box<dyn CacheStore>, CacheError> {
    let dir = cfg.cache_dir.clone().ok_or(CacheError::NoCacheDir)?;
    let store: Box<dyn CacheStore> = match cfg.cache_backend {
        CacheBackend::Json => Box::new(FileCacheStore::new(dir)),
        CacheBackend::Sqlite => Box::new(SqliteCacheStore::open(&dir.join(SQLITE_FILE))?),
    };
    Ok(store)
}

/// Convenience wrapper used by the binary: configure, open the store, run.
pub fn run_with_config(
    cfg: &RatingConfig,
    roots: &SourceRoots,
) -> anyhow::Result<(Vec<PlayerRecord>, PipelineReport)> {
    let store = open_store(cfg).context("open cache store")?;
    let pipeline = Pipeline::from_config(cfg, store.as_ref())?;
    let out = pipeline.run(roots)?;
    Ok(out)
}
