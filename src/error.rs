use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a [`crate::cache_store::CacheStore`] backend on write or
/// removal. Read failures never surface: they are cache misses.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("cache directory could not be resolved")]
    NoCacheDir,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source root {path} does not exist")]
    MissingRoot { path: PathBuf },
    #[error("failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-player scoring failures. The engine maps any of these to the neutral
/// rating; they are kept typed so tests can assert the cause.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error("metric '{metric}' has non-finite value {value}")]
    NonFiniteMetric { metric: String, value: f64 },
    #[error("metric '{metric}' has invalid weight {weight}")]
    InvalidWeight { metric: String, weight: f64 },
    #[error("composite score is not finite")]
    NonFiniteComposite,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsolidateError {
    #[error("statistics and market datasets are both empty")]
    NoSpine,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("population is empty after ingestion and consolidation")]
    EmptyPopulation,
    #[error(transparent)]
    Consolidate(#[from] ConsolidateError),
}
