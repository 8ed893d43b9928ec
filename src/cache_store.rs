use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::error::CacheError;

const CACHE_VERSION: u32 = 1;
const ENTRY_EXT: &str = "json";

/// A persisted source extract. Entries never expire; only an operator
/// `invalidate` removes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub key: String,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the serialized payload.
    pub fingerprint: String,
    pub payload: Dataset,
}

impl CacheEntry {
    fn new(key: &str, payload: &Dataset) -> Result<Self, CacheError> {
        Ok(Self {
            version: CACHE_VERSION,
            key: key.to_string(),
            created_at: Utc::now(),
            fingerprint: fingerprint(payload)?,
            payload: payload.clone(),
        })
    }

    fn is_intact(&self, key: &str) -> bool {
        self.version == CACHE_VERSION
            && self.key == key
            && fingerprint(&self.payload).is_ok_and(|fp| fp == self.fingerprint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidate<'a> {
    Key(&'a str),
    All,
}

impl<'a> Invalidate<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            Invalidate::All
        } else {
            Invalidate::Key(trimmed)
        }
    }
}

/// Persistent key/value store of materialized tabular datasets.
///
/// Any read or decode failure is reported as a miss so the caller re-ingests.
/// `put` overwrites (last writer wins).
pub trait CacheStore {
    fn entry(&self, key: &str) -> Option<CacheEntry>;

    fn put(&self, key: &str, payload: &Dataset) -> Result<CacheEntry, CacheError>;

    /// Returns how many entries were removed.
    fn invalidate(&self, target: Invalidate<'_>) -> Result<usize, CacheError>;

    fn keys(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Option<Dataset> {
        self.entry(key).map(|entry| entry.payload)
    }
}

pub fn fingerprint(payload: &Dataset) -> Result<String, CacheError> {
    let raw = serde_json::to_vec(payload)?;
    Ok(format!("{:x}", Sha256::digest(&raw)))
}

// ---------------------------------------------------------------------------
// JSON files, one per key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{ENTRY_EXT}", file_stem(key)))
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        let Ok(read) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = read
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == ENTRY_EXT))
            .collect();
        files.sort();
        files
    }
}

impl CacheStore for FileCacheStore {
    fn entry(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let meta = fs::metadata(&path).ok()?;
        if meta.len() == 0 {
            return None;
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, path = %path.display(), %err, "cache entry unreadable, treating as miss");
                return None;
            }
        };
        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, path = %path.display(), %err, "cache entry corrupt, treating as miss");
                return None;
            }
        };
        if !entry.is_intact(key) {
            warn!(key, path = %path.display(), "cache entry failed integrity check, treating as miss");
            return None;
        }
        debug!(key, rows = entry.payload.len(), "cache hit");
        Some(entry)
    }

    fn put(&self, key: &str, payload: &Dataset) -> Result<CacheEntry, CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let entry = CacheEntry::new(key, payload)?;
        let json = serde_json::to_string(&entry)?;
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(key, rows = payload.len(), path = %path.display(), "cache entry written");
        Ok(entry)
    }

    fn invalidate(&self, target: Invalidate<'_>) -> Result<usize, CacheError> {
        let paths = match target {
            Invalidate::Key(key) => vec![self.entry_path(key)],
            Invalidate::All => self.entry_files(),
        };
        let mut removed = 0usize;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }
        Ok(removed)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entry_files()
            .iter()
            .filter_map(|path| fs::read_to_string(path).ok())
            .filter_map(|raw| serde_json::from_str::<CacheEntry>(&raw).ok())
            .map(|entry| entry.key)
            .collect();
        keys.sort();
        keys
    }
}

/// Readable, filesystem-safe stem that still separates keys differing only
/// in punctuation.
fn file_stem(key: &str) -> String {
    let slug: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
    format!("{slug}-{}", &digest[..8])
}

// ---------------------------------------------------------------------------
// SQLite, one row per key
// ---------------------------------------------------------------------------

pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_row(&self, key: &str) -> rusqlite::Result<Option<(u32, String, String, String)>> {
        let Ok(conn) = self.conn.lock() else {
            return Ok(None);
        };
        conn.query_row(
            "SELECT version, created_at, fingerprint, payload FROM cache_entries WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()
    }
}

impl CacheStore for SqliteCacheStore {
    fn entry(&self, key: &str) -> Option<CacheEntry> {
        let (version, created_at, fingerprint, payload) = match self.read_row(key) {
            Ok(row) => row?,
            Err(err) => {
                warn!(key, %err, "cache row unreadable, treating as miss");
                return None;
            }
        };
        if payload.is_empty() {
            return None;
        }
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .ok()?
            .with_timezone(&Utc);
        let payload = match serde_json::from_str::<Dataset>(&payload) {
            Ok(p) => p,
            Err(err) => {
                warn!(key, %err, "cache payload corrupt, treating as miss");
                return None;
            }
        };
        let entry = CacheEntry {
            version,
            key: key.to_string(),
            created_at,
            fingerprint,
            payload,
        };
        if !entry.is_intact(key) {
            warn!(key, "cache row failed integrity check, treating as miss");
            return None;
        }
        Some(entry)
    }

    fn put(&self, key: &str, payload: &Dataset) -> Result<CacheEntry, CacheError> {
        let entry = CacheEntry::new(key, payload)?;
        let json = serde_json::to_string(&entry.payload)?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| CacheError::Database(rusqlite::Error::InvalidQuery))?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries(key, version, created_at, fingerprint, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.key,
                entry.version,
                entry.created_at.to_rfc3339(),
                entry.fingerprint,
                json
            ],
        )?;
        Ok(entry)
    }

    fn invalidate(&self, target: Invalidate<'_>) -> Result<usize, CacheError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CacheError::Database(rusqlite::Error::InvalidQuery))?;
        let removed = match target {
            Invalidate::Key(key) => {
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?
            }
            Invalidate::All => conn.execute("DELETE FROM cache_entries", [])?,
        };
        Ok(removed)
    }

    fn keys(&self) -> Vec<String> {
        let Ok(conn) = self.conn.lock() else {
            return Vec::new();
        };
        let Ok(mut stmt) = conn.prepare("SELECT key FROM cache_entries ORDER BY key") else {
            return Vec::new();
        };
        stmt.query_map([], |row| row.get::<_, String>(0))
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_is_stable_and_safe() {
        let a = file_stem("statistics_2024-2025");
        assert_eq!(a, file_stem("statistics_2024-2025"));
        assert!(a.starts_with("statistics_2024-2025-"));
        assert_ne!(file_stem("a/b"), file_stem("a?b"));
        assert!(!file_stem("../etc").contains('/'));
    }

    #[test]
    fn invalidate_parse_recognizes_all() {
        assert_eq!(Invalidate::parse(" ALL "), Invalidate::All);
        assert_eq!(Invalidate::parse("salary_2024-2025"), Invalidate::Key("salary_2024-2025"));
    }
}
