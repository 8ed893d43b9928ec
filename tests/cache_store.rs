use std::fs;

use scout_ratings::cache_store::{CacheStore, FileCacheStore, Invalidate, SqliteCacheStore};
use scout_ratings::dataset::{Cell, Dataset, Row};

fn sample(names: &[&str]) -> Dataset {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut row = Row::new();
            row.insert("Player", *name);
            row.insert("Gls/90", 0.1 * (idx as f64 + 1.0) + 0.2);
            row.insert("Cláusula", idx % 2 == 0);
            row.insert("Notes", Cell::Empty);
            row
        })
        .collect()
}

fn check_contract(store: &dyn CacheStore) {
    assert!(store.get("statistics_2024-2025").is_none());

    let stats = sample(&["Pedri", "Gavi"]);
    let market = sample(&["Bellingham"]);
    store.put("statistics_2024-2025", &stats).unwrap();
    store.put("market_2024-2025", &market).unwrap();
    assert_eq!(store.get("statistics_2024-2025"), Some(stats.clone()));
    assert_eq!(
        store.keys(),
        vec!["market_2024-2025".to_string(), "statistics_2024-2025".to_string()]
    );

    // Last writer wins.
    let replaced = sample(&["Pedri", "Gavi", "Fermín"]);
    store.put("statistics_2024-2025", &replaced).unwrap();
    assert_eq!(store.get("statistics_2024-2025"), Some(replaced));

    let entry = store.entry("market_2024-2025").unwrap();
    assert_eq!(entry.key, "market_2024-2025");
    assert_eq!(entry.fingerprint.len(), 64);

    assert_eq!(store.invalidate(Invalidate::Key("market_2024-2025")).unwrap(), 1);
    assert_eq!(store.invalidate(Invalidate::Key("market_2024-2025")).unwrap(), 0);
    assert!(store.get("market_2024-2025").is_none());

    store.put("salary_2024-2025", &sample(&["Lewandowski"])).unwrap();
    assert_eq!(store.invalidate(Invalidate::parse("ALL")).unwrap(), 2);
    assert!(store.keys().is_empty());
}

#[test]
fn file_store_honours_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCacheStore::new(dir.path().join("nested").join("cache"));
    check_contract(&store);
}

#[test]
fn sqlite_store_honours_contract() {
    let store = SqliteCacheStore::in_memory().unwrap();
    check_contract(&store);
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");
    let stats = sample(&["Rodri"]);
    {
        let store = SqliteCacheStore::open(&path).unwrap();
        store.put("statistics_2024-2025", &stats).unwrap();
    }
    let store = SqliteCacheStore::open(&path).unwrap();
    assert_eq!(store.get("statistics_2024-2025"), Some(stats));
}

#[test]
fn corrupt_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCacheStore::new(dir.path());
    store.put("statistics_2024-2025", &sample(&["Pedri"])).unwrap();
    let path = store.entry_path("statistics_2024-2025");
    fs::write(&path, "{not json").unwrap();
    assert!(store.get("statistics_2024-2025").is_none());

    // A fresh put recovers.
    store.put("statistics_2024-2025", &sample(&["Pedri"])).unwrap();
    assert!(store.get("statistics_2024-2025").is_some());
}

#[test]
fn zero_size_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCacheStore::new(dir.path());
    fs::write(store.entry_path("salary_2024-2025"), "").unwrap();
    assert!(store.get("salary_2024-2025").is_none());
}

#[test]
fn tampered_payload_fails_integrity_check() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCacheStore::new(dir.path());
    store.put("market_2024-2025", &sample(&["Saka"])).unwrap();
    let path = store.entry_path("market_2024-2025");
    let raw = fs::read_to_string(&path).unwrap();
    fs::write(&path, raw.replace("Saka", "Rice")).unwrap();
    assert!(store.get("market_2024-2025").is_none());
}

#[test]
fn entry_paths_separate_similar_keys() {
    let store = FileCacheStore::new("/tmp/unused");
    assert_ne!(store.entry_path("a/b"), store.entry_path("a_b"));
}
