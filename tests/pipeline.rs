use scout_ratings::cache_store::{CacheStore, FileCacheStore, Invalidate, SqliteCacheStore};
use scout_ratings::config::{CacheBackend, RatingConfig, Season};
use scout_ratings::demo_sources::write_demo_tree;
use scout_ratings::error::PipelineError;
use scout_ratings::export::{write_csv, write_xlsx};
use scout_ratings::pipeline::{Pipeline, SourceRoots, open_store};

fn config(season: Season, cache: &std::path::Path) -> RatingConfig {
    let mut cfg = RatingConfig::for_season(season);
    cfg.cache_dir = Some(cache.to_path_buf());
    cfg
}

#[test]
fn demo_tree_rates_end_to_end_and_second_run_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let season = Season::starting(2024);
    let data = dir.path().join("data");
    let demo = write_demo_tree(&data, season, 60, 11).unwrap();
    assert_eq!(demo.players, 60);

    let cfg = config(season, &dir.path().join("cache"));
    let store = FileCacheStore::new(dir.path().join("cache"));
    let pipeline = Pipeline::from_config(&cfg, &store).unwrap();
    let roots = SourceRoots::under(&data);

    let (players, report) = pipeline.run(&roots).unwrap();
    assert_eq!(players.len(), 60);
    assert_eq!(report.sources.len(), 3);
    assert!(report.sources.iter().all(|s| !s.from_cache));
    assert!(!report.consolidated_from_cache);
    let consolidation = report.consolidation.as_ref().unwrap();
    assert_eq!(consolidation.market.matched(), 60);
    assert_eq!(consolidation.salary.matched(), 60);
    assert!(players.iter().all(|p| p.final_rating.is_some_and(|r| (40..=99).contains(&r))));
    assert!(players.iter().any(|p| p.final_rating >= Some(92)));

    let (again, report) = pipeline.run(&roots).unwrap();
    assert!(report.sources.iter().all(|s| s.from_cache));
    assert!(report.consolidated_from_cache);
    let finals = |ps: &[scout_ratings::player::PlayerRecord]| {
        ps.iter()
            .map(|p| (p.name.clone(), p.final_rating))
            .collect::<Vec<_>>()
    };
    assert_eq!(finals(&again), finals(&players));

    let keys = store.keys();
    assert!(keys.contains(&"statistics_2024-2025".to_string()));
    assert!(keys.iter().any(|k| k.starts_with("consolidated_2024-2025_")));
}

#[test]
fn missing_sources_surface_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let season = Season::starting(2024);
    let cfg = config(season, &dir.path().join("cache"));
    let store = SqliteCacheStore::in_memory().unwrap();
    let pipeline = Pipeline::from_config(&cfg, &store).unwrap();
    let err = pipeline
        .run(&SourceRoots::under(&dir.path().join("absent")))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Consolidate(_) | PipelineError::EmptyPopulation
    ));
}

#[test]
fn invalidation_forces_reingestion() {
    let dir = tempfile::tempdir().unwrap();
    let season = Season::starting(2024);
    let data = dir.path().join("data");
    write_demo_tree(&data, season, 25, 3).unwrap();
    let mut cfg = config(season, &dir.path().join("cache"));
    cfg.cache_backend = CacheBackend::Sqlite;
    let store = open_store(&cfg).unwrap();
    let pipeline = Pipeline::from_config(&cfg, store.as_ref()).unwrap();
    let roots = SourceRoots::under(&data);

    pipeline.run(&roots).unwrap();
    assert!(store.invalidate(Invalidate::All).unwrap() >= 4);
    let (_, report) = pipeline.run(&roots).unwrap();
    assert!(report.sources.iter().all(|s| !s.from_cache));
    assert!(!report.consolidated_from_cache);
}

#[test]
fn exports_write_every_player() {
    let dir = tempfile::tempdir().unwrap();
    let season = Season::starting(2024);
    let data = dir.path().join("data");
    write_demo_tree(&data, season, 30, 5).unwrap();
    let cfg = config(season, &dir.path().join("cache"));
    let store = FileCacheStore::new(dir.path().join("cache"));
    let pipeline = Pipeline::from_config(&cfg, &store).unwrap();
    let (players, report) = pipeline.run(&SourceRoots::under(&data)).unwrap();

    let csv_path = dir.path().join("ratings.csv");
    let written = write_csv(&csv_path, &players).unwrap();
    assert_eq!(written.players, 30);
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    assert_eq!(reader.headers().unwrap().get(0), Some("Player"));
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 30);
    let first: u8 = rows[0].get(11).unwrap().parse().unwrap();
    let last: u8 = rows[29].get(11).unwrap().parse().unwrap();
    assert!(first >= last);

    let xlsx_path = dir.path().join("ratings.xlsx");
    let written = write_xlsx(&xlsx_path, &players, &report).unwrap();
    assert_eq!(written.players, 30);
    assert!(written.summary_rows > 0);
    assert!(std::fs::metadata(&xlsx_path).unwrap().len() > 0);
}
