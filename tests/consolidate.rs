use scout_ratings::consolidate::{Consolidator, MISSING_METRIC_FLOOR};
use scout_ratings::dataset::{Cell, Dataset, Row};
use scout_ratings::error::ConsolidateError;
use scout_ratings::identity::IdentityMatcher;
use scout_ratings::ingest::{COL_CLUB, COL_LEAGUE, SourceKind};
use scout_ratings::player::Position;

fn row(pairs: &[(&str, Cell)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn consolidator() -> Consolidator {
    Consolidator::new(IdentityMatcher::default(), 2026)
}

fn statistics() -> Dataset {
    vec![
        row(&[
            ("Player", "Luka Modrić".into()),
            ("Pos", "MF".into()),
            ("Age", 38.0.into()),
            ("Min", 1800.0.into()),
            ("Gls/90", 0.08.into()),
            ("KP/90", 1.9.into()),
            ("Cmp%", 90.1.into()),
            (COL_LEAGUE, "la_liga".into()),
            (COL_CLUB, "real_madrid".into()),
        ]),
        row(&[
            ("Player", "Unmatched Youngster".into()),
            ("Gls/90", Cell::Empty),
            ("KP/90", 0.4.into()),
            (COL_LEAGUE, "la_liga".into()),
            (COL_CLUB, "getafe".into()),
        ]),
    ]
    .into_iter()
    .collect()
}

fn market() -> Dataset {
    std::iter::once(row(&[
        ("name", "Luka Modric".into()),
        ("market_value", "€5.0m".into()),
        ("contract_expires", "30/06/2025".into()),
        ("position", "Central Midfield".into()),
        ("height", 1.72.into()),
        ("foot", "right".into()),
        ("league", "LaLiga".into()),
    ]))
    .collect()
}

fn salary() -> Dataset {
    std::iter::once(row(&[
        ("Jugador", "L. Modric".into()),
        ("Salario", "10.500.000".into()),
        ("Cláusula", "Sí".into()),
    ]))
    .collect()
}

#[test]
fn statistics_spine_merges_matched_sources() {
    let (players, report) = consolidator()
        .consolidate(&statistics(), &market(), &salary())
        .unwrap();
    assert_eq!(report.spine, SourceKind::Statistics);
    assert_eq!(players.len(), 2);
    assert_eq!(report.market.matched(), 1);

    let modric = &players[0];
    assert_eq!(modric.canonical_key, "luka modric");
    assert_eq!(modric.position, Position::CM);
    assert_eq!(modric.age, 38);
    assert_eq!(modric.minutes_played, 1800.0);
    // Statistics metadata outranks the market's league column.
    assert_eq!(modric.league, "la_liga");
    assert_eq!(modric.club, "real_madrid");
    assert_eq!(modric.market_value, 5.0);
    assert_eq!(modric.contract_end_year, 2025);
    assert!((modric.height_cm - 172.0).abs() < 1e-9);
    assert_eq!(modric.salary_annual, 10_500_000.0);
    assert!(modric.has_release_clause);
    assert!(modric.sources.statistics && modric.sources.market && modric.sources.salary);
    assert_eq!(modric.metric("Goals_90"), Some(0.08));
    assert_eq!(modric.metric("Key_Passes_90"), Some(1.9));
    assert_eq!(modric.metric("Pass_Completion_Pct"), Some(90.1));
}

#[test]
fn unmatched_player_keeps_documented_defaults() {
    let (players, report) = consolidator()
        .consolidate(&statistics(), &market(), &salary())
        .unwrap();
    let youngster = &players[1];
    assert_eq!(youngster.age, 25);
    assert_eq!(youngster.position, Position::Unknown);
    assert_eq!(youngster.market_value, 5.0);
    assert_eq!(youngster.salary_annual, 1_000_000.0);
    assert_eq!(youngster.contract_end_year, 2026);
    assert!(!youngster.has_release_clause);
    assert_eq!(youngster.height_cm, 175.0);
    assert_eq!(youngster.foot, "Right");
    assert_eq!(youngster.minutes_played, 2700.0);
    assert!(!youngster.sources.market);
    // Missing per-90 values get a small non-zero floor.
    assert_eq!(youngster.metric("Goals_90"), Some(MISSING_METRIC_FLOOR));
    // Not a per-90 column, so nothing is imputed.
    assert_eq!(youngster.metric("Pass_Completion_Pct"), None);
    assert!(report.imputed_metrics >= 1);
}

#[test]
fn market_becomes_spine_without_statistics() {
    let (players, report) = consolidator()
        .consolidate(&Dataset::new(), &market(), &salary())
        .unwrap();
    assert_eq!(report.spine, SourceKind::Market);
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].name, "Luka Modric");
    assert_eq!(players[0].league, "LaLiga");
    assert!(players[0].metrics.is_empty());
    assert!(players[0].sources.salary);
}

#[test]
fn no_spine_is_an_error() {
    let err = consolidator()
        .consolidate(&Dataset::new(), &Dataset::new(), &salary())
        .unwrap_err();
    assert_eq!(err, ConsolidateError::NoSpine);
}

#[test]
fn spanish_salary_formats_keep_their_magnitude() {
    let salaries: Dataset = [
        ("L. Modric", Cell::parse("750.000")),
        ("Unmatched Youngster", Cell::parse("500 mil €")),
    ]
    .into_iter()
    .map(|(name, amount)| row(&[("Jugador", name.into()), ("Salario", amount)]))
    .collect();
    let (players, report) = consolidator()
        .consolidate(&statistics(), &market(), &salaries)
        .unwrap();
    assert_eq!(report.salary.matched(), 2);
    assert_eq!(players[0].salary_annual, 750_000.0);
    assert_eq!(players[1].salary_annual, 500_000.0);
}
