use std::fs;

use scout_ratings::identity::{
    CandidateIndex, IdentityMatcher, MatchKind, load_overrides, normalize_name,
};

fn index(names: &[&str]) -> CandidateIndex {
    CandidateIndex::new(names.iter())
}

#[test]
fn normalization_is_idempotent() {
    for raw in ["  Luka  MODRIĆ ", "N'Golo Kanté", "Thiago Alcântara do Nascimento", "Ødegaard"] {
        let once = normalize_name(raw);
        assert_eq!(normalize_name(&once), once);
    }
    assert_eq!(normalize_name("N'Golo Kanté"), "ngolo kante");
    assert_eq!(normalize_name("Kevin De-Bruyne"), "kevin de bruyne");
}

#[test]
fn override_beats_exact() {
    let candidates = index(&["Vinícius Júnior", "Vini Jr"]);
    let matcher = IdentityMatcher::new([("Vini Jr", "Vinicius Junior")], 80.0);
    let found = matcher.resolve("Vini Jr.", &candidates).unwrap();
    assert_eq!(found.index, 0);
    assert_eq!(found.kind, MatchKind::Override);
}

#[test]
fn exact_beats_last_name_and_first_duplicate_wins() {
    let candidates = index(&["Rodrygo Goes", "Luka Modric", "Luka Modrić"]);
    let found = IdentityMatcher::default()
        .resolve("LUKA MODRIĆ", &candidates)
        .unwrap();
    assert_eq!(found.index, 1);
    assert_eq!(found.kind, MatchKind::Exact);
}

#[test]
fn last_name_containment() {
    let candidates = index(&["Pedro González López", "Pedri"]);
    let found = IdentityMatcher::default()
        .resolve("Pedri Gonzalez", &candidates)
        .unwrap();
    assert_eq!(found.index, 0);
    assert_eq!(found.kind, MatchKind::LastName);

    // Initials are too short to count as surnames.
    let candidates = index(&["Joao Felix"]);
    assert!(IdentityMatcher::default().resolve("X J", &candidates).is_none());
}

#[test]
fn fuzzy_match_above_threshold_only() {
    let candidates = index(&["Erling Haaland", "Martin Ødegaard"]);
    let found = IdentityMatcher::default()
        .resolve("Erling Halland", &candidates)
        .unwrap();
    assert_eq!(found.index, 0);
    match found.kind {
        MatchKind::Fuzzy { score } => assert!(score > 80.0 && score < 100.0),
        other => panic!("expected fuzzy match, got {other:?}"),
    }

    assert!(IdentityMatcher::default().resolve("Xavi", &candidates).is_none());
    let strict = IdentityMatcher::new(Vec::<(String, String)>::new(), 95.0);
    assert!(strict.resolve("Erling Halland", &candidates).is_none());
}

#[test]
fn fuzzy_ties_go_to_first_candidate() {
    let candidates = index(&["Jon Smitha", "Jon Smithe"]);
    let found = IdentityMatcher::default()
        .resolve("Jon Smithx", &candidates)
        .unwrap();
    assert_eq!(found.index, 0);
}

#[test]
fn overrides_load_from_json_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("overrides.json");
    fs::write(&json, r#"[["Vini Jr", "Vinicius Junior"], ["Rodri", "Rodrigo Hernandez"]]"#).unwrap();
    assert_eq!(load_overrides(&json).unwrap().len(), 2);

    let map = dir.path().join("map.json");
    fs::write(&map, r#"{"Vini Jr": "Vinicius Junior"}"#).unwrap();
    assert_eq!(load_overrides(&map).unwrap().len(), 1);

    let csv = dir.path().join("overrides.csv");
    fs::write(&csv, "alias,canonical\nVini Jr,Vinicius Junior\n").unwrap();
    let pairs = load_overrides(&csv).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].0, "Vini Jr");
}
