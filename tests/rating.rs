use scout_ratings::config::{EliteFloors, FallbackTuning, Tuning};
use scout_ratings::player::{PlayerRecord, Position, RatingState, ScoreMethod};
use scout_ratings::profiles::{ProfileCatalog, ProfileWeights};
use scout_ratings::rating::compose::heuristic_rating;
use scout_ratings::rating::inverse_normal::InverseNormalKind;
use scout_ratings::rating::redistribute::{Strategy, market_floors};
use scout_ratings::rating::RatingEngine;

fn engine(kind: InverseNormalKind) -> RatingEngine {
    RatingEngine::new(ProfileCatalog::default(), Tuning::default(), kind)
}

/// Deterministic spread of players across positions, leagues and metrics.
fn population(n: usize) -> Vec<PlayerRecord> {
    (0..n)
        .map(|i| {
            let mut p = PlayerRecord::with_defaults(&format!("Player {i}"), 2026);
            p.position = Position::ALL[i % Position::ALL.len()];
            p.league = ["Premier League", "Eredivisie", "Allsvenskan"][i % 3].to_string();
            p.age = 18 + (i % 17) as u32;
            p.minutes_played = 200.0 + ((i * 37) % 3200) as f64;
            p.market_value = 0.2 + ((i * 53) % 180) as f64 * 0.9;
            p.sources.market = true;
            let x = ((i * 29) % 100) as f64 / 100.0;
            for (metric, scale) in [
                ("Goals_90", 1.1),
                ("Assists_90", 0.6),
                ("Key_Passes_90", 3.0),
                ("Progressive_Passes_90", 9.0),
                ("Pass_Completion_Pct", 95.0),
                ("Tackles_90", 4.5),
                ("Interceptions_90", 3.0),
                ("Aerial_Win_Pct", 80.0),
                ("Save_Pct", 85.0),
                ("Saves_90", 5.0),
            ] {
                p.metrics.insert(metric.to_string(), Some(scale * x));
            }
            if i % 11 == 0 {
                p.metrics.clear();
            }
            if i % 13 == 0 {
                p.external_rating = Some(60.0 + (i % 35) as f64);
            }
            p
        })
        .collect()
}

#[test]
fn final_ratings_are_bounded_integers() {
    for kind in [InverseNormalKind::Numeric, InverseNormalKind::Rational] {
        let mut players = population(400);
        let report = engine(kind).rate(&mut players);
        assert_eq!(report.scoring.profile_scored + report.scoring.heuristic_scored, 400);
        for p in &players {
            let final_rating = p.final_rating.expect("every player is rated");
            assert!((40..=99).contains(&final_rating), "{} got {final_rating}", p.name);
            let base = p.base_rating.unwrap();
            assert!((40.0..=90.0).contains(&base));
            assert_eq!(p.rating_state, RatingState::Redistributed);
        }
    }
}

#[test]
fn a_non_empty_elite_subset_always_exists() {
    let mut players = population(200);
    let report = engine(InverseNormalKind::Numeric).rate(&mut players);
    assert!(players.iter().any(|p| p.final_rating >= Some(92)));
    let top = players
        .iter()
        .max_by(|a, b| a.market_value.total_cmp(&b.market_value))
        .unwrap();
    assert!(top.final_rating >= Some(92));
    assert!(report.redistribution.after.is_some());
}

#[test]
fn sequential_and_parallel_scoring_agree() {
    let mut seq = population(300);
    let mut par = seq.clone();
    engine(InverseNormalKind::Numeric)
        .with_parallel(false)
        .rate(&mut seq);
    engine(InverseNormalKind::Numeric)
        .with_parallel(true)
        .rate(&mut par);
    assert_eq!(seq, par);
}

#[test]
fn redistribution_is_invariant_under_positive_scaling() {
    let engine = engine(InverseNormalKind::Numeric);
    let mut players = population(250);
    engine.score_population(&mut players);
    let mut scaled = players.clone();
    for p in &mut scaled {
        p.base_rating = p.base_rating.map(|r| r * 1.7);
    }
    let a = engine.redistribute(&mut players);
    let b = engine.redistribute(&mut scaled);
    assert_eq!(a.strategy, b.strategy);
    let finals = |ps: &[PlayerRecord]| ps.iter().map(|p| p.final_rating).collect::<Vec<_>>();
    assert_eq!(finals(&players), finals(&scaled));
}

#[test]
fn degenerate_population_orders_by_market_value() {
    let engine = engine(InverseNormalKind::Numeric);
    let mut players: Vec<PlayerRecord> = [3.0, 40.0, 0.5, 12.0, 80.0]
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let mut p = PlayerRecord::with_defaults(&format!("Flat {i}"), 2026);
            p.market_value = *value;
            p.base_rating = Some(65.0);
            p
        })
        .collect();
    let report = engine.redistribute(&mut players);
    assert_eq!(report.strategy, Strategy::PercentileRank);

    let mut by_value: Vec<&PlayerRecord> = players.iter().collect();
    by_value.sort_by(|a, b| a.market_value.total_cmp(&b.market_value));
    let finals: Vec<u8> = by_value.iter().map(|p| p.final_rating.unwrap()).collect();
    assert!(finals.windows(2).all(|w| w[0] < w[1]), "{finals:?}");
    assert_eq!(finals.first(), Some(&50));
    assert_eq!(finals.last(), Some(&99));
}

#[test]
fn market_floors_are_monotone_in_market_value() {
    let values: Vec<Option<f64>> = (0..137)
        .map(|i| if i % 9 == 0 { None } else { Some(((i * 71) % 113) as f64 * 0.7) })
        .collect();
    let floors = market_floors(&values, &EliteFloors::default());
    for (a, fa) in values.iter().zip(&floors) {
        for (b, fb) in values.iter().zip(&floors) {
            if let (Some(va), Some(vb), Some(fa), Some(fb)) = (a, b, fa, fb)
                && va >= vb
            {
                assert!(fa >= fb, "value {va} floor {fa} vs value {vb} floor {fb}");
            }
        }
    }
    assert!(floors.iter().any(|f| *f == Some(92.0)));
}

#[test]
fn floors_only_raise_ratings() {
    let engine = engine(InverseNormalKind::Numeric);
    let mut floored = population(150);
    engine.rate(&mut floored);

    let mut no_floors_tuning = Tuning::default();
    no_floors_tuning.elite = EliteFloors {
        market: Vec::new(),
        external: Vec::new(),
    };
    let plain = RatingEngine::new(
        ProfileCatalog::default(),
        no_floors_tuning,
        InverseNormalKind::Numeric,
    );
    let mut unfloored = population(150);
    plain.rate(&mut unfloored);

    for (a, b) in floored.iter().zip(&unfloored) {
        assert!(a.final_rating >= b.final_rating, "{}", a.name);
    }
}

#[test]
fn external_rating_floors_apply() {
    let engine = engine(InverseNormalKind::Numeric);
    let mut players = population(60);
    players[7].external_rating = Some(86.0);
    players[8].external_rating = Some(81.0);
    engine.rate(&mut players);
    assert!(players[7].final_rating >= Some(90));
    assert!(players[8].final_rating >= Some(85));
}

#[test]
fn profile_scenario_yields_documented_base_rating() {
    let catalog = ProfileCatalog::new(vec![ProfileWeights::new(
        "Scenario",
        &[Position::CB],
        &[("A", 50.0)],
        &[("B", 50.0)],
    )]);
    let engine = RatingEngine::new(catalog, Tuning::default(), InverseNormalKind::Rational);
    let mut p = PlayerRecord::with_defaults("Scenario Player", 2026);
    p.position = Position::CB;
    p.metrics.insert("A".into(), Some(8.0));
    p.metrics.insert("B".into(), Some(6.0));
    let score = engine.score_player(&p, 0.5).unwrap();
    assert!((score.rating - 66.7).abs() < 1e-9);
    assert!(matches!(score.method, ScoreMethod::Profile { metrics_used: 2, .. }));
}

#[test]
fn heuristic_fallback_stays_within_bounds() {
    let fallback = FallbackTuning::default();
    for league in ["Premier League", "Eredivisie", ""] {
        for age in [17, 24, 27, 35] {
            for external in [None, Some(5.0), Some(99.0), Some(100.0)] {
                for pct in [0.0, 0.3, 0.6, 0.8, 0.92, 0.97, 1.0] {
                    let mut p = PlayerRecord::with_defaults("Nobody", 2026);
                    p.league = league.to_string();
                    p.age = age;
                    p.external_rating = external;
                    let r = heuristic_rating(&p, pct, &fallback);
                    assert!((40.0..=95.0).contains(&r), "{league} {age} {external:?} {pct} -> {r}");
                }
            }
        }
    }
}

#[test]
fn player_without_profile_or_metrics_still_gets_a_base_rating() {
    let engine = engine(InverseNormalKind::Numeric);
    let mut players = vec![PlayerRecord::with_defaults("Ghost", 2026)];
    engine.rate(&mut players);
    assert_eq!(players[0].score_method, Some(ScoreMethod::Heuristic));
    assert!(players[0].base_rating.is_some());
    assert!(players[0].final_rating.is_some());
}
