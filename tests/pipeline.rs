use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use hoops_oracle::market_fetch::{MarketEvent, parse_market_events_json};
use hoops_oracle::pipeline::{FeedSource, GamePhase, OddsPipeline};
use hoops_oracle::schedule_fetch::{CompetitorRow, ScheduleEvent, parse_scoreboard_json};
use hoops_oracle::snapshot_store::{KeyValueStore, MemoryStore, StoreError};
use hoops_oracle::state::{GameStatus, OddsSource};

const PREFIX: &str = "hoops_odds";
const T0: i64 = 1_767_600_000_000;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn competitor(abbr: &str, name: &str, record: &str, score: Option<u32>) -> CompetitorRow {
    CompetitorRow {
        abbreviation: abbr.to_string(),
        name: name.to_string(),
        logo: None,
        record_summary: Some(record.to_string()),
        score,
    }
}

/// BOS (45-12, last 10 9-1) hosting CHI, re-recorded as 35-21 with a 5-5 last ten.
fn celtics_bulls(status: GameStatus, home_score: Option<u32>, away_score: Option<u32>) -> ScheduleEvent {
    ScheduleEvent {
        id: "g1".to_string(),
        start_time: "2026-01-06T00:30Z".to_string(),
        status,
        period: None,
        clock: None,
        home: competitor("BOS", "Celtics", "45-12", home_score),
        away: competitor("CHI", "Bulls", "35-21", away_score),
        spread_details: None,
    }
}

fn market(title: &str, home: (&str, f64), away: (&str, f64)) -> Vec<MarketEvent> {
    let raw = format!(
        r#"[{{"title":"{title}","volume":777,"markets":[
            {{"outcome":"{}","price":{}}},{{"outcome":"{}","price":{}}}]}}]"#,
        home.0, home.1, away.0, away.1
    );
    parse_market_events_json(&raw).expect("market json")
}

struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("disabled".into()))
    }
    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("quota exceeded".into()))
    }
    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disabled".into()))
    }
}

struct FixtureFeeds {
    schedule_ok: bool,
    market_ok: bool,
}

impl FeedSource for FixtureFeeds {
    fn schedule(&self, _date: NaiveDate) -> Result<Vec<ScheduleEvent>> {
        if !self.schedule_ok {
            return Err(anyhow!("http 503: upstream down"));
        }
        parse_scoreboard_json(&read_fixture("espn_scoreboard.json"))
    }

    fn market_events(&self) -> Result<Vec<MarketEvent>> {
        if !self.market_ok {
            return Err(anyhow!("market timeout"));
        }
        parse_market_events_json(&read_fixture("polymarket_events.json"))
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
}

#[test]
fn stats_only_pregame_matches_worked_example() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let game = pipeline.build_game(&celtics_bulls(GameStatus::Scheduled, None, None), &[], T0);

    assert_eq!(game.odds_source, OddsSource::Stats);
    assert!((game.market.home_win_prob - 0.667).abs() < 1e-3);
    assert!((game.market.home_win_prob + game.market.away_win_prob - 1.0).abs() < 1e-12);
    assert_eq!(game.market.volume, 0.0);
    assert!(!game.is_locked);
    assert!(!game.is_closing_odds);
    assert_eq!(game.predicted_winner_id, None);
    assert_eq!(game.score, None);

    let snap = pipeline.cache().read("g1").expect("pregame read is cached");
    assert_eq!(snap.source, OddsSource::Stats);
    assert_eq!(snap.timestamp, T0);
}

#[test]
fn repeated_pregame_runs_overwrite_one_entry() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let event = celtics_bulls(GameStatus::Scheduled, None, None);

    let first = pipeline.build_game(&event, &[], T0);
    let after_first = pipeline.cache().read("g1").unwrap();
    let second = pipeline.build_game(&event, &[], T0 + 30_000);
    let after_second = pipeline.cache().read("g1").unwrap();

    assert_eq!(first.market, second.market);
    assert_eq!(after_first.home_prob, after_second.home_prob);
    assert_eq!(after_second.timestamp, T0 + 30_000);
    assert_eq!(store.len(), 1);
}

#[test]
fn latest_pregame_read_wins() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let event = celtics_bulls(GameStatus::Scheduled, None, None);

    pipeline.build_game(&event, &market("Celtics vs Bulls", ("Celtics", 0.6), ("Bulls", 0.4)), T0);
    pipeline.build_game(&event, &market("Celtics vs Bulls", ("Celtics", 0.3), ("Bulls", 0.7)), T0 + 1);

    let snap = pipeline.cache().read("g1").unwrap();
    assert_eq!(snap.source, OddsSource::PredictionMarket);
    assert!((snap.home_prob - 0.3).abs() < 1e-12);
    assert_eq!(snap.volume, 777.0);
}

#[test]
fn tipoff_replays_closing_odds_and_commits_pick() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let books = market("Celtics vs Bulls", ("Celtics", 0.35), ("Bulls", 0.65));

    pipeline.build_game(&celtics_bulls(GameStatus::Scheduled, None, None), &books, T0);

    // Live markets flip hard once play starts; none of that may leak in.
    let live_books = market("Celtics vs Bulls", ("Celtics", 0.95), ("Bulls", 0.05));
    let live = pipeline.build_game(&celtics_bulls(GameStatus::Live, Some(30), Some(12)), &live_books, T0 + 1);

    assert!(live.is_locked);
    assert!(live.is_closing_odds);
    assert_eq!(live.odds_source, OddsSource::PredictionMarket);
    assert!((live.market.home_win_prob - 0.35).abs() < 1e-12);
    assert_eq!(live.predicted_winner_id.as_deref(), Some("CHI"));
    assert_eq!(live.prediction_correct, None);
    assert_eq!(live.score.map(|s| (s.home, s.away)), Some((30, 12)));
}

#[test]
fn tipoff_without_snapshot_falls_back_to_stats() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let books = market("Celtics vs Bulls", ("Celtics", 0.1), ("Bulls", 0.9));

    let live = pipeline.build_game(&celtics_bulls(GameStatus::Live, Some(2), Some(0)), &books, T0);

    assert!(live.is_locked);
    assert!(!live.is_closing_odds);
    assert_eq!(live.odds_source, OddsSource::Stats);
    assert!((live.market.home_win_prob - 0.667).abs() < 1e-3);
    assert_eq!(live.predicted_winner_id.as_deref(), Some("BOS"));
    // The fallback is not written back as a closing snapshot.
    assert!(pipeline.cache().read("g1").is_none());
}

#[test]
fn committed_pick_survives_later_recomputation() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);

    let first = pipeline.build_game(&celtics_bulls(GameStatus::Live, Some(10), Some(8)), &[], T0);
    assert_eq!(first.predicted_winner_id.as_deref(), Some("BOS"));

    // The stats fallback would now favour the visitors.
    let mut flipped = celtics_bulls(GameStatus::Live, Some(40), Some(60));
    flipped.home.record_summary = Some("5-50".to_string());
    flipped.away.record_summary = Some("50-5".to_string());
    let second = pipeline.build_game(&flipped, &[], T0 + 60_000);

    assert!(second.market.home_win_prob < 0.5);
    assert_eq!(second.predicted_winner_id.as_deref(), Some("BOS"));
}

#[test]
fn feed_regression_to_scheduled_stays_locked() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    pipeline.build_game(&celtics_bulls(GameStatus::Live, Some(1), Some(0)), &[], T0);

    let event = celtics_bulls(GameStatus::Scheduled, None, None);
    assert_eq!(pipeline.phase_for(&event), GamePhase::InProgress);
    let game = pipeline.build_game(&event, &market("Celtics vs Bulls", ("Celtics", 0.2), ("Bulls", 0.8)), T0 + 1);
    assert_eq!(game.status, GameStatus::Live);
    assert!(game.is_locked);
    assert_eq!(game.odds_source, OddsSource::Stats);
}

#[test]
fn final_home_win_verifies_home_pick() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    pipeline.build_game(&celtics_bulls(GameStatus::Scheduled, None, None), &[], T0);

    let done = pipeline.build_game(&celtics_bulls(GameStatus::Finished, Some(100), Some(90)), &[], T0 + 1);
    assert_eq!(done.status, GameStatus::Finished);
    assert_eq!(done.predicted_winner_id.as_deref(), Some("BOS"));
    assert_eq!(done.prediction_correct, Some(true));
    assert!(done.result_verified());

    let pick = pipeline.cache().read_pick("g1").unwrap();
    assert_eq!(pick.correct, Some(true));
}

#[test]
fn verdict_is_stamped_once() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);

    let done = pipeline.build_game(&celtics_bulls(GameStatus::Finished, Some(90), Some(100)), &[], T0);
    assert_eq!(done.prediction_correct, Some(false));

    // A late stat correction in the feed does not re-grade the pick.
    let corrected = pipeline.build_game(&celtics_bulls(GameStatus::Finished, Some(101), Some(100)), &[], T0 + 1);
    assert_eq!(corrected.prediction_correct, Some(false));
}

#[test]
fn tied_final_has_no_verdict() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let done = pipeline.build_game(&celtics_bulls(GameStatus::Finished, Some(99), Some(99)), &[], T0);
    assert!(done.predicted_winner_id.is_some());
    assert_eq!(done.prediction_correct, None);
}

#[test]
fn degenerate_probabilities_are_not_persisted() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let event = celtics_bulls(GameStatus::Scheduled, None, None);

    let game = pipeline.build_game(&event, &market("Celtics vs Bulls", ("Celtics", 1.0), ("Bulls", 0.0)), T0);
    assert_eq!(game.odds_source, OddsSource::PredictionMarket);
    assert_eq!(game.market.home_win_prob, 1.0);
    assert!(store.is_empty());
}

#[test]
fn corrupt_snapshot_is_treated_as_miss() {
    let store = MemoryStore::new();
    store.set("hoops_odds_g1", "{not json").unwrap();
    let pipeline = OddsPipeline::new(&store, PREFIX);

    let live = pipeline.build_game(&celtics_bulls(GameStatus::Live, Some(3), Some(5)), &[], T0);
    assert_eq!(live.odds_source, OddsSource::Stats);
    assert!(!live.is_closing_odds);
    assert_eq!(store.get("hoops_odds_g1").unwrap(), None);
}

#[test]
fn out_of_range_snapshot_is_treated_as_miss() {
    let store = MemoryStore::new();
    store
        .set("hoops_odds_g1", r#"{"homeProb":1.4,"source":"POLYMARKET","volume":1,"timestamp":1}"#)
        .unwrap();
    let pipeline = OddsPipeline::new(&store, PREFIX);

    let live = pipeline.build_game(&celtics_bulls(GameStatus::Live, Some(3), Some(5)), &[], T0);
    assert_eq!(live.odds_source, OddsSource::Stats);
    assert!(!live.is_closing_odds);
}

#[test]
fn unavailable_storage_never_blocks_resolution() {
    let store = FailingStore;
    let pipeline = OddsPipeline::new(&store, PREFIX);

    let pre = pipeline.build_game(&celtics_bulls(GameStatus::Scheduled, None, None), &[], T0);
    assert!((pre.market.home_win_prob - 0.667).abs() < 1e-3);

    let live = pipeline.build_game(&celtics_bulls(GameStatus::Live, Some(1), Some(1)), &[], T0 + 1);
    assert_eq!(live.odds_source, OddsSource::Stats);
    assert_eq!(live.predicted_winner_id.as_deref(), Some("BOS"));

    let done = pipeline.build_game(&celtics_bulls(GameStatus::Finished, Some(100), Some(90)), &[], T0 + 2);
    assert_eq!(done.prediction_correct, Some(true));
}

#[test]
fn refresh_resolves_every_fixture_game() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let feeds = FixtureFeeds {
        schedule_ok: true,
        market_ok: true,
    };

    let games = pipeline.run_refresh(&feeds, date(), T0).expect("refresh succeeds");
    let ids: Vec<&str> = games.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["401", "402", "403", "404"]);

    // Single-sided market for BOS/CHI.
    assert_eq!(games[0].odds_source, OddsSource::PredictionMarket);
    assert!((games[0].market.home_win_prob - 0.7).abs() < 1e-9);

    // Two-sided market beats the sportsbook line for LAL/DEN.
    assert_eq!(games[1].odds_source, OddsSource::PredictionMarket);
    assert!((games[1].market.home_win_prob - 0.55 / 1.05).abs() < 1e-9);

    assert_eq!(games[2].home.id, "GSW");
    assert_eq!(games[2].status, GameStatus::Live);
    assert_eq!(games[2].odds_source, OddsSource::Stats);
    assert!(games[2].predicted_winner_id.is_some());

    assert_eq!(games[3].home.id, "NYK");
    assert_eq!(games[3].status, GameStatus::Finished);
    assert!(games[3].prediction_correct.is_some());

    for game in &games {
        let p = game.market.home_win_prob;
        assert!(p > 0.0 && p < 1.0, "{} has {p}", game.id);
        assert_eq!(game.is_locked, game.status != GameStatus::Scheduled);
        assert_eq!(game.predicted_winner_id.is_some(), game.is_locked);
    }
}

#[test]
fn market_outage_falls_through_to_sportsbook() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let feeds = FixtureFeeds {
        schedule_ok: true,
        market_ok: false,
    };

    let games = pipeline.run_refresh(&feeds, date(), T0).expect("market outage is not fatal");
    assert_eq!(games.len(), 4);
    assert_eq!(games[0].odds_source, OddsSource::Stats);
    assert_eq!(games[1].odds_source, OddsSource::Sportsbook);
    assert!((games[1].market.home_win_prob - (1.0 - 0.6485)).abs() < 1e-9);
}

#[test]
fn schedule_outage_fails_the_refresh() {
    let store = MemoryStore::new();
    let pipeline = OddsPipeline::new(&store, PREFIX);
    let feeds = FixtureFeeds {
        schedule_ok: false,
        market_ok: true,
    };

    let err = pipeline.run_refresh(&feeds, date(), T0).unwrap_err();
    assert!(format!("{err:#}").contains("503"));
    assert!(store.is_empty());
}
