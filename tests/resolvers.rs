use hoops_oracle::market_fetch::{MarketEvent, MarketOutcome, find_market_match};
use hoops_oracle::resolvers::{
    ResolveContext, SPORTSBOOK_VOLUME, pregame_tiers, resolve_tiered, spread_to_probability,
    sportsbook_probability, stats_probability,
};
use hoops_oracle::state::{OddsSource, TeamStats};
use hoops_oracle::team_stats::calculate_momentum;

fn team(id: &str, name: &str, wins: u32, losses: u32, last10: &str) -> TeamStats {
    TeamStats {
        id: id.to_string(),
        name: name.to_string(),
        name_zh: name.to_string(),
        wins,
        losses,
        ppg: 110.0,
        oppg: 110.0,
        last10: last10.to_string(),
        momentum: calculate_momentum(last10),
        logo: String::new(),
    }
}

fn outcome(label: &str, price: f64) -> MarketOutcome {
    MarketOutcome {
        group_item_title: Some(label.to_string()),
        outcome: Some(label.to_string()),
        price: Some(price),
        volume: None,
    }
}

fn event(title: &str, markets: Vec<MarketOutcome>, volume: Option<f64>) -> MarketEvent {
    MarketEvent {
        title: title.to_string(),
        slug: String::new(),
        markets,
        volume,
    }
}

#[test]
fn momentum_is_share_of_recent_wins() {
    assert_eq!(calculate_momentum("9-1"), 0.9);
    assert_eq!(calculate_momentum("0-10"), 0.0);
    assert_eq!(calculate_momentum("10-0"), 1.0);
    assert_eq!(calculate_momentum("7-3"), 0.7);
}

#[test]
fn momentum_fails_soft_to_neutral() {
    for raw in ["0-0", "", "abc", "5", "5-x", "-", "5-5-5", "99999999999-1"] {
        assert_eq!(calculate_momentum(raw), 0.5, "input {raw:?}");
    }
}

#[test]
fn momentum_survives_records_at_the_integer_limit() {
    assert_eq!(calculate_momentum("4294967295-1"), 4294967295.0 / 4294967296.0);
    assert_eq!(calculate_momentum("1-4294967295"), 1.0 / 4294967296.0);
    let huge = team("BOS", "Celtics", u32::MAX, u32::MAX, "5-5");
    assert_eq!(huge.win_rate(), 0.5);
}

#[test]
fn spread_conversion_is_even_at_pick_em() {
    assert_eq!(spread_to_probability(0.0), 0.5);
}

#[test]
fn spread_conversion_grows_with_the_line() {
    let mut last = 0.5;
    for tenths in 1..=200 {
        let p = spread_to_probability(-(tenths as f64) / 10.0);
        assert!(p >= last, "not monotonic at -{}", tenths as f64 / 10.0);
        assert!((0.10..=0.99).contains(&p));
        last = p;
    }
    assert!((spread_to_probability(-6.5) - (0.5 + 6.5 * 0.033)).abs() < 1e-12);
    assert!((spread_to_probability(6.5) - (0.5 - 6.5 * 0.033)).abs() < 1e-12);
}

#[test]
fn spread_conversion_is_clamped() {
    assert_eq!(spread_to_probability(-40.0), 0.99);
    assert_eq!(spread_to_probability(40.0), 0.10);
}

#[test]
fn sportsbook_line_is_read_from_the_favoured_side() {
    let home_fav = sportsbook_probability("BOS -6.5", "BOS", "CHI").unwrap();
    assert!((home_fav - 0.7145).abs() < 1e-9);

    let away_fav = sportsbook_probability("DEN -4.5", "LAL", "DEN").unwrap();
    assert!((away_fav - (1.0 - 0.6485)).abs() < 1e-9);

    assert_eq!(sportsbook_probability("MIA -3", "BOS", "CHI"), None);
    assert_eq!(sportsbook_probability("EVEN", "BOS", "CHI"), None);
}

#[test]
fn feed_short_codes_match_table_ids_in_spreads() {
    let p = sportsbook_probability("GS -2.5", "GSW", "PHX").unwrap();
    assert!(p > 0.5);
}

#[test]
fn stats_probability_stays_inside_its_band() {
    let perfect = team("A", "A", 82, 0, "10-0");
    let winless = team("B", "B", 0, 82, "0-10");
    assert_eq!(stats_probability(&perfect, &winless), 0.75);
    assert_eq!(stats_probability(&winless, &perfect), 0.25);

    let fresh_a = team("A", "A", 0, 0, "0-0");
    let fresh_b = team("B", "B", 0, 0, "0-0");
    assert!((stats_probability(&fresh_a, &fresh_b) - 0.55).abs() < 1e-12);
}

#[test]
fn stats_probability_matches_worked_example() {
    let home = team("BOS", "Celtics", 45, 12, "9-1");
    let away = team("CHI", "Bulls", 35, 21, "5-5");
    let p = stats_probability(&home, &away);
    assert!((p - 0.667).abs() < 1e-3, "got {p}");
}

#[test]
fn market_prices_are_renormalized() {
    let home = team("LAL", "Lakers", 30, 26, "6-4");
    let away = team("DEN", "Nuggets", 36, 19, "6-4");
    let events = vec![event(
        "Lakers vs. Nuggets",
        vec![outcome("Lakers", 0.55), outcome("Nuggets", 0.50)],
        Some(1000.0),
    )];
    let m = find_market_match(&events, &home, &away).unwrap();
    assert!((m.home_prob - 0.55 / 1.05).abs() < 1e-12);
    assert!((m.away_prob - 0.50 / 1.05).abs() < 1e-12);
    assert!((m.home_prob + m.away_prob - 1.0).abs() < 1e-12);
    assert_eq!(m.volume, 1000.0);
}

#[test]
fn single_priced_side_implies_the_other() {
    let home = team("BOS", "Celtics", 45, 12, "9-1");
    let away = team("CHI", "Bulls", 35, 21, "5-5");
    let events = vec![event("Bulls @ Celtics", vec![outcome("Bulls", 0.3)], None)];
    let m = find_market_match(&events, &home, &away).unwrap();
    assert!((m.home_prob - 0.7).abs() < 1e-12);
    assert_eq!(m.volume, 0.0);
}

#[test]
fn market_requires_both_names_in_title() {
    let home = team("BOS", "Celtics", 45, 12, "9-1");
    let away = team("CHI", "Bulls", 35, 21, "5-5");
    let events = vec![
        event("NBA Champion", vec![outcome("Celtics", 0.2)], None),
        event("Celtics vs. Bulls", vec![outcome("Yes", 0.6)], None),
    ];
    assert!(find_market_match(&events, &home, &away).is_none());
}

#[test]
fn outcome_names_match_whole_words_only() {
    let home = team("BKN", "Nets", 21, 33, "3-7");
    let away = team("CHA", "Hornets", 13, 41, "3-7");
    let events = vec![event(
        "Hornets vs. Nets",
        vec![outcome("Hornets", 0.30), outcome("Nets", 0.70)],
        None,
    )];
    let m = find_market_match(&events, &home, &away).unwrap();
    assert!((m.home_prob - 0.7).abs() < 1e-12);
    assert!((m.away_prob - 0.3).abs() < 1e-12);
}

#[test]
fn city_qualified_outcome_labels_still_match() {
    let home = team("POR", "Trail Blazers", 15, 39, "2-8");
    let away = team("BKN", "Nets", 21, 33, "3-7");
    let events = vec![event(
        "Brooklyn Nets @ Portland Trail Blazers",
        vec![outcome("Portland Trail Blazers", 0.62), outcome("Brooklyn Nets", 0.40)],
        None,
    )];
    let m = find_market_match(&events, &home, &away).unwrap();
    assert!((m.home_prob - 0.62 / 1.02).abs() < 1e-12);
}

#[test]
fn title_word_inside_another_name_is_not_a_match() {
    let home = team("BKN", "Nets", 21, 33, "3-7");
    let away = team("CHA", "Hornets", 13, 41, "3-7");
    let events = vec![event(
        "Hornets vs. Pelicans",
        vec![outcome("Hornets", 0.45), outcome("Pelicans", 0.55)],
        None,
    )];
    assert!(find_market_match(&events, &home, &away).is_none());
}

#[test]
fn tiers_are_strict_priority_without_blending() {
    let home = team("LAL", "Lakers", 30, 26, "6-4");
    let away = team("DEN", "Nuggets", 36, 19, "6-4");
    let events = vec![event(
        "Lakers vs Nuggets",
        vec![outcome("Lakers", 0.40), outcome("Nuggets", 0.60)],
        Some(5.0),
    )];
    let tiers = pregame_tiers();

    let with_market = ResolveContext {
        home: &home,
        away: &away,
        spread_details: Some("DEN -4.5"),
        market_events: &events,
    };
    let est = resolve_tiered(&tiers, &with_market).unwrap();
    assert_eq!(est.source, OddsSource::PredictionMarket);
    assert!((est.home_prob - 0.40).abs() < 1e-12);

    let book_only = ResolveContext {
        market_events: &[],
        ..with_market
    };
    let est = resolve_tiered(&tiers, &book_only).unwrap();
    assert_eq!(est.source, OddsSource::Sportsbook);
    assert_eq!(est.volume, SPORTSBOOK_VOLUME);

    let nothing = ResolveContext {
        spread_details: Some("garbage"),
        ..book_only
    };
    let est = resolve_tiered(&tiers, &nothing).unwrap();
    assert_eq!(est.source, OddsSource::Stats);
    assert_eq!(est.volume, 0.0);
}
