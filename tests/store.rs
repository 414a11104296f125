use chrono::NaiveDate;

use matchlens::store::{GameRow, GameStore, SqliteStore};

fn game(date: &str, home: &str, away: &str, score: Option<(i64, i64)>, league: &str) -> GameRow {
    GameRow {
        date: date.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_score: score.map(|(h, _)| h),
        away_score: score.map(|(_, a)| a),
        league_name: league.to_string(),
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid date")
}

#[test]
fn upsert_counts_added_and_updated() {
    let store = SqliteStore::open_in_memory().unwrap();
    let games = vec![
        game("2025-03-01", "Harbor FC", "Dockside SC", None, "Spring"),
        game("2025-03-08", "Harbor FC", "North End", None, "Spring"),
    ];
    assert_eq!(store.upsert_games(&games).unwrap(), (2, 0));

    // Same fixtures, now with scores: updates, not duplicates.
    let played = vec![
        game("2025-03-01", "Harbor FC", "Dockside SC", Some((2, 1)), "Spring"),
        game("2025-03-08", "Harbor FC", "North End", Some((0, 0)), "Spring"),
    ];
    assert_eq!(store.upsert_games(&played).unwrap(), (0, 2));

    let rows = store
        .head_to_head_games("Harbor FC", "Dockside SC", None, None)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].home_score, Some(2));
}

#[test]
fn upsert_skips_duplicates_within_one_batch() {
    let store = SqliteStore::open_in_memory().unwrap();
    let row = game("2025-03-01", "Harbor FC", "Dockside SC", Some((1, 0)), "Spring");
    let (added, updated) = store.upsert_games(&[row.clone(), row]).unwrap();
    assert_eq!((added, updated), (1, 0));
}

#[test]
fn head_to_head_matches_either_orientation_newest_first() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .upsert_games(&[
            game("2025-01-05", "Harbor FC", "Dockside SC", Some((1, 0)), "Spring"),
            game("2025-02-05", "Dockside SC", "Harbor FC", Some((2, 2)), "Spring"),
            game("2025-03-05", "Harbor FC", "North End", Some((3, 0)), "Spring"),
            game("2025-04-05", "Harbor FC", "Dockside SC", None, "Spring"),
        ])
        .unwrap();

    let rows = store
        .head_to_head_games("harbor fc", "dockside sc", None, None)
        .unwrap();
    let dates: Vec<&str> = rows.iter().map(|r| r.date.as_str()).collect();
    // Unplayed game excluded, rest newest first, both orientations found.
    assert_eq!(dates, vec!["2025-02-05", "2025-01-05"]);
}

#[test]
fn head_to_head_respects_cutoff_and_league_filter() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .upsert_games(&[
            game("2024-11-01", "Harbor FC", "Dockside SC", Some((0, 1)), "Fall Classic"),
            game("2025-02-01", "Harbor FC", "Dockside SC", Some((2, 0)), "Spring Cup"),
        ])
        .unwrap();

    let rows = store
        .head_to_head_games("Harbor FC", "Dockside SC", None, Some(date("2025-01-01")))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].date, "2025-02-01");

    let rows = store
        .head_to_head_games("Harbor FC", "Dockside SC", Some("fall"), None)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].date, "2024-11-01");
}

#[test]
fn opponents_are_unique_sorted_and_substring_matched() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .upsert_games(&[
            game("2025-01-05", "Harbor FC", "Zulu Rovers", Some((1, 0)), "Spring"),
            game("2025-01-12", "Alpha Town", "Harbor FC (B)", Some((0, 2)), "Spring"),
            game("2025-01-19", "Zulu Rovers", "Harbor FC", Some((1, 1)), "Spring"),
            game("2025-01-26", "Harbor FC", "North End", None, "Spring"),
        ])
        .unwrap();

    // "Harbor FC" substring-matches "Harbor FC (B)" as away side too; the
    // unplayed North End game does not count.
    let opponents = store.opponents_for_team("harbor fc", None, None).unwrap();
    assert_eq!(opponents, vec!["Alpha Town", "Zulu Rovers"]);
}

#[test]
fn unplayed_fixtures_come_back_in_date_order_with_the_other_side_named() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .upsert_games(&[
            game("2025-06-20", "Echo City", "Harbor FC", None, "Summer"),
            game("2025-06-06", "Harbor FC", "Foxtrot AFC", None, "Summer"),
            game("2025-05-01", "Harbor FC", "Alpha Town", Some((1, 0)), "Summer"),
        ])
        .unwrap();

    let fixtures = store.unplayed_fixtures_for_team("Harbor FC", None).unwrap();
    let opponents: Vec<&str> = fixtures.iter().map(|f| f.opponent.as_str()).collect();
    assert_eq!(opponents, vec!["Foxtrot AFC", "Echo City"]);
    assert_eq!(fixtures[0].league_name, "Summer");
}
