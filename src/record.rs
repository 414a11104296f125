use serde::Serialize;

use crate::store::GameRow;

/// A team's aggregate outcome against one specific opponent, folded from the
/// stored games. Transient view: built per query, never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub goals_for: i64,
    pub goals_against: i64,
    /// Contributing games, kept for display and audit.
    pub games: Vec<GameRow>,
}

/// Direct record between our team and an opponent. Same shape as a
/// per-opponent record; kept as its own name because it travels separately
/// in the prediction output and never feeds the advantage score.
pub type HeadToHeadRecord = TeamRecord;

impl TeamRecord {
    /// Fold games into a record from `team`'s perspective.
    ///
    /// Which side `team` was on is decided by a case-insensitive substring
    /// match against the stored home name. The upstream naming is not
    /// normalized, so this is deliberately fuzzy rather than exact.
    /// Unplayed games contribute nothing.
    pub fn from_games(team: &str, games: &[GameRow]) -> TeamRecord {
        let team_lower = team.to_lowercase();
        let mut record = TeamRecord::default();

        for game in games {
            let (Some(home_score), Some(away_score)) = (game.home_score, game.away_score)
            else {
                continue;
            };

            record.games.push(game.clone());

            let is_home = game.home_team.to_lowercase().contains(&team_lower);
            let (our_score, their_score) = if is_home {
                (home_score, away_score)
            } else {
                (away_score, home_score)
            };

            record.goals_for += our_score;
            record.goals_against += their_score;

            if our_score > their_score {
                record.wins += 1;
            } else if our_score < their_score {
                record.losses += 1;
            } else {
                record.ties += 1;
            }
        }

        record
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    pub fn goal_diff(&self) -> i64 {
        self.goals_for - self.goals_against
    }

    /// Standard 3-1-0 point system. Informational only.
    pub fn points(&self) -> u32 {
        self.wins * 3 + self.ties
    }

    /// W-L-T record string.
    pub fn record_str(&self) -> String {
        format!("{}-{}-{}", self.wins, self.losses, self.ties)
    }

    /// Goal diff with explicit sign.
    pub fn goal_diff_str(&self) -> String {
        let diff = self.goal_diff();
        if diff > 0 {
            format!("+{diff}")
        } else {
            diff.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(date: &str, home: &str, away: &str, score: Option<(i64, i64)>) -> GameRow {
        GameRow {
            date: date.to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: score.map(|(h, _)| h),
            away_score: score.map(|(_, a)| a),
            league_name: "Test League".to_string(),
        }
    }

    #[test]
    fn every_played_game_counts_exactly_once() {
        let games = vec![
            game("2025-01-10", "Harbor FC", "Dockside SC", Some((3, 0))),
            game("2025-02-10", "Dockside SC", "Harbor FC", Some((2, 2))),
            game("2025-03-10", "Dockside SC", "Harbor FC", Some((1, 0))),
        ];
        let record = TeamRecord::from_games("Harbor FC", &games);
        assert_eq!(record.games_played(), 3);
        assert_eq!(
            record.wins + record.losses + record.ties,
            record.games.len() as u32
        );
        assert_eq!(record.wins, 1);
        assert_eq!(record.losses, 1);
        assert_eq!(record.ties, 1);
    }

    #[test]
    fn goals_follow_the_side_we_played_on() {
        let games = vec![
            game("2025-01-10", "Harbor FC", "Dockside SC", Some((3, 1))),
            game("2025-02-10", "Dockside SC", "Harbor FC", Some((0, 2))),
        ];
        let record = TeamRecord::from_games("Harbor FC", &games);
        assert_eq!(record.goals_for, 5);
        assert_eq!(record.goals_against, 1);
        assert_eq!(record.goal_diff(), 4);
        assert_eq!(record.goal_diff_str(), "+4");
    }

    #[test]
    fn unplayed_games_are_skipped() {
        let games = vec![
            game("2025-01-10", "Harbor FC", "Dockside SC", Some((1, 0))),
            game("2025-06-10", "Harbor FC", "Dockside SC", None),
        ];
        let record = TeamRecord::from_games("Harbor FC", &games);
        assert_eq!(record.games_played(), 1);
        assert_eq!(record.games.len(), 1);
    }

    #[test]
    fn substring_match_handles_squad_suffixes() {
        // "Harbor FC" stored as "Harbor FC (B)" away still attributes goals
        // to the away side.
        let games = vec![game(
            "2025-01-10",
            "Dockside SC",
            "Harbor FC (B)",
            Some((0, 2)),
        )];
        let record = TeamRecord::from_games("Harbor FC", &games);
        assert_eq!(record.wins, 1);
        assert_eq!(record.goals_for, 2);
    }

    #[test]
    fn points_and_record_string() {
        let games = vec![
            game("2025-01-10", "Harbor FC", "Dockside SC", Some((2, 0))),
            game("2025-01-17", "Harbor FC", "Dockside SC", Some((1, 1))),
            game("2025-01-24", "Dockside SC", "Harbor FC", Some((3, 1))),
        ];
        let record = TeamRecord::from_games("Harbor FC", &games);
        assert_eq!(record.points(), 4);
        assert_eq!(record.record_str(), "1-1-1");
        assert_eq!(record.goal_diff_str(), "0");
    }
}
