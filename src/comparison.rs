use serde::Serialize;

use crate::record::TeamRecord;

/// Bounds typical per-game goal-differential swings (about ±5) into the same
/// half-weight range as the win-rate term, so neither signal dominates.
const GOAL_DIFF_NORMALIZER: f64 = 5.0;

/// How two teams fared against one shared opponent.
#[derive(Debug, Clone, Serialize)]
pub struct SharedOpponentComparison {
    pub opponent: String,
    pub our_record: TeamRecord,
    pub their_record: TeamRecord,
    /// Exponential-decay weight in (0, 1], driven by the age of the most
    /// recent contributing game.
    pub recency_weight: f64,
}

impl SharedOpponentComparison {
    /// Signed strength-of-edge for this comparison, in [-1, 1].
    ///
    /// Win-rate difference and normalized goal-diff-per-game difference each
    /// carry half the weight; the sum is scaled by recency. Total over all
    /// inputs: a side with zero games yields 0.0 rather than dividing by it.
    pub fn advantage_score(&self) -> f64 {
        let our_games = self.our_record.games_played();
        let their_games = self.their_record.games_played();

        if our_games == 0 || their_games == 0 {
            return 0.0;
        }

        let our_win_rate = win_rate(&self.our_record, our_games);
        let their_win_rate = win_rate(&self.their_record, their_games);
        let win_component = (our_win_rate - their_win_rate) * 0.5;

        let our_gd_per_game = self.our_record.goal_diff() as f64 / our_games as f64;
        let their_gd_per_game = self.their_record.goal_diff() as f64 / their_games as f64;
        let gd_component = clamp(
            (our_gd_per_game - their_gd_per_game) / GOAL_DIFF_NORMALIZER,
            -0.5,
            0.5,
        );

        let raw = (win_component + gd_component) * self.recency_weight;
        clamp(raw, -1.0, 1.0)
    }
}

fn win_rate(record: &TeamRecord, games: u32) -> f64 {
    (record.wins as f64 + 0.5 * record.ties as f64) / games as f64
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}
