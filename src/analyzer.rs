use std::collections::HashSet;
use std::env;
use std::fmt;

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::comparison::SharedOpponentComparison;
use crate::record::{HeadToHeadRecord, TeamRecord};
use crate::store::GameStore;

/// Below this absolute advantage the matchup is called a toss-up.
const UNCERTAIN_BAND: f64 = 0.15;
/// Combined games at which a single comparison stops gaining weight.
const GAMES_WEIGHT_CAP: u32 = 6;
/// Shared-opponent count at which base confidence saturates.
const CONFIDENCE_SATURATION: f64 = 4.0;
/// Confidence ceiling when there are too few shared opponents.
const LOW_EVIDENCE_CONFIDENCE_CAP: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Favorable,
    Unfavorable,
    Uncertain,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Favorable => "FAVORABLE",
            Outcome::Unfavorable => "UNFAVORABLE",
            Outcome::Uncertain => "UNCERTAIN",
        };
        f.write_str(label)
    }
}

/// Final output of one prediction. Plain value, serializable, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub our_team: String,
    pub opponent: String,
    pub comparisons: Vec<SharedOpponentComparison>,
    /// Volume-and-consistency heuristic in [0, 100]. Not a probability.
    pub confidence: f64,
    /// Weighted roll-up in [-1, 1], rounded to 2 decimals.
    pub advantage_score: f64,
    pub outcome: Outcome,
    pub league_filter: Option<String>,
    pub time_window_days: i64,
    /// Direct record, shown alongside but never blended into the score.
    pub head_to_head: Option<HeadToHeadRecord>,
}

impl PredictionResult {
    pub fn shared_opponent_count(&self) -> usize {
        self.comparisons.len()
    }

    /// Ten-cell bar for terminal display, empty at -1 and full at +1.
    pub fn advantage_bar(&self) -> String {
        let filled = ((self.advantage_score + 1.0) * 5.0) as i64;
        let filled = filled.clamp(0, 10) as usize;
        format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// The tracked team every prediction is relative to.
    pub our_team: String,
    /// Cutoff for all store queries.
    pub time_window_days: i64,
    /// Fewer shared opponents than this forces UNCERTAIN and caps confidence.
    pub min_shared_opponents: usize,
    /// Days until a game's recency weight decays to 50%.
    pub recency_half_life_days: i64,
}

impl AnalyzerConfig {
    pub fn for_team(our_team: impl Into<String>) -> Self {
        Self {
            our_team: our_team.into(),
            time_window_days: 365,
            min_shared_opponents: 2,
            recency_half_life_days: 365,
        }
    }
}

/// Predicts matchup outcomes from indirect evidence: how both teams fared
/// against opponents they have both played, weighted by recency and volume.
pub struct TransitiveAnalyzer<'a, S: GameStore> {
    store: &'a S,
    config: AnalyzerConfig,
}

impl<'a, S: GameStore> TransitiveAnalyzer<'a, S> {
    pub fn new(store: &'a S, config: AnalyzerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn date_cutoff(&self) -> NaiveDate {
        Utc::now().date_naive() - Duration::days(self.config.time_window_days)
    }

    /// Exponential decay: 0.5^(days_ago / half_life). Future-dated games are
    /// treated as today so the weight stays in (0, 1].
    fn recency_weight(&self, game_date: NaiveDate) -> f64 {
        let days_ago = (Utc::now().date_naive() - game_date).num_days().max(0);
        let decay = days_ago as f64 / self.config.recency_half_life_days as f64;
        0.5_f64.powf(decay)
    }

    fn build_team_record(
        &self,
        team: &str,
        opponent: &str,
        league: Option<&str>,
    ) -> Result<TeamRecord> {
        let games =
            self.store
                .head_to_head_games(team, opponent, league, Some(self.date_cutoff()))?;
        Ok(TeamRecord::from_games(team, &games))
    }

    /// Teams both sides have played within the window, sorted ascending.
    ///
    /// Excludes any name that contains either team's own name: reserve and
    /// B squads share substrings with their parent club, and a team must
    /// never show up as its own shared opponent.
    pub fn find_shared_opponents(
        &self,
        opponent: &str,
        league: Option<&str>,
    ) -> Result<Vec<String>> {
        let cutoff = Some(self.date_cutoff());
        let ours: HashSet<String> = self
            .store
            .opponents_for_team(&self.config.our_team, league, cutoff)?
            .into_iter()
            .collect();
        let theirs: HashSet<String> = self
            .store
            .opponents_for_team(opponent, league, cutoff)?
            .into_iter()
            .collect();

        let our_lower = self.config.our_team.to_lowercase();
        let opp_lower = opponent.to_lowercase();

        let mut shared: Vec<String> = ours
            .intersection(&theirs)
            .filter(|name| {
                let lower = name.to_lowercase();
                !lower.contains(&our_lower) && !lower.contains(&opp_lower)
            })
            .cloned()
            .collect();
        shared.sort();
        Ok(shared)
    }

    /// Build both teams' records against one shared opponent, weighted by
    /// the age of the most recent contributing game from either side.
    pub fn compare(
        &self,
        shared_opponent: &str,
        opponent: &str,
        league: Option<&str>,
    ) -> Result<SharedOpponentComparison> {
        let our_record = self.build_team_record(&self.config.our_team, shared_opponent, league)?;
        let their_record = self.build_team_record(opponent, shared_opponent, league)?;

        let most_recent = our_record
            .games
            .iter()
            .chain(their_record.games.iter())
            .filter_map(|game| match game.date.parse::<NaiveDate>() {
                Ok(date) => Some(date),
                Err(err) => {
                    warn!(date = %game.date, %err, "skipping game with malformed date");
                    None
                }
            })
            .max();

        // No dated games on either side: moderate weight, neither confident
        // nor discounted.
        let recency_weight = match most_recent {
            Some(date) => self.recency_weight(date),
            None => 0.5,
        };

        Ok(SharedOpponentComparison {
            opponent: shared_opponent.to_string(),
            our_record,
            their_record,
            recency_weight,
        })
    }

    /// Direct record against the opponent. Supplementary context only; it is
    /// kept out of the advantage score because direct history is sparse or
    /// absent exactly when transitive inference is most useful.
    pub fn head_to_head(
        &self,
        opponent: &str,
        league: Option<&str>,
    ) -> Result<HeadToHeadRecord> {
        self.build_team_record(&self.config.our_team, opponent, league)
    }

    /// Predict the matchup against `opponent` from shared-opponent evidence.
    pub fn predict_outcome(
        &self,
        opponent: &str,
        league: Option<&str>,
    ) -> Result<PredictionResult> {
        let shared_opponents = self.find_shared_opponents(opponent, league)?;

        let mut comparisons = Vec::new();
        for shared in &shared_opponents {
            let comparison = self.compare(shared, opponent, league)?;
            // One-sided comparisons carry no signal.
            if comparison.our_record.games_played() > 0
                && comparison.their_record.games_played() > 0
            {
                comparisons.push(comparison);
            }
        }

        let h2h = self.head_to_head(opponent, league)?;
        let head_to_head = (h2h.games_played() > 0).then_some(h2h);

        if comparisons.is_empty() {
            return Ok(PredictionResult {
                our_team: self.config.our_team.clone(),
                opponent: opponent.to_string(),
                comparisons,
                confidence: 0.0,
                advantage_score: 0.0,
                outcome: Outcome::Uncertain,
                league_filter: league.map(str::to_string),
                time_window_days: self.config.time_window_days,
                head_to_head,
            });
        }

        // Roll-up: each comparison weighted by recency and by how much data
        // backs it, capped so one data-rich pairing cannot dominate.
        let scores: Vec<f64> = comparisons.iter().map(|c| c.advantage_score()).collect();

        let mut total_weight = 0.0;
        let mut weighted_advantage = 0.0;
        for (comparison, score) in comparisons.iter().zip(&scores) {
            let combined_games = comparison.our_record.games_played()
                + comparison.their_record.games_played();
            let games_weight =
                combined_games.min(GAMES_WEIGHT_CAP) as f64 / GAMES_WEIGHT_CAP as f64;
            let weight = comparison.recency_weight * games_weight;

            weighted_advantage += score * weight;
            total_weight += weight;
        }

        let advantage_score = if total_weight > 0.0 {
            weighted_advantage / total_weight
        } else {
            0.0
        };

        let base_confidence = (comparisons.len() as f64 / CONFIDENCE_SATURATION).min(1.0);
        let consistency_factor = if comparisons.len() >= 2 {
            let variance = scores
                .iter()
                .map(|s| (s - advantage_score).powi(2))
                .sum::<f64>()
                / scores.len() as f64;
            (1.0 - variance).max(0.5)
        } else {
            // A single comparison is moderately, not fully, reliable.
            0.7
        };
        let mut confidence = base_confidence * consistency_factor * 100.0;

        let mut outcome = classify(advantage_score);

        // Minimum-evidence guard: too few shared opponents means the sign of
        // the roll-up is not trustworthy.
        if comparisons.len() < self.config.min_shared_opponents {
            confidence = confidence.min(LOW_EVIDENCE_CONFIDENCE_CAP);
            outcome = Outcome::Uncertain;
        }

        Ok(PredictionResult {
            our_team: self.config.our_team.clone(),
            opponent: opponent.to_string(),
            comparisons,
            confidence: confidence.round(),
            advantage_score: round2(advantage_score),
            outcome,
            league_filter: league.map(str::to_string),
            time_window_days: self.config.time_window_days,
            head_to_head,
        })
    }

    /// Predict every unique upcoming opponent, in fixture date order.
    ///
    /// When a league filter is given, each prediction narrows to the
    /// fixture's own league so the comparisons stay within one competition.
    /// Per-opponent predictions are independent reads and run on a bounded
    /// pool; collection preserves fixture order.
    pub fn predict_upcoming(&self, league: Option<&str>) -> Result<Vec<PredictionResult>>
    where
        S: Sync,
    {
        let fixtures = self
            .store
            .unplayed_fixtures_for_team(&self.config.our_team, league)?;

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for fixture in fixtures {
            if seen.insert(fixture.opponent.to_lowercase()) {
                targets.push(fixture);
            }
        }

        with_predict_pool(|| {
            targets
                .par_iter()
                .map(|fixture| {
                    let fixture_league = if league.is_some() {
                        Some(fixture.league_name.as_str())
                    } else {
                        None
                    };
                    self.predict_outcome(&fixture.opponent, fixture_league)
                })
                .collect()
        })
    }
}

fn classify(advantage_score: f64) -> Outcome {
    if advantage_score.abs() < UNCERTAIN_BAND {
        Outcome::Uncertain
    } else if advantage_score > 0.0 {
        Outcome::Favorable
    } else {
        Outcome::Unfavorable
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn with_predict_pool<T>(action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    let threads = predict_parallelism();
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

fn predict_parallelism() -> usize {
    env::var("PREDICT_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(4)
        .clamp(1, 16)
}
