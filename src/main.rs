use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use matchlens::analyzer::{AnalyzerConfig, PredictionResult, TransitiveAnalyzer};
use matchlens::store::{GameRow, SqliteStore, default_db_path};

const USAGE: &str = "\
matchlens: transitive matchup predictions from shared-opponent history

Usage:
  matchlens load <games.json> [--db PATH]
  matchlens predict <opponent> --team NAME [options]
  matchlens upcoming --team NAME [options]

Options:
  --team NAME        our tracked team (or MATCHLENS_TEAM)
  --db PATH          sqlite database path (default: XDG cache)
  --league NAME      restrict to games whose league name contains NAME
  --window DAYS      time window for all queries (default 365)
  --min-shared N     shared opponents required for a confident call (default 2)
  --half-life DAYS   recency decay half-life (default 365)
  --json             print results as JSON
";

struct Cli {
    command: String,
    positional: Vec<String>,
    team: Option<String>,
    db: Option<PathBuf>,
    league: Option<String>,
    window: Option<i64>,
    min_shared: Option<usize>,
    half_life: Option<i64>,
    json: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let cli = parse_args(std::env::args().skip(1))?;

    let db_path = cli
        .db
        .clone()
        .or_else(default_db_path)
        .ok_or_else(|| anyhow!("no database path; pass --db or set HOME/XDG_CACHE_HOME"))?;
    let store = SqliteStore::open(&db_path)?;

    match cli.command.as_str() {
        "load" => {
            let path = cli
                .positional
                .first()
                .ok_or_else(|| anyhow!("load requires a JSON file\n\n{USAGE}"))?;
            let raw = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            let games: Vec<GameRow> =
                serde_json::from_str(&raw).with_context(|| format!("parse {path}"))?;
            let (added, updated) = store.upsert_games(&games)?;
            info!(added, updated, db = %db_path.display(), "games loaded");
        }
        "predict" => {
            let opponent = cli
                .positional
                .first()
                .ok_or_else(|| anyhow!("predict requires an opponent name\n\n{USAGE}"))?
                .clone();
            let analyzer = TransitiveAnalyzer::new(&store, analyzer_config(&cli)?);
            let result = analyzer.predict_outcome(&opponent, cli.league.as_deref())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_prediction(&result);
            }
        }
        "upcoming" => {
            let analyzer = TransitiveAnalyzer::new(&store, analyzer_config(&cli)?);
            let results = analyzer.predict_upcoming(cli.league.as_deref())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No upcoming fixtures found.");
            } else {
                for result in &results {
                    print_prediction(result);
                    println!();
                }
            }
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }

    Ok(())
}

fn analyzer_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let team = cli
        .team
        .clone()
        .or_else(|| std::env::var("MATCHLENS_TEAM").ok())
        .ok_or_else(|| anyhow!("no team given; pass --team or set MATCHLENS_TEAM\n\n{USAGE}"))?;

    let mut config = AnalyzerConfig::for_team(team);
    if let Some(window) = cli.window {
        config.time_window_days = window;
    }
    if let Some(min_shared) = cli.min_shared {
        config.min_shared_opponents = min_shared;
    }
    if let Some(half_life) = cli.half_life {
        config.recency_half_life_days = half_life;
    }
    Ok(config)
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Cli> {
    let mut args = args;
    let command = args.next().ok_or_else(|| anyhow!("{USAGE}"))?;

    let mut cli = Cli {
        command,
        positional: Vec::new(),
        team: None,
        db: None,
        league: None,
        window: None,
        min_shared: None,
        half_life: None,
        json: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--team" => cli.team = Some(required_value(&arg, args.next())?),
            "--db" => cli.db = Some(PathBuf::from(required_value(&arg, args.next())?)),
            "--league" => cli.league = Some(required_value(&arg, args.next())?),
            "--window" => cli.window = Some(parse_number(&arg, args.next())?),
            "--min-shared" => cli.min_shared = Some(parse_number(&arg, args.next())?),
            "--half-life" => cli.half_life = Some(parse_number(&arg, args.next())?),
            "--json" => cli.json = true,
            "--help" | "-h" => bail!("{USAGE}"),
            other if other.starts_with("--") => bail!("unknown flag {other:?}\n\n{USAGE}"),
            _ => cli.positional.push(arg),
        }
    }

    Ok(cli)
}

fn required_value(flag: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| anyhow!("{flag} requires a value\n\n{USAGE}"))
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T> {
    required_value(flag, value)?
        .parse::<T>()
        .map_err(|_| anyhow!("{flag} requires a number"))
}

fn print_prediction(result: &PredictionResult) {
    println!("{} vs {}", result.our_team, result.opponent);
    println!(
        "  Outcome:    {} (confidence {:.0}%)",
        result.outcome, result.confidence
    );
    println!(
        "  Advantage:  {:+.2}  {}",
        result.advantage_score,
        result.advantage_bar()
    );
    match &result.league_filter {
        Some(league) => println!(
            "  Window:     {} days, league \"{league}\"",
            result.time_window_days
        ),
        None => println!("  Window:     {} days", result.time_window_days),
    }

    if result.comparisons.is_empty() {
        println!("  Shared opponents: none");
    } else {
        println!("  Shared opponents ({}):", result.shared_opponent_count());
        for comparison in &result.comparisons {
            println!(
                "    {:<28} us {} ({}) | them {} ({}) | recency {:.2}",
                comparison.opponent,
                comparison.our_record.record_str(),
                comparison.our_record.goal_diff_str(),
                comparison.their_record.record_str(),
                comparison.their_record.goal_diff_str(),
                comparison.recency_weight,
            );
        }
    }

    if let Some(h2h) = &result.head_to_head {
        println!(
            "  Head-to-head: {} ({}) over {} games",
            h2h.record_str(),
            h2h.goal_diff_str(),
            h2h.games_played()
        );
    }
}
