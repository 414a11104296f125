pub mod analyzer;
pub mod comparison;
pub mod record;
pub mod store;

pub use analyzer::{AnalyzerConfig, Outcome, PredictionResult, TransitiveAnalyzer};
pub use comparison::SharedOpponentComparison;
pub use record::{HeadToHeadRecord, TeamRecord};
pub use store::{FixtureRow, GameRow, GameStore, SqliteStore};
