pub mod interactions;
pub mod prediction;
pub mod ranking;
pub mod session;
pub mod similarity;

pub use interactions::InteractionStore;
pub use prediction::ScorePredictor;
pub use ranking::FeedRanker;
pub use session::{FeedSession, RankingListener};
pub use similarity::{SimilarityEngine, SimilarityMatrix};
