pub mod retriever;
pub mod rewriter;
pub mod scoring;

pub use retriever::Retriever;
pub use rewriter::{HistoryTurn, QueryRewriter};
pub use scoring::{FusionWeights, Scored, Scores};
