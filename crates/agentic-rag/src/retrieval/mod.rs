//! Retrieval orchestration and relevance scoring

mod contextual;

pub use contextual::ContextualRag;

/// Added to distances before inversion so exact matches stay finite
pub const SCORE_EPSILON: f32 = 1e-6;

/// Convert a vector distance (lower is closer) into a relevance score
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (SCORE_EPSILON + distance)
}
