use shelf_core::vector::ensure_same_dimension;
use shelf_core::{Rating, Result};

/// Ratings at or above this score shape the taste profile
pub const HIGH_RATING_THRESHOLD: i32 = 4;

pub fn is_high_rating(score: i32) -> bool {
    score >= HIGH_RATING_THRESHOLD
}

/// Weight of a rated article in the profile, in (0, 1]
pub fn rating_weight(score: i32) -> f32 {
    score as f32 / Rating::MAX_SCORE as f32
}

/// Weighted centroid of `embeddings`: Σ(wᵢ·eᵢ) / Σwᵢ per dimension.
///
/// Returns `None` for empty input, mismatched lengths or a zero total weight.
/// Embeddings of different dimensionality are an error.
pub fn weighted_profile(embeddings: &[Vec<f32>], weights: &[f32]) -> Result<Option<Vec<f32>>> {
    let Some(first) = embeddings.first() else {
        return Ok(None);
    };
    if embeddings.len() != weights.len() {
        return Ok(None);
    }

    let mut profile = vec![0.0f32; first.len()];
    let mut total_weight = 0.0f32;
    for (embedding, &weight) in embeddings.iter().zip(weights) {
        ensure_same_dimension(first, embedding)?;
        total_weight += weight;
        for (acc, value) in profile.iter_mut().zip(embedding) {
            *acc += value * weight;
        }
    }

    if total_weight <= 0.0 {
        return Ok(None);
    }
    profile.iter_mut().for_each(|v| *v /= total_weight);
    Ok(Some(profile))
}
