pub mod memory;

#[cfg(feature = "qdrant")]
pub mod qdrant;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStorage;

#[cfg(feature = "qdrant")]
pub use qdrant::QdrantStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SQLiteStorage;

use shelf_core::vector::cosine_similarity;
use shelf_core::Article;
use tracing::debug;

/// Order recommendable candidates by cosine similarity to `query`, closest first.
///
/// Candidates whose embedding has a different dimensionality are skipped.
pub(crate) fn rank_by_similarity(query: &[f32], candidates: Vec<Article>, limit: usize) -> Vec<Article> {
    let mut scored: Vec<(f32, Article)> = candidates
        .into_iter()
        .filter(|a| a.is_recommendable())
        .filter_map(|a| {
            let similarity = match cosine_similarity(query, a.embedding.as_deref()?) {
                Ok(similarity) => similarity,
                Err(e) => {
                    debug!("Skipping article {} in similarity scan: {}", a.id, e);
                    return None;
                }
            };
            Some((similarity, a))
        })
        .collect();

    scored.sort_by(|(a_sim, a), (b_sim, b)| b_sim.total_cmp(a_sim).then_with(|| a.id.cmp(&b.id)));
    scored.into_iter().take(limit).map(|(_, a)| a).collect()
}
