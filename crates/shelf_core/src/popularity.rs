//! Context-free popularity ordering.
//!
//! Articles need at least [`MIN_RATINGS`] ratings before their count and average
//! take part in the ordering. Below that threshold an article is ranked only by
//! recency, after every article that qualifies.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::types::{Article, RatingStats};

pub const MIN_RATINGS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopularityKey {
    pub rating_count: usize,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
}

impl PopularityKey {
    pub fn new(stats: RatingStats, created_at: DateTime<Utc>) -> Self {
        if stats.count >= MIN_RATINGS {
            Self {
                rating_count: stats.count,
                average_rating: stats.average,
                created_at,
            }
        } else {
            Self {
                rating_count: 0,
                average_rating: 0.0,
                created_at,
            }
        }
    }

    /// `Ordering::Less` means `self` ranks ahead of `other`.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .rating_count
            .cmp(&self.rating_count)
            .then_with(|| other.average_rating.total_cmp(&self.average_rating))
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

/// Orders candidates most popular first.
pub fn rank_popular(mut candidates: Vec<(Article, RatingStats)>) -> Vec<Article> {
    candidates.sort_by(|(a, a_stats), (b, b_stats)| {
        PopularityKey::new(*a_stats, a.created_at).rank_cmp(&PopularityKey::new(*b_stats, b.created_at))
    });
    candidates.into_iter().map(|(article, _)| article).collect()
}
