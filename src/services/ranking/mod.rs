//! Composite feed scoring and ordering.
//!
//! Per item:
//!   score = (w_e * engagement + w_r * relevance + w_q * quality
//!            + w_rec * recommendation) * time_decay
//!
//! - time_decay = 1 / (1 + ln(max(age_hours, 1))): 1.0 for fresh content,
//!   monotonically decreasing with age, never zero.
//! - engagement: weighted interaction counters, saturating at the
//!   configured sum.
//! - relevance: the viewing user's own recent interactions with the item.
//! - quality: content shape (pages, description length, body length).
//! - recommendation: collaborative-filtering prediction when a predictor
//!   is wired in, otherwise the configured neutral default.
//!
//! The sort is stable: equal-score items keep their input order.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::RankingConfig;
use crate::models::FeedItem;
use crate::services::interactions::InteractionStore;
use crate::services::prediction::ScorePredictor;
use crate::services::similarity::SimilarityEngine;

// Content shape at which each quality component saturates.
const FULL_QUALITY_PAGES: f64 = 10.0;
const FULL_QUALITY_DESCRIPTION_WORDS: f64 = 20.0;
const FULL_QUALITY_CONTENT_LENGTH: f64 = 500.0;

const QUALITY_PAGES_WEIGHT: f64 = 0.4;
const QUALITY_DESCRIPTION_WEIGHT: f64 = 0.3;
const QUALITY_CONTENT_WEIGHT: f64 = 0.3;

pub struct FeedRanker {
    config: RankingConfig,
}

impl FeedRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Score every item and return them sorted by composite score
    /// descending. Stable: ties keep the input order. A scoring failure
    /// for one item defaults that item to 0.0 and never aborts the rest.
    pub fn rank(
        &self,
        mut items: Vec<FeedItem>,
        viewer_id: &str,
        store: &InteractionStore,
        predictor: Option<&ScorePredictor>,
        engine: &SimilarityEngine,
        now: DateTime<Utc>,
    ) -> Vec<FeedItem> {
        for item in &mut items {
            let score = self.composite_score(item, viewer_id, store, predictor, engine, now);
            item.ranking_score = if score.is_finite() {
                score
            } else {
                warn!(item_id = %item.id, "Non-finite ranking score, defaulting to 0");
                0.0
            };
        }

        items.sort_by(|a, b| {
            b.ranking_score
                .partial_cmp(&a.ranking_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(viewer_id = %viewer_id, count = items.len(), "Feed re-ranked");

        items
    }

    pub fn composite_score(
        &self,
        item: &FeedItem,
        viewer_id: &str,
        store: &InteractionStore,
        predictor: Option<&ScorePredictor>,
        engine: &SimilarityEngine,
        now: DateTime<Utc>,
    ) -> f64 {
        let engagement = self.engagement_score(item);
        let relevance = self.user_relevance_score(item, viewer_id, store, now);
        let quality = quality_score(item);
        let recommendation = match predictor {
            Some(predictor) => predictor.predict(viewer_id, &item.id, store, engine, now),
            None => self.config.default_recommendation_score,
        };

        let weights = &self.config.composite;
        let blended = weights.engagement * engagement
            + weights.relevance * relevance
            + weights.quality * quality
            + weights.recommendation * recommendation;

        blended * time_decay(age_hours(item, now))
    }

    /// Weighted interaction counters, saturating at the configured sum.
    pub fn engagement_score(&self, item: &FeedItem) -> f64 {
        let weights = &self.config.engagement;
        let raw = item.view_count as f64 * weights.view
            + item.like_count as f64 * weights.like
            + item.comment_count as f64 * weights.comment
            + item.time_spent_seconds * weights.time_spent;
        (raw / weights.saturation).min(1.0)
    }

    /// The viewing user's own recent engagement with the item: each
    /// interaction inside the window contributes proportionally to how
    /// recent it is, clamped to [0, 1] overall.
    pub fn user_relevance_score(
        &self,
        item: &FeedItem,
        viewer_id: &str,
        store: &InteractionStore,
        now: DateTime<Utc>,
    ) -> f64 {
        let window = self.config.relevance_window_hours;
        let per_interaction = self.config.relevance_per_interaction;

        let total: f64 = store
            .interactions_for_user(viewer_id)
            .iter()
            .filter(|i| i.item_id == item.id)
            .map(|i| i.hours_ago(now))
            .filter(|&hours_ago| hours_ago < window)
            .map(|hours_ago| per_interaction * (window - hours_ago) / window)
            .sum();

        total.clamp(0.0, 1.0)
    }
}

/// Logarithmic recency discount: 1.0 at or under one hour of age, then
/// strictly decreasing, never reaching zero.
pub fn time_decay(age_hours: f64) -> f64 {
    1.0 / (1.0 + age_hours.max(1.0).ln())
}

pub fn age_hours(item: &FeedItem, now: DateTime<Utc>) -> f64 {
    (now - item.created_at).num_seconds().max(0) as f64 / 3_600.0
}

/// Content-shape quality in [0, 1]: page count, description length and
/// average page body length, each saturating at a full-quality target.
pub fn quality_score(item: &FeedItem) -> f64 {
    let pages = (item.page_count as f64 / FULL_QUALITY_PAGES).min(1.0);
    let description = (item.description_word_count as f64 / FULL_QUALITY_DESCRIPTION_WORDS).min(1.0);
    let content = (item.average_content_length / FULL_QUALITY_CONTENT_LENGTH).min(1.0);

    (QUALITY_PAGES_WEIGHT * pages
        + QUALITY_DESCRIPTION_WEIGHT * description
        + QUALITY_CONTENT_WEIGHT * content)
        .clamp(0.0, 1.0)
}
