//! Collaborative-filtering affinity prediction.
//!
//! Blends two signals into one predicted affinity in [0, 1]:
//! - user-based: what did users similar to this one think of the item
//! - item-based: what did this user think of items similar to this one
//!
//! Each side is a similarity-weighted average of time-decayed interaction
//! values over neighbors whose stored similarity exceeds the configured
//! threshold. A neighbor with no value on the target key is skipped, not
//! counted as zero.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::RankingConfig;
use crate::services::interactions::InteractionStore;
use crate::services::similarity::{item_key, normalized_value, user_key, SimilarityEngine};

pub struct ScorePredictor {
    similarity_threshold: f64,
    user_cf_weight: f64,
    item_cf_weight: f64,
    max_interaction_age_days: f64,
}

impl ScorePredictor {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            user_cf_weight: config.user_cf_weight,
            item_cf_weight: config.item_cf_weight,
            max_interaction_age_days: config.max_interaction_age_days,
        }
    }

    /// Predicted affinity of a user for an item.
    ///
    /// Returns 0.0 when neither side has a qualifying neighbor with a
    /// value on the target, including the cold-start case of no
    /// interactions anywhere.
    pub fn predict(
        &self,
        user_id: &str,
        item_id: &str,
        store: &InteractionStore,
        engine: &SimilarityEngine,
        now: DateTime<Utc>,
    ) -> f64 {
        let user_based = self.user_based_score(user_id, item_id, store, engine, now);
        let item_based = self.item_based_score(user_id, item_id, store, engine, now);

        (self.user_cf_weight * user_based + self.item_cf_weight * item_based).clamp(0.0, 1.0)
    }

    /// Weighted average of neighbor users' values on the item.
    fn user_based_score(
        &self,
        user_id: &str,
        item_id: &str,
        store: &InteractionStore,
        engine: &SimilarityEngine,
        now: DateTime<Utc>,
    ) -> f64 {
        let Some(neighbors) = engine.user_similarities().neighbors(user_id) else {
            return 0.0;
        };

        let mut weighted_sum = 0.0;
        let mut total_similarity = 0.0;
        for (other_user, &similarity) in neighbors {
            if similarity <= self.similarity_threshold {
                continue;
            }
            let history = store.interactions_for_user(other_user);
            if let Some(value) = normalized_value(
                &history,
                item_id,
                item_key,
                now,
                self.max_interaction_age_days,
            ) {
                weighted_sum += similarity * value;
                total_similarity += similarity;
            }
        }

        if total_similarity > 0.0 {
            weighted_sum / total_similarity
        } else {
            0.0
        }
    }

    /// Weighted average of the user's values on the item's neighbors.
    fn item_based_score(
        &self,
        user_id: &str,
        item_id: &str,
        store: &InteractionStore,
        engine: &SimilarityEngine,
        now: DateTime<Utc>,
    ) -> f64 {
        let Some(neighbors) = engine.item_similarities().neighbors(item_id) else {
            return 0.0;
        };

        let mut weighted_sum = 0.0;
        let mut total_similarity = 0.0;
        for (other_item, &similarity) in neighbors {
            if similarity <= self.similarity_threshold {
                continue;
            }
            let history = store.interactions_for_item(other_item);
            if let Some(value) = normalized_value(
                &history,
                user_id,
                user_key,
                now,
                self.max_interaction_age_days,
            ) {
                weighted_sum += similarity * value;
                total_similarity += similarity;
            }
        }

        if total_similarity > 0.0 {
            weighted_sum / total_similarity
        } else {
            0.0
        }
    }

    /// Top-n candidates the user has not interacted with, ranked by
    /// predicted affinity. Candidates without any positive prediction are
    /// dropped.
    pub fn recommend(
        &self,
        user_id: &str,
        candidates: &[String],
        n: usize,
        store: &InteractionStore,
        engine: &SimilarityEngine,
        now: DateTime<Utc>,
    ) -> Vec<(String, f64)> {
        let seen: HashSet<&str> = store
            .interactions_for_user(user_id)
            .iter()
            .map(|i| i.item_id.as_str())
            .collect();

        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .filter(|id| !seen.contains(id.as_str()))
            .map(|id| (id.clone(), self.predict(user_id, id, store, engine, now)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n);

        debug!(
            user_id = %user_id,
            candidates = candidates.len(),
            recommended = scored.len(),
            "Recommendation candidates scored"
        );

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interaction, InteractionType};
    use chrono::Utc;

    fn build(
        events: &[(&str, &str, f64)],
        now: DateTime<Utc>,
    ) -> (InteractionStore, SimilarityEngine, ScorePredictor) {
        let config = RankingConfig::default();
        let mut store = InteractionStore::new();
        let mut engine = SimilarityEngine::new(&config);
        for &(user, item, value) in events {
            let event =
                Interaction::new(user, item, InteractionType::Like, now, value).unwrap();
            store.record(event.clone()).unwrap();
            engine.on_new_interaction(&store, &event, now);
        }
        (store, engine, ScorePredictor::new(&config))
    }

    #[test]
    fn test_predict_returns_zero_without_any_interactions() {
        let now = Utc::now();
        let (store, engine, predictor) = build(&[], now);
        assert_eq!(predictor.predict("alice", "n1", &store, &engine, now), 0.0);
    }

    #[test]
    fn test_predict_blends_user_and_item_signals() {
        let now = Utc::now();
        // alice and bob agree on n1, bob also rated n2.
        let (store, engine, predictor) = build(
            &[("alice", "n1", 0.8), ("bob", "n1", 0.8), ("bob", "n2", 0.6)],
            now,
        );
        // user-based: sim(alice, bob) = 1.0, bob's value on n2 = 0.6.
        // item-based: sim(n2, n1) = 0.8, alice's value on n1 = 0.8.
        // 0.6 * 0.6 + 0.4 * 0.8 = 0.68
        let predicted = predictor.predict("alice", "n2", &store, &engine, now);
        assert!((predicted - 0.68).abs() < 0.01);
    }

    #[test]
    fn test_predict_weights_neighbors_by_similarity() {
        let now = Utc::now();
        let (store, engine, predictor) = build(
            &[
                ("alice", "n1", 0.8),
                ("bob", "n1", 0.8),
                ("carol", "n1", 0.4),
                ("bob", "n2", 1.0),
                ("carol", "n2", 0.5),
            ],
            now,
        );
        // user-based: (1.0 * 1.0 + 0.6 * 0.5) / 1.6 = 0.8125
        // item-based: sim(n2, n1) = 0.85, alice's value on n1 = 0.8
        // 0.6 * 0.8125 + 0.4 * 0.8 = 0.8075
        let predicted = predictor.predict("alice", "n2", &store, &engine, now);
        assert!((predicted - 0.8075).abs() < 0.01);
    }

    #[test]
    fn test_neighbors_at_or_below_threshold_are_excluded() {
        let now = Utc::now();
        // sim(alice, bob) = 1 - |0.8 - 0.1| = 0.3: not strictly above the
        // 0.3 threshold, so bob cannot vouch for n2.
        let (store, engine, predictor) = build(
            &[("alice", "n1", 0.8), ("bob", "n1", 0.1), ("bob", "n2", 0.9)],
            now,
        );
        assert_eq!(predictor.predict("alice", "n2", &store, &engine, now), 0.0);
    }

    #[test]
    fn test_predict_stays_within_unit_range() {
        let now = Utc::now();
        let (store, engine, predictor) = build(
            &[
                ("alice", "n1", 1.0),
                ("bob", "n1", 1.0),
                ("bob", "n2", 1.0),
                ("carol", "n1", 1.0),
                ("carol", "n2", 1.0),
            ],
            now,
        );
        let predicted = predictor.predict("alice", "n2", &store, &engine, now);
        assert!((0.0..=1.0).contains(&predicted));
    }

    #[test]
    fn test_recommend_filters_seen_and_sorts_descending() {
        let now = Utc::now();
        let (store, engine, predictor) = build(
            &[
                ("alice", "n1", 0.9),
                ("bob", "n1", 0.9),
                ("bob", "n2", 0.9),
                ("bob", "n3", 0.3),
            ],
            now,
        );
        let candidates = vec!["n1".to_string(), "n2".to_string(), "n3".to_string()];
        let recommended = predictor.recommend("alice", &candidates, 10, &store, &engine, now);

        // n1 is already seen by alice; n2 should outrank n3.
        assert_eq!(recommended.len(), 2);
        assert_eq!(recommended[0].0, "n2");
        assert_eq!(recommended[1].0, "n3");
        assert!(recommended[0].1 >= recommended[1].1);

        let top_one = predictor.recommend("alice", &candidates, 1, &store, &engine, now);
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].0, "n2");
    }
}
