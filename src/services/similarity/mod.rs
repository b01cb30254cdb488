// ============================================
// Similarity Engine
// ============================================
//
// Maintains user-user and item-item similarity, incrementally updated:
// every new interaction recomputes the touched user's row against all
// known users and the touched item's row against all known items.
//
// Pairwise similarity of two interaction histories in the same space:
//   common = keys both histories touch (items for users, users for items)
//   per key: 1 - |normalized(a, key) - normalized(b, key)|
//   similarity = mean over common keys
//
// normalized(history, key) is the average of time-decayed interaction
// values on that key, with linear decay reaching zero at
// `max_interaction_age_days`. Pairs with no common key are never written:
// absence means "no evidence", which is not the same as similarity zero.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::RankingConfig;
use crate::models::Interaction;
use crate::services::interactions::InteractionStore;

/// Sparse symmetric map of pairwise affinity scores in [0, 1].
///
/// Invariants: `similarity(a, b) == similarity(b, a)` for every stored
/// pair, no self-similarity entries, values clamped to [0, 1].
#[derive(Debug, Default)]
pub struct SimilarityMatrix {
    entries: HashMap<String, HashMap<String, f64>>,
}

impl SimilarityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored similarity for a pair, `None` when never computed.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        self.entries.get(a).and_then(|row| row.get(b)).copied()
    }

    pub fn neighbors(&self, key: &str) -> Option<&HashMap<String, f64>> {
        self.entries.get(key)
    }

    /// Top-k neighbors of a key, sorted by similarity descending.
    pub fn top_neighbors(&self, key: &str, k: usize) -> Vec<(String, f64)> {
        let Some(row) = self.entries.get(key) else {
            return Vec::new();
        };
        let mut neighbors: Vec<(String, f64)> = row
            .iter()
            .map(|(id, score)| (id.clone(), *score))
            .collect();
        neighbors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(k);
        neighbors
    }

    /// Number of keys with at least one stored pair.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes both directions. Self-pairs are ignored and values clamped.
    pub(crate) fn set(&mut self, a: &str, b: &str, similarity: f64) {
        if a == b {
            return;
        }
        let clamped = similarity.clamp(0.0, 1.0);
        self.entries
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), clamped);
        self.entries
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string(), clamped);
    }
}

/// Incremental maintainer of the user-space and item-space matrices.
pub struct SimilarityEngine {
    users: SimilarityMatrix,
    items: SimilarityMatrix,
    max_interaction_age_days: f64,
}

impl SimilarityEngine {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            users: SimilarityMatrix::new(),
            items: SimilarityMatrix::new(),
            max_interaction_age_days: config.max_interaction_age_days,
        }
    }

    pub fn user_similarities(&self) -> &SimilarityMatrix {
        &self.users
    }

    pub fn item_similarities(&self) -> &SimilarityMatrix {
        &self.items
    }

    /// Update hook, called after the store has appended the interaction.
    ///
    /// Recomputes the interaction's user against every other known user
    /// and its item against every other known item — O(N) per event over
    /// the session's working set.
    pub fn on_new_interaction(
        &mut self,
        store: &InteractionStore,
        interaction: &Interaction,
        now: DateTime<Utc>,
    ) {
        let max_age = self.max_interaction_age_days;

        let user_history = store.interactions_for_user(&interaction.user_id);
        for other in store.user_ids() {
            if other == interaction.user_id {
                continue;
            }
            let other_history = store.interactions_for_user(other);
            if let Some(similarity) =
                pairwise_similarity(&user_history, &other_history, item_key, now, max_age)
            {
                self.users.set(&interaction.user_id, other, similarity);
            }
        }

        let item_history = store.interactions_for_item(&interaction.item_id);
        for other in store.item_ids() {
            if other == interaction.item_id {
                continue;
            }
            let other_history = store.interactions_for_item(other);
            if let Some(similarity) =
                pairwise_similarity(&item_history, &other_history, user_key, now, max_age)
            {
                self.items.set(&interaction.item_id, other, similarity);
            }
        }

        debug!(
            user_id = %interaction.user_id,
            item_id = %interaction.item_id,
            user_rows = self.users.len(),
            item_rows = self.items.len(),
            "Similarity rows refreshed"
        );
    }

    /// Top-k users most similar to the given user.
    pub fn similar_users(&self, user_id: &str, k: usize) -> Vec<(String, f64)> {
        self.users.top_neighbors(user_id, k)
    }

    /// Top-k items most similar to the given item.
    pub fn similar_items(&self, item_id: &str, k: usize) -> Vec<(String, f64)> {
        self.items.top_neighbors(item_id, k)
    }
}

pub(crate) fn item_key(interaction: &Interaction) -> &str {
    &interaction.item_id
}

pub(crate) fn user_key(interaction: &Interaction) -> &str {
    &interaction.user_id
}

/// Average time-decayed value of a history's interactions on one key.
///
/// Returns `None` when the history never touched the key, so callers can
/// skip the pair instead of scoring it as zero.
pub(crate) fn normalized_value(
    history: &[&Interaction],
    key: &str,
    key_of: fn(&Interaction) -> &str,
    now: DateTime<Utc>,
    max_age_days: f64,
) -> Option<f64> {
    let matching: Vec<&Interaction> = history
        .iter()
        .copied()
        .filter(|&i| key_of(i) == key)
        .collect();
    if matching.is_empty() {
        return None;
    }

    let decayed_sum: f64 = matching
        .iter()
        .map(|i| i.value * linear_decay(i.age_days(now), max_age_days))
        .sum();

    // Average over the interaction count, not the decay sum: stale
    // interactions dilute the value instead of disappearing from it.
    Some((decayed_sum / matching.len() as f64).min(1.0))
}

fn linear_decay(age_days: f64, max_age_days: f64) -> f64 {
    (1.0 - age_days / max_age_days).max(0.0)
}

fn pairwise_similarity(
    a: &[&Interaction],
    b: &[&Interaction],
    key_of: fn(&Interaction) -> &str,
    now: DateTime<Utc>,
    max_age_days: f64,
) -> Option<f64> {
    let keys_a: HashSet<&str> = a.iter().map(|&i| key_of(i)).collect();
    let keys_b: HashSet<&str> = b.iter().map(|&i| key_of(i)).collect();
    let common: Vec<&str> = keys_a.intersection(&keys_b).copied().collect();

    if common.is_empty() {
        return None;
    }

    let mut agreement = 0.0;
    for &key in &common {
        let value_a = normalized_value(a, key, key_of, now, max_age_days).unwrap_or(0.0);
        let value_b = normalized_value(b, key, key_of, now, max_age_days).unwrap_or(0.0);
        agreement += 1.0 - (value_a - value_b).abs();
    }

    Some((agreement / common.len() as f64).clamp(0.0, 1.0))
}
