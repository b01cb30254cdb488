// ============================================
// Feed Session
// ============================================
//
// Orchestrator for one viewing user's feed. Owns the in-memory item
// collection, the interaction log, the similarity matrices and the
// ranker. Every mutation entry point follows the same path:
//
//   validate -> mutate local counters -> record interaction(s)
//   -> refresh similarity rows -> full re-rank -> fire-and-forget
//   persistence -> notify listener
//
// Mutations take `&mut self`: single-writer discipline is expressed
// through ownership, since a similarity refresh reads-then-writes the
// full neighbor set and cannot be interleaved. Reads take `&self`.
//
// The durable write-through is spawned and never awaited on the ranking
// path; a failed write is logged and local state is not rolled back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::RankingConfig;
use crate::db::{DocumentStore, FeedRepository};
use crate::error::{FeedError, Result};
use crate::models::{Comment, FeedItem, Interaction, InteractionType};
use crate::services::interactions::InteractionStore;
use crate::services::prediction::ScorePredictor;
use crate::services::ranking::FeedRanker;
use crate::services::similarity::SimilarityEngine;

/// Callback invoked with the new item order after every re-rank.
pub type RankingListener = Box<dyn Fn(&[String]) + Send + Sync>;

pub struct FeedSession {
    viewer_id: String,
    /// Feed items, kept in ranked order.
    items: Vec<FeedItem>,
    store: InteractionStore,
    engine: SimilarityEngine,
    predictor: ScorePredictor,
    ranker: FeedRanker,
    config: RankingConfig,
    repository: Option<Arc<FeedRepository>>,
    listener: Option<RankingListener>,
}

impl std::fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSession")
            .field("viewer_id", &self.viewer_id)
            .field("items", &self.items.len())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl FeedSession {
    pub fn new(
        viewer_id: impl Into<String>,
        items: Vec<FeedItem>,
        config: RankingConfig,
    ) -> Result<Self> {
        let viewer_id = viewer_id.into();
        if viewer_id.is_empty() {
            return Err(FeedError::validation("viewer_id is empty"));
        }
        config.validate()?;

        let mut session = Self {
            viewer_id,
            items,
            store: InteractionStore::new(),
            engine: SimilarityEngine::new(&config),
            predictor: ScorePredictor::new(&config),
            ranker: FeedRanker::new(config.clone()),
            config,
            repository: None,
            listener: None,
        };
        session.resort(Utc::now());
        Ok(session)
    }

    /// Attach the durable store for fire-and-forget write-through.
    pub fn with_repository(mut self, repository: Arc<FeedRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Attach the ranking-changed callback.
    pub fn with_ranking_listener(mut self, listener: RankingListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Build a session from the durable store: public notebooks plus the
    /// persisted interaction history, replayed through the similarity
    /// engine.
    pub async fn load(
        viewer_id: impl Into<String>,
        config: RankingConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        let repository = Arc::new(FeedRepository::new(store));
        let (items, history) = futures::try_join!(
            repository.load_public_items(),
            repository.load_interactions()
        )?;

        let mut session = Self::new(viewer_id, items, config)?.with_repository(repository);
        info!(
            viewer_id = %session.viewer_id,
            items = session.items.len(),
            interactions = history.len(),
            "Feed session loaded from durable store"
        );
        session.replay(history)?;
        Ok(session)
    }

    /// Rebuild the interaction log and similarity matrices from persisted
    /// history. Item counters already live in the loaded documents, so
    /// replay only reconstructs the model state.
    pub fn replay(&mut self, history: Vec<Interaction>) -> Result<()> {
        let now = Utc::now();
        for interaction in history {
            self.store.record(interaction.clone())?;
            self.engine.on_new_interaction(&self.store, &interaction, now);
        }
        self.resort(now);
        Ok(())
    }

    // ---- Reads -------------------------------------------------------

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Items in current ranked order.
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn item(&self, item_id: &str) -> Option<&FeedItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn ranked_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn interaction_count(&self) -> usize {
        self.store.len()
    }

    /// Predicted affinity of the viewer for one item.
    pub fn predict(&self, item_id: &str) -> f64 {
        self.predictor
            .predict(&self.viewer_id, item_id, &self.store, &self.engine, Utc::now())
    }

    /// Top-n feed items the viewer has not interacted with, by predicted
    /// affinity.
    pub fn recommendations(&self, n: usize) -> Vec<(String, f64)> {
        let candidates: Vec<String> = self.items.iter().map(|item| item.id.clone()).collect();
        self.predictor.recommend(
            &self.viewer_id,
            &candidates,
            n,
            &self.store,
            &self.engine,
            Utc::now(),
        )
    }

    // ---- Mutations ---------------------------------------------------

    /// Flip the viewer's like on an item. Every call records a like
    /// interaction; the counter moves down again when unliking.
    pub fn toggle_like(&mut self, item_id: &str) -> Result<()> {
        let now = Utc::now();
        let index = self.item_index(item_id)?;
        let interaction = Interaction::new(
            self.viewer_id.clone(),
            item_id,
            InteractionType::Like,
            now,
            InteractionType::Like.base_value(&self.config.interaction_values),
        )?;

        let item = &mut self.items[index];
        if item.is_liked {
            item.like_count = item.like_count.saturating_sub(1);
        } else {
            item.like_count += 1;
        }
        item.is_liked = !item.is_liked;

        self.apply(vec![interaction], index, now)
    }

    /// Flip the viewer's save on an item. The save counter only moves on
    /// the transition to saved.
    pub fn toggle_save(&mut self, item_id: &str) -> Result<()> {
        let now = Utc::now();
        let index = self.item_index(item_id)?;
        let interaction = Interaction::new(
            self.viewer_id.clone(),
            item_id,
            InteractionType::Save,
            now,
            InteractionType::Save.base_value(&self.config.interaction_values),
        )?;

        let item = &mut self.items[index];
        if !item.is_saved {
            item.save_count += 1;
        }
        item.is_saved = !item.is_saved;

        self.apply(vec![interaction], index, now)
    }

    /// Append a comment to the item and record the engagement.
    pub fn add_comment(
        &mut self,
        item_id: &str,
        text: impl Into<String>,
        author: impl Into<String>,
    ) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(FeedError::validation("comment text is empty"));
        }

        let now = Utc::now();
        let index = self.item_index(item_id)?;
        let interaction = Interaction::new(
            self.viewer_id.clone(),
            item_id,
            InteractionType::Comment,
            now,
            InteractionType::Comment.base_value(&self.config.interaction_values),
        )?;

        let item = &mut self.items[index];
        item.comments.push(Comment::new(author, text, now));
        item.comment_count += 1;

        self.apply(vec![interaction], index, now)
    }

    pub fn increment_share(&mut self, item_id: &str) -> Result<()> {
        let now = Utc::now();
        let index = self.item_index(item_id)?;
        let interaction = Interaction::new(
            self.viewer_id.clone(),
            item_id,
            InteractionType::Share,
            now,
            InteractionType::Share.base_value(&self.config.interaction_values),
        )?;

        self.items[index].share_count += 1;

        self.apply(vec![interaction], index, now)
    }

    /// Record a view with its dwell time. A positive dwell additionally
    /// records a time-spent interaction, saturating at the configured cap.
    pub fn record_view(&mut self, item_id: &str, dwell_seconds: f64) -> Result<()> {
        if !dwell_seconds.is_finite() || dwell_seconds < 0.0 {
            return Err(FeedError::Validation(format!(
                "dwell_seconds {dwell_seconds} is not a non-negative duration"
            )));
        }

        let now = Utc::now();
        let index = self.item_index(item_id)?;

        let mut interactions = vec![Interaction::new(
            self.viewer_id.clone(),
            item_id,
            InteractionType::View,
            now,
            InteractionType::View.base_value(&self.config.interaction_values),
        )?];
        if dwell_seconds > 0.0 {
            interactions.push(Interaction::new(
                self.viewer_id.clone(),
                item_id,
                InteractionType::TimeSpent,
                now,
                (dwell_seconds / self.config.time_spent_cap_secs).min(1.0),
            )?);
        }

        let item = &mut self.items[index];
        item.view_count += 1;
        item.time_spent_seconds += dwell_seconds;

        self.apply(interactions, index, now)
    }

    /// Re-rank without a new interaction (time decay moves with the
    /// clock). Deterministic given no new events at a fixed instant.
    pub fn refresh(&mut self) {
        self.resort(Utc::now());
    }

    // ---- Internals ---------------------------------------------------

    fn item_index(&self, item_id: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| FeedError::not_found(format!("feed item {item_id}")))
    }

    fn apply(
        &mut self,
        interactions: Vec<Interaction>,
        item_index: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for interaction in &interactions {
            self.store.record(interaction.clone())?;
            self.engine.on_new_interaction(&self.store, interaction, now);
        }

        self.persist(interactions, self.items[item_index].clone());
        self.resort(now);
        Ok(())
    }

    /// Fire-and-forget write-through. Failure is a warning; in-memory
    /// state stays authoritative.
    fn persist(&self, interactions: Vec<Interaction>, item: FeedItem) {
        let Some(repository) = &self.repository else {
            return;
        };
        let repository = Arc::clone(repository);
        tokio::spawn(async move {
            if let Err(err) = repository.write_through(&interactions, &item).await {
                warn!(
                    item_id = %item.id,
                    error = %err,
                    "Feed write-through failed; in-memory state remains authoritative"
                );
            }
        });
    }

    /// Full recomputation and re-sort of the visible set: time decay
    /// depends on "now" for every item, so a single interaction re-scores
    /// everything, not just the touched item.
    fn resort(&mut self, now: DateTime<Utc>) {
        let items = std::mem::take(&mut self.items);
        self.items = self.ranker.rank(
            items,
            &self.viewer_id,
            &self.store,
            Some(&self.predictor),
            &self.engine,
            now,
        );

        if let Some(listener) = &self.listener {
            let order: Vec<String> = self.items.iter().map(|item| item.id.clone()).collect();
            listener(&order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    fn items(now: DateTime<Utc>) -> Vec<FeedItem> {
        vec![
            FeedItem::new("n1", "owner-1", now - Duration::hours(2)),
            FeedItem::new("n2", "owner-2", now - Duration::hours(2)),
            FeedItem::new("n3", "owner-3", now - Duration::hours(2)),
        ]
    }

    fn session() -> FeedSession {
        FeedSession::new("alice", items(Utc::now()), RankingConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_viewer() {
        let err = FeedSession::new("", Vec::new(), RankingConfig::default()).unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
    }

    #[test]
    fn test_toggle_like_twice_returns_to_baseline_with_two_records() {
        let mut session = session();

        session.toggle_like("n1").unwrap();
        {
            let item = session.item("n1").unwrap();
            assert!(item.is_liked);
            assert_eq!(item.like_count, 1);
        }

        session.toggle_like("n1").unwrap();
        let item = session.item("n1").unwrap();
        assert!(!item.is_liked);
        assert_eq!(item.like_count, 0);

        // Recording is not idempotent: both toggles are logged.
        assert_eq!(session.interaction_count(), 2);
    }

    #[test]
    fn test_toggle_save_counts_only_the_transition_to_saved() {
        let mut session = session();

        session.toggle_save("n2").unwrap();
        session.toggle_save("n2").unwrap();

        let item = session.item("n2").unwrap();
        assert!(!item.is_saved);
        assert_eq!(item.save_count, 1);
        assert_eq!(session.interaction_count(), 2);
    }

    #[test]
    fn test_record_view_with_long_dwell_saturates_time_spent() {
        let mut session = session();

        session.record_view("n1", 310.0).unwrap();

        let item = session.item("n1").unwrap();
        assert_eq!(item.view_count, 1);
        assert!((item.time_spent_seconds - 310.0).abs() < f64::EPSILON);

        // One view record plus one saturated time-spent record.
        assert_eq!(session.interaction_count(), 2);
        let time_spent: Vec<&Interaction> = session
            .store
            .interactions_for_user("alice")
            .into_iter()
            .filter(|i| i.interaction_type == InteractionType::TimeSpent)
            .collect();
        assert_eq!(time_spent.len(), 1);
        assert!((time_spent[0].value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_view_with_zero_dwell_records_only_the_view() {
        let mut session = session();
        session.record_view("n1", 0.0).unwrap();
        assert_eq!(session.interaction_count(), 1);
    }

    #[test]
    fn test_record_view_rejects_negative_dwell() {
        let mut session = session();
        let err = session.record_view("n1", -5.0).unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
        assert_eq!(session.item("n1").unwrap().view_count, 0);
        assert_eq!(session.interaction_count(), 0);
    }

    #[test]
    fn test_unknown_item_is_not_found_and_leaves_no_trace() {
        let mut session = session();
        let err = session.toggle_like("missing").unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
        assert_eq!(session.interaction_count(), 0);
    }

    #[test]
    fn test_add_comment_appends_and_counts() {
        let mut session = session();
        session.add_comment("n1", "love the ink sketches", "alice").unwrap();

        let item = session.item("n1").unwrap();
        assert_eq!(item.comment_count, 1);
        assert_eq!(item.comments.len(), 1);
        assert_eq!(item.comments[0].text, "love the ink sketches");

        let err = session.add_comment("n1", "   ", "alice").unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
    }

    #[test]
    fn test_increment_share_bumps_counter_and_logs() {
        let mut session = session();
        session.increment_share("n3").unwrap();
        session.increment_share("n3").unwrap();

        assert_eq!(session.item("n3").unwrap().share_count, 2);
        assert_eq!(session.interaction_count(), 2);
    }

    #[test]
    fn test_engaged_item_rises_in_the_ranking() {
        let mut session = session();

        session.toggle_like("n3").unwrap();
        session.record_view("n3", 120.0).unwrap();

        assert_eq!(session.ranked_ids()[0], "n3");
    }

    #[test]
    fn test_refresh_is_deterministic_without_new_interactions() {
        let mut session = session();
        session.toggle_like("n2").unwrap();

        let before = session.ranked_ids();
        session.refresh();
        session.refresh();
        assert_eq!(session.ranked_ids(), before);
    }

    #[test]
    fn test_listener_fires_on_every_reranking() {
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut session = FeedSession::new("alice", items(Utc::now()), RankingConfig::default())
            .unwrap()
            .with_ranking_listener(Box::new(move |order| {
                sink.lock().unwrap().push(order.to_vec());
            }));

        session.toggle_like("n1").unwrap();
        session.increment_share("n2").unwrap();

        let calls = seen.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].len(), 3);
    }

    #[test]
    fn test_replay_rebuilds_similarity_state() {
        let now = Utc::now();
        let history = vec![
            Interaction::new("alice", "n1", InteractionType::Like, now, 0.8).unwrap(),
            Interaction::new("bob", "n1", InteractionType::Like, now, 0.8).unwrap(),
            Interaction::new("bob", "n2", InteractionType::Like, now, 0.9).unwrap(),
        ];

        let mut session = session();
        session.replay(history).unwrap();

        assert_eq!(session.interaction_count(), 3);
        assert!(session.predict("n2") > 0.0);
    }
}
