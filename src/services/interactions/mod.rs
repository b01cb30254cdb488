//! Append-only log of user-item interaction events.
//!
//! Foundation for all similarity computation: the engine reads a key's
//! interaction history through the indexed views below. Entries are never
//! mutated or deleted; the log lives for the session and is rebuilt from
//! the durable store on the next load.

use std::collections::HashMap;

use tracing::trace;

use crate::error::Result;
use crate::models::Interaction;

#[derive(Debug, Default)]
pub struct InteractionStore {
    log: Vec<Interaction>,
    by_user: HashMap<String, Vec<usize>>,
    by_item: HashMap<String, Vec<usize>>,
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validated interaction. Pure append: the similarity update
    /// hook is driven by the session immediately after a successful record.
    ///
    /// Events are re-validated here even when built through
    /// `Interaction::new`, so replayed history from the durable store goes
    /// through the same gate.
    pub fn record(&mut self, interaction: Interaction) -> Result<()> {
        interaction.validate()?;

        let index = self.log.len();
        self.by_user
            .entry(interaction.user_id.clone())
            .or_default()
            .push(index);
        self.by_item
            .entry(interaction.item_id.clone())
            .or_default()
            .push(index);

        trace!(
            user_id = %interaction.user_id,
            item_id = %interaction.item_id,
            interaction_type = interaction.interaction_type.as_str(),
            "Interaction recorded"
        );

        self.log.push(interaction);
        Ok(())
    }

    pub fn interactions_for_user(&self, user_id: &str) -> Vec<&Interaction> {
        self.indexed(&self.by_user, user_id)
    }

    pub fn interactions_for_item(&self, item_id: &str) -> Vec<&Interaction> {
        self.indexed(&self.by_item, item_id)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.by_user.keys().map(String::as_str)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.by_item.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    fn indexed(&self, index: &HashMap<String, Vec<usize>>, key: &str) -> Vec<&Interaction> {
        index
            .get(key)
            .map(|positions| positions.iter().map(|&i| &self.log[i]).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::models::InteractionType;
    use chrono::Utc;

    fn interaction(user: &str, item: &str, value: f64) -> Interaction {
        Interaction::new(user, item, InteractionType::View, Utc::now(), value).unwrap()
    }

    #[test]
    fn test_record_and_query_by_user_and_item() {
        let mut store = InteractionStore::new();
        store.record(interaction("alice", "n1", 0.3)).unwrap();
        store.record(interaction("alice", "n2", 0.8)).unwrap();
        store.record(interaction("bob", "n1", 0.9)).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.interactions_for_user("alice").len(), 2);
        assert_eq!(store.interactions_for_user("bob").len(), 1);
        assert_eq!(store.interactions_for_item("n1").len(), 2);
        assert_eq!(store.interactions_for_item("n2").len(), 1);

        let mut users: Vec<&str> = store.user_ids().collect();
        users.sort_unstable();
        assert_eq!(users, vec!["alice", "bob"]);

        let mut items: Vec<&str> = store.item_ids().collect();
        items.sort_unstable();
        assert_eq!(items, vec!["n1", "n2"]);
    }

    #[test]
    fn test_unknown_key_returns_empty_not_error() {
        let store = InteractionStore::new();
        assert!(store.interactions_for_user("nobody").is_empty());
        assert!(store.interactions_for_item("nothing").is_empty());
    }

    #[test]
    fn test_record_rejects_malformed_replayed_event() {
        let mut store = InteractionStore::new();
        // Bypass the constructor the way a hand-built replay document could.
        let bad = Interaction {
            user_id: "alice".to_string(),
            item_id: "n1".to_string(),
            interaction_type: InteractionType::Like,
            timestamp: Utc::now(),
            value: 1.7,
        };
        let err = store.record(bad).unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_events_both_kept() {
        let mut store = InteractionStore::new();
        let event = interaction("alice", "n1", 0.3);
        store.record(event.clone()).unwrap();
        store.record(event).unwrap();
        assert_eq!(store.interactions_for_user("alice").len(), 2);
    }
}
