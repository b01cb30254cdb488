//! Write-through mapping between in-memory feed state and the durable
//! document store.
//!
//! The ranking core never blocks on these calls: the session spawns them
//! and treats failures as non-fatal warnings, so the in-memory state stays
//! authoritative under eventual consistency with the backing store.

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Document, DocumentStore, QueryOp, WriteOp};
use crate::error::{FeedError, Result};
use crate::models::{FeedItem, Interaction};

pub const INTERACTIONS_COLLECTION: &str = "interactions";
pub const NOTEBOOKS_COLLECTION: &str = "notebooks";

const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

pub struct FeedRepository {
    store: Arc<dyn DocumentStore>,
}

impl FeedRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append one interaction to the durable log under a fresh document id.
    pub async fn append_interaction(&self, interaction: &Interaction) -> Result<()> {
        let document = interaction_to_document(interaction)?;
        self.store
            .set(
                INTERACTIONS_COLLECTION,
                &Uuid::new_v4().to_string(),
                document,
            )
            .await
            .map_err(FeedError::Persistence)
    }

    /// Partial update of a notebook document's engagement counters.
    ///
    /// Viewer-relative flags (`is_liked`/`is_saved`) and the derived
    /// ranking score are session state and are not written to the shared
    /// document.
    pub async fn update_item_counters(&self, item: &FeedItem) -> Result<()> {
        self.store
            .update(NOTEBOOKS_COLLECTION, &item.id, counter_fields(item))
            .await
            .map_err(FeedError::Persistence)
    }

    /// One atomic batch: append the new interactions and refresh the
    /// touched notebook's counters.
    pub async fn write_through(&self, interactions: &[Interaction], item: &FeedItem) -> Result<()> {
        let mut operations = Vec::with_capacity(interactions.len() + 1);
        for interaction in interactions {
            operations.push(WriteOp::Set {
                collection: INTERACTIONS_COLLECTION.to_string(),
                id: Uuid::new_v4().to_string(),
                document: interaction_to_document(interaction)?,
            });
        }
        operations.push(WriteOp::Update {
            collection: NOTEBOOKS_COLLECTION.to_string(),
            id: item.id.clone(),
            fields: counter_fields(item),
        });

        self.store
            .batch(operations)
            .await
            .map_err(FeedError::Persistence)?;

        debug!(
            item_id = %item.id,
            interactions = interactions.len(),
            "Feed state written through"
        );
        Ok(())
    }

    /// Full interaction history in replay (timestamp-ascending) order.
    ///
    /// Malformed log documents are skipped with a warning rather than
    /// aborting the load.
    pub async fn load_interactions(&self) -> Result<Vec<Interaction>> {
        let documents = self
            .store
            .query(
                INTERACTIONS_COLLECTION,
                "timestamp",
                QueryOp::Gte,
                json!(EPOCH_TIMESTAMP),
            )
            .await
            .map_err(FeedError::Persistence)?;

        let mut interactions: Vec<Interaction> = Vec::with_capacity(documents.len());
        for document in documents {
            match serde_json::from_value::<Interaction>(Value::Object(document)) {
                Ok(interaction) => interactions.push(interaction),
                Err(err) => warn!("Skipping malformed interaction document: {err}"),
            }
        }

        interactions.sort_by_key(|interaction| interaction.timestamp);
        Ok(interactions)
    }

    /// All public notebooks, newest first (ties by id for a deterministic
    /// pre-ranking order).
    pub async fn load_public_items(&self) -> Result<Vec<FeedItem>> {
        let documents = self
            .store
            .query(NOTEBOOKS_COLLECTION, "is_public", QueryOp::Eq, json!(true))
            .await
            .map_err(FeedError::Persistence)?;

        let mut items: Vec<FeedItem> = Vec::with_capacity(documents.len());
        for document in documents {
            match serde_json::from_value::<FeedItem>(Value::Object(document)) {
                Ok(item) => items.push(item),
                Err(err) => warn!("Skipping malformed notebook document: {err}"),
            }
        }

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }
}

fn interaction_to_document(interaction: &Interaction) -> Result<Document> {
    match serde_json::to_value(interaction) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(FeedError::Persistence(anyhow!(
            "interaction did not serialize to a document"
        ))),
        Err(err) => Err(FeedError::Persistence(err.into())),
    }
}

fn counter_fields(item: &FeedItem) -> Document {
    let mut fields = Document::new();
    fields.insert("view_count".to_string(), json!(item.view_count));
    fields.insert("like_count".to_string(), json!(item.like_count));
    fields.insert("comment_count".to_string(), json!(item.comment_count));
    fields.insert("save_count".to_string(), json!(item.save_count));
    fields.insert("share_count".to_string(), json!(item.share_count));
    fields.insert(
        "time_spent_seconds".to_string(),
        json!(item.time_spent_seconds),
    );
    fields
}
