//! In-memory reference implementation of the document store.
//!
//! Used by the test suites and by hosts that run without a durable
//! backend. Collections materialize on first write.

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{Document, DocumentStore, QueryOp, WriteOp};

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: DashMap<String, DashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|documents| documents.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id).map(|doc| doc.value().clone())))
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        op: QueryOp,
        value: Value,
    ) -> anyhow::Result<Vec<Document>> {
        let Some(documents) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(documents
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .get(field)
                    .is_some_and(|field_value| op.matches(field_value, &value))
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> anyhow::Result<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> anyhow::Result<()> {
        let documents = self
            .collections
            .get(collection)
            .ok_or_else(|| anyhow!("collection {collection} does not exist"))?;
        let mut document = documents
            .get_mut(id)
            .ok_or_else(|| anyhow!("document {collection}/{id} does not exist"))?;
        for (key, value) in fields {
            document.insert(key, value);
        }
        Ok(())
    }

    async fn batch(&self, operations: Vec<WriteOp>) -> anyhow::Result<()> {
        for operation in operations {
            match operation {
                WriteOp::Set {
                    collection,
                    id,
                    document,
                } => self.set(&collection, &id, document).await?,
                WriteOp::Update {
                    collection,
                    id,
                    fields,
                } => self.update(&collection, &id, fields).await?,
            }
        }
        Ok(())
    }
}
