//! Document-store collaborator interface.
//!
//! The ranking core computes purely from in-memory state; durable
//! persistence goes through this injected trait. Documents are flat maps
//! of field name to JSON value (string, number, bool, RFC 3339 timestamp
//! string, nested map or array).

pub mod feed_repo;
pub mod memory;

pub use feed_repo::FeedRepository;
pub use memory::InMemoryDocumentStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;

pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl QueryOp {
    /// Whether a document field value satisfies `field <op> query_value`.
    ///
    /// Numbers compare numerically, strings lexicographically (RFC 3339
    /// timestamps order chronologically under this), bools as false < true.
    /// Mismatched types never match except for exact equality.
    pub fn matches(&self, field_value: &Value, query_value: &Value) -> bool {
        match compare_values(field_value, query_value) {
            Some(ordering) => match self {
                QueryOp::Eq => ordering == Ordering::Equal,
                QueryOp::Gt => ordering == Ordering::Greater,
                QueryOp::Gte => ordering != Ordering::Less,
                QueryOp::Lt => ordering == Ordering::Less,
                QueryOp::Lte => ordering != Ordering::Greater,
            },
            None => false,
        }
    }
}

fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => (lhs == rhs).then_some(Ordering::Equal),
    }
}

/// One operation of an atomic batch write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        document: Document,
    },
    Update {
        collection: String,
        id: String,
        fields: Document,
    },
}

/// Minimum collaborator surface of the backing document store.
///
/// Backends report failures as opaque `anyhow` errors; the library wraps
/// them into `FeedError::Persistence` at its own boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>>;

    async fn query(
        &self,
        collection: &str,
        field: &str,
        op: QueryOp,
        value: Value,
    ) -> anyhow::Result<Vec<Document>>;

    async fn set(&self, collection: &str, id: &str, document: Document) -> anyhow::Result<()>;

    /// Merge fields into an existing document. Fails when the document
    /// does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> anyhow::Result<()>;

    async fn batch(&self, operations: Vec<WriteOp>) -> anyhow::Result<()>;
}
